//! `[base]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[base]` section in easyblog.toml - site identity.
///
/// # Example
/// ```toml
/// [base]
/// url = "https://blog.example.com"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BaseConfig {
    /// Prefix for absolute URLs in the sitemap and social-card metadata.
    #[serde(default = "defaults::base::url")]
    #[educe(Default = defaults::base::url())]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_base_config_url() {
        let config = r#"
            [base]
            url = "https://blog.example.com"
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.base.url.as_deref(), Some("https://blog.example.com"));
    }

    #[test]
    fn test_base_config_defaults() {
        let config: SiteConfig = toml::from_str("[base]").unwrap();
        assert_eq!(config.base.url, None);
    }

    #[test]
    fn test_unknown_field_rejection() {
        let config = r#"
            [base]
            url = "https://blog.example.com"
            title = "not here"
        "#;
        let result: Result<SiteConfig, _> = toml::from_str(config);

        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }
}
