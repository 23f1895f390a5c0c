//! `[serve]` section configuration.
//!
//! Contains development server settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[serve]` section in easyblog.toml - development server settings.
///
/// # Example
/// ```toml
/// [serve]
/// interface = "0.0.0.0"  # Listen on all interfaces
/// port = 3000
/// watch = true           # Rebuild on file changes
/// debounce_ms = 300      # 0 = one rebuild per filesystem event
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Network interface to bind.
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    /// HTTP port number (default: 8080).
    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    /// Enable file watcher for rebuild on changes.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub watch: bool,

    /// Quiet period collapsing a burst of filesystem events into one rebuild.
    #[serde(default = "defaults::serve::debounce_ms")]
    #[educe(Default = defaults::serve::debounce_ms())]
    pub debounce_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_serve_config() {
        let config = r#"
            [serve]
            interface = "0.0.0.0"
            port = 3000
            watch = false
            debounce_ms = 0
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.serve.interface, "0.0.0.0");
        assert_eq!(config.serve.port, 3000);
        assert!(!config.serve.watch);
        assert_eq!(config.serve.debounce_ms, 0);
    }

    #[test]
    fn test_serve_config_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();

        assert_eq!(config.serve.interface, "127.0.0.1");
        assert_eq!(config.serve.port, 8080);
        assert!(config.serve.watch);
        assert_eq!(config.serve.debounce_ms, 300);
    }

    #[test]
    fn test_serve_config_partial_override() {
        let config = r#"
            [serve]
            port = 4000
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.serve.port, 4000);
        assert_eq!(config.serve.interface, "127.0.0.1");
        assert!(config.serve.watch);
    }

    #[test]
    fn test_unknown_field_rejection() {
        let config = r#"
            [serve]
            livereload = true
        "#;
        let result: Result<SiteConfig, _> = toml::from_str(config);
        assert!(result.is_err());
    }
}
