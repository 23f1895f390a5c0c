//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

pub fn r#true() -> bool {
    true
}

pub mod base {
    pub fn url() -> Option<String> {
        None
    }
}

pub mod build {
    use std::path::PathBuf;

    pub fn input() -> PathBuf {
        ".".into()
    }

    pub fn output() -> PathBuf {
        "out".into()
    }

    pub fn code_style() -> String {
        "github".into()
    }

    pub fn max_concurrent_parses() -> usize {
        5
    }

    pub fn queue_depth() -> usize {
        10
    }

    pub mod og_image {
        use std::path::PathBuf;

        pub fn icon_path() -> PathBuf {
            "og/icon.png".into()
        }

        pub fn font_path() -> PathBuf {
            "og/font.ttf".into()
        }

        pub fn font_size() -> f32 {
            64.0
        }
    }
}

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        8080
    }

    pub fn debounce_ms() -> u64 {
        300
    }
}
