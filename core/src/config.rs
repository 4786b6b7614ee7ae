//! Client configuration.

use serde::{Deserialize, Serialize};

/// Production backend origin.
pub const DEFAULT_BASE_URL: &str = "https://lobster-app-2z8q5.ondigitalocean.app";

/// Storage key the session token is persisted under.
pub const DEFAULT_TOKEN_KEY: &str = "auth_token";

pub const DEFAULT_UPLOAD_ENDPOINT: &str = "admin/upload-image";

/// Environment variable that overrides the base URL.
pub const BASE_URL_ENV: &str = "PUPUP_API_BASE_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Origin every endpoint is appended to, without a trailing slash.
    pub base_url: String,
    pub token_key: String,
    pub upload_endpoint: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            upload_endpoint: DEFAULT_UPLOAD_ENDPOINT.to_string(),
        }
    }

    /// Defaults, with `PUPUP_API_BASE_URL` taking over the origin when set.
    pub fn from_env() -> Self {
        match std::env::var(BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_stripped() {
        assert_eq!(ClientConfig::new("http://localhost:3000/").base_url, "http://localhost:3000");
        assert_eq!(ClientConfig::new("http://localhost:3000///").base_url, "http://localhost:3000");
    }

    #[test]
    fn default_points_at_production() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.token_key, "auth_token");
        assert_eq!(config.upload_endpoint, "admin/upload-image");
    }

    #[test]
    fn deserializes_from_json() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"base_url":"http://x","token_key":"t","upload_endpoint":"u"}"#,
        )
        .unwrap();
        assert_eq!(config.base_url, "http://x");
        assert_eq!(config.token_key, "t");
    }
}
