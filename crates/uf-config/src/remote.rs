//! Remote selector map
//!
//! The endpoint serves `{ "websites": { "<host>": ["<selector>", ...] } }`.
//! Other top-level fields are ignored.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, WebsiteMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub websites: WebsiteMap,
}

pub fn parse_remote_config(body: &str) -> Result<RemoteConfig, ConfigError> {
    Ok(serde_json::from_str(body)?)
}

/// Somewhere a fresh selector map can be fetched from.
#[allow(async_fn_in_trait)]
pub trait WebsiteSource {
    async fn fetch(&self) -> Result<WebsiteMap, ConfigError>;
}

#[cfg(feature = "remote")]
pub use http::HttpSource;

#[cfg(feature = "remote")]
mod http {
    use super::*;

    /// Fetches the selector map over HTTP.
    #[derive(Debug, Clone)]
    pub struct HttpSource {
        client: reqwest::Client,
        url: String,
    }

    impl HttpSource {
        pub fn new(url: impl Into<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                url: url.into(),
            }
        }

        pub fn url(&self) -> &str {
            &self.url
        }
    }

    impl Default for HttpSource {
        fn default() -> Self {
            Self::new(crate::defaults::CONFIG_URL)
        }
    }

    impl WebsiteSource for HttpSource {
        async fn fetch(&self) -> Result<WebsiteMap, ConfigError> {
            log::debug!("Fetching selector map from {}", self.url);
            let response = self.client.get(&self.url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ConfigError::Status(status.as_u16()));
            }
            let body = response.text().await?;
            Ok(parse_remote_config(&body)?.websites)
        }
    }
}
