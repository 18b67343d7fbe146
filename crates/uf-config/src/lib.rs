//! Unfeed Configuration Provider
//!
//! Resolves everything the engine needs before it is constructed: the
//! keyword list, the action mode and the site -> selector map. The map is
//! cached in persistent storage for a fixed time-to-live and refreshed from
//! a remote endpoint on expiry. Failures are logged and fall back; they are
//! never returned to the caller as errors.

pub mod defaults;
pub mod provider;
pub mod remote;
pub mod storage;

pub use defaults::{default_websites, CACHE_TTL_MS, CONFIG_URL, DEFAULT_FILTERS};
pub use provider::{now_millis, ConfigProvider, FetchPolicy, ProviderConfig, Resolution, SelectorSource};
pub use remote::{parse_remote_config, RemoteConfig, WebsiteSource};
#[cfg(feature = "remote")]
pub use remote::HttpSource;
pub use storage::{FileStorage, MemoryStorage, Storage};

use std::collections::BTreeMap;

/// Hostname -> ordered selector list.
pub type WebsiteMap = BTreeMap<String, Vec<String>>;

/// Error type for configuration resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[cfg(feature = "remote")]
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Fetch failed: {0}")]
    Fetch(String),
    #[error("Remote returned status {0}")]
    Status(u16),
    #[error("Invalid config document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Storage error: {0}")]
    Storage(String),
}
