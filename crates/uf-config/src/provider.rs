//! Configuration resolution
//!
//! Layering, lowest to highest:
//! 1. built-in keywords and site map ([`crate::defaults`])
//! 2. persisted `keywords` and `reveal`
//! 3. the cached site map while younger than the TTL, otherwise a fresh
//!    fetch that rewrites the cache
//!
//! A failed fetch never surfaces as an error. It is logged, attached to the
//! [`Resolution`], and the provider falls back to the stale cache or the
//! built-in map.

use std::time::{SystemTime, UNIX_EPOCH};

use uf_core::{ActionMode, FilterConfig};

use crate::defaults::{default_filters, default_websites, CACHE_TTL_MS};
use crate::remote::WebsiteSource;
use crate::storage::{Storage, CACHED_WEBSITES_KEY, CACHE_TIMESTAMP_KEY, KEYWORDS_KEY, REVEAL_KEY};
use crate::{ConfigError, WebsiteMap};

/// How the site map may be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Built-in map only. No cache read, no network.
    LocalOnly,
    /// Use the cache while fresh, fetch once it expires.
    #[default]
    CachedOrRemote,
    /// Fetch regardless of cache age.
    ForceRemote,
}

/// Where the resolved site map came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorSource {
    Builtin,
    Cache,
    Remote,
    /// An expired cache, used because the refresh failed
    StaleCache,
}

impl SelectorSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::Cache => "cache",
            Self::Remote => "remote",
            Self::StaleCache => "stale-cache",
        }
    }
}

/// Fully resolved configuration, for every site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub filters: Vec<String>,
    pub websites: WebsiteMap,
    pub reveal: bool,
}

impl ProviderConfig {
    pub fn action_mode(&self) -> ActionMode {
        ActionMode::from_reveal(self.reveal)
    }

    /// Selectors for `host`. Hosts match exactly, ignoring ASCII case.
    pub fn selectors_for(&self, host: &str) -> Option<&[String]> {
        let host = host.trim().to_ascii_lowercase();
        self.websites.get(&host).map(Vec::as_slice)
    }

    /// Engine configuration for one page. An unknown host yields no
    /// selectors, which leaves the engine inert.
    pub fn for_host(&self, host: &str) -> FilterConfig {
        let selectors = self.selectors_for(host).map(<[String]>::to_vec).unwrap_or_default();
        FilterConfig::new(selectors, self.filters.clone(), self.action_mode())
    }
}

#[derive(Debug)]
pub struct Resolution {
    pub config: ProviderConfig,
    pub source: SelectorSource,
    /// The failure that forced a fallback, if any
    pub error: Option<ConfigError>,
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

struct CachedMap {
    websites: WebsiteMap,
    written_ms: u64,
}

pub struct ConfigProvider<St: Storage> {
    storage: St,
    ttl_ms: u64,
}

impl<St: Storage> ConfigProvider<St> {
    pub fn new(storage: St) -> Self {
        Self {
            storage,
            ttl_ms: CACHE_TTL_MS,
        }
    }

    pub fn with_ttl(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    pub fn storage(&self) -> &St {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut St {
        &mut self.storage
    }

    pub fn into_storage(self) -> St {
        self.storage
    }

    /// Keywords and action mode from storage, built-in site map.
    pub fn resolve_local(&self) -> ProviderConfig {
        ProviderConfig {
            filters: self.stored_filters().unwrap_or_else(default_filters),
            websites: default_websites(),
            reveal: self.stored_reveal(),
        }
    }

    pub async fn resolve<W: WebsiteSource>(&mut self, source: &W, policy: FetchPolicy, now_ms: u64) -> Resolution {
        let mut config = self.resolve_local();
        if policy == FetchPolicy::LocalOnly {
            return Resolution {
                config,
                source: SelectorSource::Builtin,
                error: None,
            };
        }

        let cached = self.cached_map();
        if policy == FetchPolicy::CachedOrRemote {
            if let Some(cached) = cached.as_ref().filter(|c| self.is_fresh(c, now_ms)) {
                log::debug!("Using cached selector map ({} sites)", cached.websites.len());
                config.websites = cached.websites.clone();
                return Resolution {
                    config,
                    source: SelectorSource::Cache,
                    error: None,
                };
            }
        }

        match source.fetch().await {
            Ok(websites) => {
                log::info!("Fetched selector map ({} sites)", websites.len());
                if let Err(e) = self.write_cache(&websites, now_ms) {
                    log::warn!("Failed to cache selector map: {}", e);
                }
                config.websites = websites;
                Resolution {
                    config,
                    source: SelectorSource::Remote,
                    error: None,
                }
            }
            Err(e) => {
                log::error!("Error fetching config: {}", e);
                let source = match cached {
                    Some(cached) => {
                        config.websites = cached.websites;
                        SelectorSource::StaleCache
                    }
                    None => SelectorSource::Builtin,
                };
                Resolution {
                    config,
                    source,
                    error: Some(e),
                }
            }
        }
    }

    /// Present means override, even an empty list.
    fn stored_filters(&self) -> Option<Vec<String>> {
        let raw = self.storage.get(KEYWORDS_KEY)?;
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(filters) => Some(filters),
            Err(e) => {
                log::warn!("Ignoring unreadable stored keywords: {}", e);
                None
            }
        }
    }

    fn stored_reveal(&self) -> bool {
        self.storage.get(REVEAL_KEY).is_some_and(|v| v.trim() == "true")
    }

    fn cached_map(&self) -> Option<CachedMap> {
        let raw = self.storage.get(CACHED_WEBSITES_KEY)?;
        let written_ms = self.storage.get(CACHE_TIMESTAMP_KEY)?.trim().parse::<u64>().ok()?;
        match serde_json::from_str::<WebsiteMap>(&raw) {
            Ok(websites) => Some(CachedMap { websites, written_ms }),
            Err(e) => {
                log::warn!("Ignoring unreadable selector cache: {}", e);
                None
            }
        }
    }

    fn is_fresh(&self, cached: &CachedMap, now_ms: u64) -> bool {
        now_ms.saturating_sub(cached.written_ms) < self.ttl_ms
    }

    fn write_cache(&mut self, websites: &WebsiteMap, now_ms: u64) -> Result<(), ConfigError> {
        let json = serde_json::to_string(websites)?;
        self.storage.set(CACHED_WEBSITES_KEY, &json)?;
        self.storage.set(CACHE_TIMESTAMP_KEY, &now_ms.to_string())
    }
}
