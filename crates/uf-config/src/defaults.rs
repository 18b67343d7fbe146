//! Built-in configuration, used when storage and the remote endpoint have
//! nothing better.

use crate::WebsiteMap;

/// Keywords filtered when the user has not saved a list.
pub const DEFAULT_FILTERS: &[&str] = &["Trump"];

/// Remote selector map endpoint.
pub const CONFIG_URL: &str = "https://www.yourefi.red/api/config.json";

/// How long a cached selector map stays fresh (12 hours).
pub const CACHE_TTL_MS: u64 = 12 * 60 * 60 * 1000;

const YOUTUBE: &[&str] = &[
    "ytd-rich-item-renderer",
    "ytd-channel-video-player-renderer",
    "ytd-grid-video-renderer",
    "ytd-compact-video-renderer",
    "ytd-rich-grid-media",
    "ytd-video-renderer",
    "ytm-shorts-lockup-view-model-v2",
];

const REDDIT: &[&str] = &["article", "li", "shreddit-comment"];

const X: &[&str] = &["article"];

/// Built-in site -> selector map.
pub fn default_websites() -> WebsiteMap {
    [("www.youtube.com", YOUTUBE), ("www.reddit.com", REDDIT), ("x.com", X)]
        .into_iter()
        .map(|(host, selectors)| (host.to_string(), selectors.iter().map(|s| s.to_string()).collect()))
        .collect()
}

pub fn default_filters() -> Vec<String> {
    DEFAULT_FILTERS.iter().map(|s| s.to_string()).collect()
}
