//! `localStorage` backed storage and removal counter

use uf_config::{ConfigError, Storage};
use uf_core::ActionSink;

/// Running total of applied actions, shared with the popup.
pub const REMOVAL_COUNT_KEY: &str = "removalCount";

fn window_storage() -> Result<web_sys::Storage, ConfigError> {
    web_sys::window()
        .ok_or_else(|| ConfigError::Storage("no window".to_string()))?
        .local_storage()
        .map_err(|e| ConfigError::Storage(format!("{:?}", e)))?
        .ok_or_else(|| ConfigError::Storage("localStorage unavailable".to_string()))
}

pub struct LocalStorage {
    storage: web_sys::Storage,
}

impl LocalStorage {
    pub fn open() -> Result<Self, ConfigError> {
        Ok(Self {
            storage: window_storage()?,
        })
    }
}

impl Storage for LocalStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.storage
            .set_item(key, value)
            .map_err(|e| ConfigError::Storage(format!("{:?}", e)))
    }
}

/// Increments `removalCount` in `localStorage` once per applied action.
pub struct LocalStorageCounter {
    storage: Option<web_sys::Storage>,
}

impl LocalStorageCounter {
    pub fn open() -> Self {
        let storage = window_storage()
            .map_err(|e| log::warn!("Removal counter disabled: {}", e))
            .ok();
        Self { storage }
    }

    pub fn count(&self) -> u64 {
        let stored = self.storage.as_ref().and_then(|s| s.get_item(REMOVAL_COUNT_KEY).ok().flatten());
        parse_count(stored.as_deref())
    }
}

impl ActionSink for LocalStorageCounter {
    fn record_action(&mut self) {
        let Some(storage) = &self.storage else {
            return;
        };
        let next = self.count().saturating_add(1);
        if let Err(e) = storage.set_item(REMOVAL_COUNT_KEY, &next.to_string()) {
            log::warn!("Failed to update removal count: {:?}", e);
        }
    }
}

/// Missing or unreadable counts start from zero.
pub fn parse_count(stored: Option<&str>) -> u64 {
    stored.and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}
