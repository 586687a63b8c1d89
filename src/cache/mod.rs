//! Read-through caching in front of the document store
//!
//! The cache is strictly best-effort. A miss, a backend failure or a value
//! that no longer decodes all fall through to the store, so no caller ever
//! sees a cache error. Writes invalidate the affected keys.
//!
//! ## Key scheme
//!
//! | key | holds |
//! |---|---|
//! | `agents_list` | every agent, newest first |
//! | `agent_{id}` | one agent |
//! | `agent_tasks_{id}` | one agent's tasks |
//! | `all_tasks` | the most recent tasks |
//! | `agent_templates` | built-in templates |
//! | `dashboard_analytics` | the analytics rollup |
//! | `file_{id}` | one uploaded file record |

mod memory;
mod tracker;

pub use memory::MemoryCache;
pub use tracker::{CacheMetrics, CacheSummary, CacheTracker};

use crate::config::CacheSettings;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// String key/value store with per-entry expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}

pub mod keys {
    pub const AGENTS_LIST: &str = "agents_list";
    pub const ALL_TASKS: &str = "all_tasks";
    pub const AGENT_TEMPLATES: &str = "agent_templates";
    pub const DASHBOARD_ANALYTICS: &str = "dashboard_analytics";

    pub fn agent(id: &str) -> String {
        format!("agent_{id}")
    }

    pub fn agent_tasks(id: &str) -> String {
        format!("agent_tasks_{id}")
    }

    pub fn file(id: &str) -> String {
        format!("file_{id}")
    }

    /// Every key a write to one agent or its tasks can make stale
    pub fn agent_scope(id: &str) -> [String; 5] {
        [
            agent(id),
            agent_tasks(id),
            AGENTS_LIST.to_string(),
            ALL_TASKS.to_string(),
            DASHBOARD_ANALYTICS.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Connected,
    Disconnected,
    Disabled,
}

/// JSON read cache over an optional [`CacheStore`]
pub struct ReadCache {
    backend: Option<Arc<dyn CacheStore>>,
    settings: CacheSettings,
    tracker: CacheTracker,
}

impl ReadCache {
    /// Explicit initialization: pings the backend once and logs the outcome.
    ///
    /// An unreachable backend is kept; every call through it degrades to a miss.
    pub async fn connect(settings: &CacheSettings, backend: Arc<dyn CacheStore>) -> Self {
        if !settings.enabled {
            return Self::disabled();
        }

        match backend.ping().await {
            Ok(()) => info!("Read cache connected"),
            Err(e) => warn!("Read cache unavailable, reads go to the store: {}", e),
        }

        Self {
            backend: Some(backend),
            settings: settings.clone(),
            tracker: CacheTracker::new(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            backend: None,
            settings: CacheSettings {
                enabled: false,
                ..Default::default()
            },
            tracker: CacheTracker::new(),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn tracker(&self) -> &CacheTracker {
        &self.tracker
    }

    pub async fn status(&self) -> CacheStatus {
        match &self.backend {
            None => CacheStatus::Disabled,
            Some(backend) => match backend.ping().await {
                Ok(()) => CacheStatus::Connected,
                Err(_) => CacheStatus::Disconnected,
            },
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.backend.as_ref()?;

        match backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    self.tracker.record_hit(key);
                    Some(value)
                }
                Err(e) => {
                    debug!("Discarding undecodable cache entry {}: {}", key, e);
                    self.tracker.record_miss(key);
                    None
                }
            },
            Ok(None) => {
                self.tracker.record_miss(key);
                None
            }
            Err(e) => {
                debug!("Cache read for {} fell through: {}", key, e);
                self.tracker.record_error();
                self.tracker.record_miss(key);
                None
            }
        }
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let Some(backend) = &self.backend else {
            return;
        };

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Not caching {}: {}", key, e);
                return;
            }
        };

        match backend.set(key, raw, Duration::from_secs(ttl_secs)).await {
            Ok(()) => self.tracker.record_write(),
            Err(e) => {
                debug!("Cache write for {} skipped: {}", key, e);
                self.tracker.record_error();
            }
        }
    }

    pub async fn invalidate<S: AsRef<str>>(&self, keys: &[S]) {
        let Some(backend) = &self.backend else {
            return;
        };

        for key in keys {
            match backend.delete(key.as_ref()).await {
                Ok(()) => self.tracker.record_invalidation(),
                Err(e) => {
                    debug!("Cache invalidation for {} skipped: {}", key.as_ref(), e);
                    self.tracker.record_error();
                }
            }
        }
    }
}
