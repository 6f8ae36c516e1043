//! Response caching for go2web.
//!
//! Entries are keyed by the literal request URL string and stamped with the
//! fetch time. Reads only see entries younger than the TTL; expired entries
//! stay on disk until the same URL is stored again. Every store writes the
//! whole cache through to its JSON file.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default cache TTL in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600; // 1 hour

/// Source of the current time, in epoch seconds
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch
    fn now(&self) -> i64;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Configuration for the cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live for cached entries
    pub ttl: Duration,

    /// JSON file the cache is persisted to; `None` keeps it in memory
    pub path: Option<PathBuf>,

    /// Whether caching is enabled
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            path: default_cache_path(),
            enabled: true,
        }
    }
}

/// `<platform cache dir>/go2web/cache.json`
pub fn default_cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("go2web").join("cache.json"))
}

/// One persisted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Exact request string the entry was stored under
    pub url: String,

    /// Processed result
    pub content: serde_json::Value,

    /// Fetch time, epoch seconds
    pub timestamp: i64,
}

/// URL-keyed, TTL-gated, write-through response cache
pub struct ResponseCache {
    entries: Mutex<BTreeMap<String, CacheEntry>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    /// Create a cache backed by the configured file, using the system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit clock
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let entries = match (&config.path, config.enabled) {
            (Some(path), true) => load_entries(path),
            _ => BTreeMap::new(),
        };

        Self {
            entries: Mutex::new(entries),
            config,
            clock,
        }
    }

    /// Create an enabled cache that never touches disk
    pub fn in_memory() -> Self {
        Self::new(CacheConfig {
            path: None,
            ..Default::default()
        })
    }

    /// Create a disabled cache (no-op)
    pub fn disabled() -> Self {
        Self::new(CacheConfig {
            path: None,
            enabled: false,
            ..Default::default()
        })
    }

    /// Whether lookups and stores do anything
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetch a fresh entry for exactly `url`
    #[instrument(skip(self))]
    pub fn lookup<T: DeserializeOwned>(&self, url: &str) -> Option<T> {
        if !self.config.enabled {
            return None;
        }

        let entries = self.lock();
        let entry = entries.get(url)?;

        let age = self.clock.now() - entry.timestamp;
        if age >= self.config.ttl.as_secs() as i64 {
            debug!(url = %url, age, "Cache entry expired");
            return None;
        }

        match serde_json::from_value(entry.content.clone()) {
            Ok(content) => {
                debug!(url = %url, "Cache hit");
                Some(content)
            },
            Err(e) => {
                warn!(url = %url, error = %e, "Cached content has unexpected shape");
                None
            },
        }
    }

    /// Insert or replace the entry for `url`, then persist
    #[instrument(skip(self, content))]
    pub fn store<T: Serialize>(&self, url: &str, content: &T) {
        if !self.config.enabled {
            return;
        }

        let content = match serde_json::to_value(content) {
            Ok(value) => value,
            Err(e) => {
                warn!(url = %url, error = %e, "Could not serialize content for cache");
                return;
            },
        };

        let mut entries = self.lock();
        entries.insert(
            url.to_string(),
            CacheEntry {
                url: url.to_string(),
                content,
                timestamp: self.clock.now(),
            },
        );
        debug!(url = %url, "Cached response");

        if let Some(path) = &self.config.path
            && let Err(e) = save_entries(path, &entries)
        {
            warn!(path = %path.display(), error = %e, "Failed to persist cache");
        }
    }

    /// Number of stored entries, fresh or not
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been stored
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

fn load_entries(path: &Path) -> BTreeMap<String, CacheEntry> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read cache file");
            return BTreeMap::new();
        },
    };

    serde_json::from_str(&text).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Ignoring corrupt cache file");
        BTreeMap::new()
    })
}

fn save_entries(path: &Path, entries: &BTreeMap<String, CacheEntry>) -> crate::Go2WebResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, json)?;
    Ok(())
}
