/// In-process TTL cache for read results
///
/// Keys have the form `"{resource_name}:{version}"`; reads without an
/// explicit version use the literal `latest`. Expiry is lazy: an entry past
/// its deadline is dropped by the lookup that finds it.
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::{CacheConfig, MAX_CACHE_TTL_SECONDS};
use crate::metrics;

pub const LATEST: &str = "latest";

/// Build the cache key for a resource and optional version
pub fn cache_key(resource_name: &str, version: Option<&str>) -> String {
    format!("{}:{}", resource_name, version.unwrap_or(LATEST))
}

/// Snapshot of cache state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub size: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
    pub ttl_seconds: u64,
    /// Lookups served since creation
    pub hits: u64,
    pub misses: u64,
}

struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Instance-scoped TTL cache
pub struct TtlCache<V> {
    enabled: bool,
    ttl: Duration,
    ttl_seconds: u64,
    label: &'static str,
    entries: Mutex<HashMap<String, Entry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache; `label` tags log lines and metrics.
    ///
    /// TTLs above `MAX_CACHE_TTL_SECONDS` are clamped to it.
    pub fn new(label: &'static str, enabled: bool, ttl_seconds: u64) -> Self {
        if ttl_seconds > MAX_CACHE_TTL_SECONDS {
            warn!(
                cache = label,
                ttl_seconds,
                max_ttl_seconds = MAX_CACHE_TTL_SECONDS,
                "Cache TTL too large, clamping"
            );
        }
        let ttl_seconds = ttl_seconds.min(MAX_CACHE_TTL_SECONDS);
        let ttl = i64::try_from(ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or_else(Duration::zero);
        if enabled {
            info!(cache = label, ttl_seconds, "Caching enabled");
        }
        Self {
            enabled,
            ttl,
            ttl_seconds,
            label,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(label: &'static str, config: &CacheConfig) -> Self {
        Self::new(label, config.enabled, config.ttl_seconds)
    }

    pub fn disabled(label: &'static str) -> Self {
        Self::new(label, false, crate::config::DEFAULT_CACHE_TTL_SECONDS)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry<V>>> {
        // A poisoned map only means a panic mid-insert; the data is still usable
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get a live entry, dropping it if it has expired
    pub fn get(&self, key: &str) -> Option<V> {
        if !self.enabled {
            return None;
        }

        let mut entries = self.lock();
        let now = Utc::now();

        let expired_at = match entries.get(key) {
            Some(entry) if now < entry.expires_at => {
                debug!(cache = self.label, cache_key = key, "Cache hit");
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::CACHE_HITS_TOTAL
                    .with_label_values(&[self.label])
                    .inc();
                return Some(entry.value.clone());
            }
            Some(entry) => Some(entry.expires_at),
            None => None,
        };

        if let Some(expires_at) = expired_at {
            debug!(
                cache = self.label,
                cache_key = key,
                expiry_time = %expires_at.to_rfc3339(),
                "Cache entry expired"
            );
            entries.remove(key);
        }

        debug!(cache = self.label, cache_key = key, "Cache miss");
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::CACHE_MISSES_TOTAL
            .with_label_values(&[self.label])
            .inc();
        None
    }

    /// Store a value, replacing any existing entry
    pub fn put(&self, key: &str, value: V) {
        if !self.enabled {
            return;
        }

        let expires_at = Utc::now() + self.ttl;
        let mut entries = self.lock();
        entries.insert(key.to_string(), Entry { value, expires_at });

        debug!(
            cache = self.label,
            cache_key = key,
            expiry_time = %expires_at.to_rfc3339(),
            cache_size = entries.len(),
            "Value cached"
        );
    }

    /// Remove one version's entry, or every entry of the resource when
    /// `version` is `None`. Returns the number of entries removed.
    pub fn invalidate(&self, resource_name: &str, version: Option<&str>) -> usize {
        if !self.enabled {
            return 0;
        }

        let mut entries = self.lock();
        match version {
            Some(version) => {
                let key = cache_key(resource_name, Some(version));
                let removed = entries.remove(&key).is_some() as usize;
                if removed > 0 {
                    debug!(
                        cache = self.label,
                        resource = resource_name,
                        version,
                        cache_key = %key,
                        "Cache invalidated for specific version"
                    );
                }
                removed
            }
            None => {
                let prefix = format!("{}:", resource_name);
                let before = entries.len();
                entries.retain(|key, _| !key.starts_with(&prefix));
                let removed = before - entries.len();
                debug!(
                    cache = self.label,
                    resource = resource_name,
                    invalidated_count = removed,
                    "Cache invalidated for all versions"
                );
                removed
            }
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        if !self.enabled {
            return;
        }

        let mut entries = self.lock();
        let cleared = entries.len();
        entries.clear();
        info!(cache = self.label, cleared_entries = cleared, "Cache cleared");
    }

    /// Move an entry's deadline into the past without removing it
    pub fn expire(&self, key: &str) -> bool {
        let mut entries = self.lock();
        match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Utc::now() - Duration::seconds(1);
                true
            }
            None => false,
        }
    }

    /// Whether the key is physically present, live or not
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count entries without purging expired ones
    pub fn stats(&self) -> CacheStats {
        if !self.enabled {
            return CacheStats {
                enabled: false,
                size: 0,
                expired_entries: 0,
                active_entries: 0,
                ttl_seconds: self.ttl_seconds,
                hits: 0,
                misses: 0,
            };
        }

        let entries = self.lock();
        let now = Utc::now();
        let expired = entries.values().filter(|e| e.expires_at <= now).count();

        CacheStats {
            enabled: true,
            size: entries.len(),
            expired_entries: expired,
            active_entries: entries.len() - expired,
            ttl_seconds: self.ttl_seconds,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
