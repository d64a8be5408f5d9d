//! In-memory cache for report output, keyed by slug + bindings hash.
//!
//! Entries carry their own TTL because every report definition can set a
//! different one. Population races follow the cache's last-write-wins
//! semantics; the execution path tolerates recomputation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::sync::Cache;
use serde_json::Value as JsonValue;
use tracing::debug;

/// Rows and meta exactly as the runner produced them.
#[derive(Debug)]
pub struct CachedReport {
    pub rows: Vec<JsonValue>,
    pub meta: JsonValue,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Arc<CachedReport>> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Arc<CachedReport>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

#[derive(Debug)]
pub struct ReportCache {
    entries: Cache<String, Arc<CachedReport>>,
}

impl ReportCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<CachedReport>> {
        self.entries.get(key)
    }

    /// Store a result. A zero TTL never stores.
    pub fn insert(&self, key: String, rows: Vec<JsonValue>, meta: JsonValue, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        debug!(key = %key, ttl_secs = ttl.as_secs(), "caching report result");
        self.entries.insert(key, Arc::new(CachedReport { rows, meta, ttl }));
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.invalidate(key);
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }
}
