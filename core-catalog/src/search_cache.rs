//! TTL cache for catalog search results
//!
//! One entry per distinct raw query string (case-sensitive, unnormalized).
//! Entries are replaced wholesale on a fresh fetch and expire lazily: an
//! expired entry is treated as absent on the next lookup, there is no
//! background sweep.

use crate::provider::CatalogItem;
use chrono::{DateTime, Duration, Utc};
use core_library::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Default time-to-live for a cached search result set.
pub const DEFAULT_SEARCH_TTL_SECS: i64 = 300;

struct SearchCacheEntry {
    results: Vec<CatalogItem>,
    expires_at: DateTime<Utc>,
}

/// Short-lived in-memory cache of catalog search results.
///
/// Owned and constructed explicitly with an injected clock, so TTL behavior
/// is testable without wall-clock sleeps and instances reset between tests.
pub struct SearchResultCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, SearchCacheEntry>>,
}

impl SearchResultCache {
    pub fn new(ttl_secs: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs),
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the cached result set for `query`.
    ///
    /// Returns `None` for absent or expired entries; an expired entry is
    /// dropped on the way out.
    pub fn get(&self, query: &str) -> Option<Vec<CatalogItem>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();
        match entries.get(query) {
            Some(entry) if entry.expires_at > now => Some(entry.results.clone()),
            Some(_) => {
                debug!(query, "Search cache entry expired");
                entries.remove(query);
                None
            }
            None => None,
        }
    }

    /// Store a result set for `query`, unconditionally overwriting any prior
    /// entry for that exact query string.
    pub fn put(&self, query: &str, results: Vec<CatalogItem>) {
        let expires_at = self.clock.now() + self.ttl;
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            query.to_string(),
            SearchCacheEntry {
                results,
                expires_at,
            },
        );
    }

    /// Number of live (possibly expired but not yet dropped) entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
