//! Search service with pagination stitching
//!
//! On a cache miss one large batch is fetched from the provider so that later
//! pages of the same query are served from memory. Every request additionally
//! runs a live local-store query, so newly indexed local tracks are never
//! shadowed by a stale remote cache.

use crate::error::Result;
use crate::provider::{CatalogItem, CatalogProvider};
use crate::search_cache::SearchResultCache;
use core_library::{TrackRecord, TrackStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Default number of items prefetched from the provider per query.
pub const DEFAULT_SEARCH_BATCH_SIZE: u32 = 100;

/// A single merged search result.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SearchHit {
    /// A record from the local metadata store. Wins over a remote item with
    /// the same remote identifier.
    Local(TrackRecord),
    /// A catalog item not yet known locally.
    Remote(CatalogItem),
}

impl SearchHit {
    pub fn remote_id(&self) -> Option<&str> {
        match self {
            SearchHit::Local(record) => record.remote_id.as_deref(),
            SearchHit::Remote(item) => Some(&item.remote_id),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            SearchHit::Local(record) => &record.title,
            SearchHit::Remote(item) => &item.title,
        }
    }
}

/// Catalog search amortized across paginated client requests.
pub struct SearchService {
    provider: Arc<dyn CatalogProvider>,
    store: Arc<dyn TrackStore>,
    cache: SearchResultCache,
    batch_size: u32,
}

impl SearchService {
    pub fn new(
        provider: Arc<dyn CatalogProvider>,
        store: Arc<dyn TrackStore>,
        cache: SearchResultCache,
        batch_size: u32,
    ) -> Self {
        Self {
            provider,
            store,
            cache,
            batch_size,
        }
    }

    /// Search across the local library and the remote catalog.
    ///
    /// Serves the `[offset, offset + limit)` slice of the cached remote batch
    /// merged with a live local query. Local records win on identifier
    /// collisions; a missing local thumbnail is backfilled from the remote
    /// item as a side effect.
    ///
    /// # Errors
    /// Only local-store failures propagate. Provider failures degrade to "no
    /// remote results" and are logged.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, offset: u32, limit: u32) -> Result<Vec<SearchHit>> {
        let remote_batch = match self.cache.get(query) {
            Some(results) => {
                debug!(query, "Serving catalog results from cache");
                results
            }
            None => {
                let results = match self.provider.search(query, self.batch_size).await {
                    Ok(results) => results,
                    Err(e) => {
                        warn!(query, error = %e, "Catalog search failed, degrading to local results");
                        Vec::new()
                    }
                };
                self.cache.put(query, results.clone());
                results
            }
        };

        let local_results = self.store.search(query, offset, limit).await?;

        let mut seen: Vec<String> = local_results
            .iter()
            .filter_map(|t| t.remote_id.clone())
            .collect();
        let mut hits: Vec<SearchHit> = local_results.into_iter().map(SearchHit::Local).collect();

        let page_start = (offset as usize).min(remote_batch.len());
        let page_end = (page_start + limit as usize).min(remote_batch.len());

        for item in &remote_batch[page_start..page_end] {
            if seen.iter().any(|id| id == &item.remote_id) {
                // Absorbed by a local hit already on the page; that record
                // may still be missing the artwork the provider carries.
                if let Some(record) = hits.iter_mut().find_map(|hit| match hit {
                    SearchHit::Local(r) if r.remote_id.as_deref() == Some(item.remote_id.as_str()) => {
                        Some(r)
                    }
                    _ => None,
                }) {
                    self.backfill_thumbnail(record, item).await;
                }
                continue;
            }
            seen.push(item.remote_id.clone());

            match self.store.find_by_remote_id(&item.remote_id).await? {
                Some(mut record) => {
                    self.backfill_thumbnail(&mut record, item).await;
                    hits.push(SearchHit::Local(record));
                }
                None => hits.push(SearchHit::Remote(item.clone())),
            }
        }

        info!(query, hits = hits.len(), "Search complete");
        Ok(hits)
    }

    /// Lazy backfill: a locally known track may predate the provider
    /// exposing artwork for it. Persistence failures are logged, the
    /// in-memory hit keeps the thumbnail either way.
    async fn backfill_thumbnail(&self, record: &mut TrackRecord, item: &CatalogItem) {
        if record.thumbnail.is_some() {
            return;
        }
        if let Some(thumbnail) = &item.thumbnail {
            record.thumbnail = Some(thumbnail.clone());
            if let Err(e) = self.store.update_thumbnail(&record.id, thumbnail).await {
                warn!(track_id = %record.id, error = %e, "Thumbnail backfill failed");
            }
        }
    }

    /// Fetch tracks related to `remote_id`, excluding the seed itself.
    ///
    /// Degrades to an empty list on provider failure.
    #[instrument(skip(self))]
    pub async fn related(&self, remote_id: &str, limit: u32) -> Vec<CatalogItem> {
        match self.provider.related_tracks(remote_id, limit).await {
            Ok(items) => items
                .into_iter()
                .filter(|item| item.remote_id != remote_id)
                .collect(),
            Err(e) => {
                warn!(remote_id, error = %e, "Related-tracks lookup failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::provider::AudioByteStream;
    use crate::search_cache::DEFAULT_SEARCH_TTL_SECS;
    use async_trait::async_trait;
    use chrono::Utc;
    use core_library::{ManualClock, MemoryTrackStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn item(remote_id: &str, thumbnail: Option<&str>) -> CatalogItem {
        CatalogItem {
            remote_id: remote_id.to_string(),
            title: format!("Title {}", remote_id),
            artist: "Artist".to_string(),
            album: None,
            duration_secs: Some(200),
            thumbnail: thumbnail.map(String::from),
        }
    }

    /// Provider returning a fixed batch and counting calls.
    struct FixedProvider {
        batch: Vec<CatalogItem>,
        search_calls: AtomicUsize,
        fail: bool,
    }

    impl FixedProvider {
        fn new(batch: Vec<CatalogItem>) -> Self {
            Self {
                batch,
                search_calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                batch: Vec::new(),
                search_calls: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl CatalogProvider for FixedProvider {
        async fn search(&self, _query: &str, _limit: u32) -> Result<Vec<CatalogItem>> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CatalogError::ProviderUnavailable("down".to_string()));
            }
            Ok(self.batch.clone())
        }

        async fn fetch_audio(&self, remote_id: &str) -> Result<AudioByteStream> {
            Err(CatalogError::NotFound(remote_id.to_string()))
        }

        async fn related_tracks(&self, _remote_id: &str, _limit: u32) -> Result<Vec<CatalogItem>> {
            if self.fail {
                return Err(CatalogError::TransientNetwork("timeout".to_string()));
            }
            Ok(self.batch.clone())
        }
    }

    fn service_with(
        provider: Arc<FixedProvider>,
        store: Arc<MemoryTrackStore>,
        clock: Arc<ManualClock>,
    ) -> SearchService {
        SearchService::new(
            provider,
            store,
            SearchResultCache::new(DEFAULT_SEARCH_TTL_SECS, clock),
            DEFAULT_SEARCH_BATCH_SIZE,
        )
    }

    #[tokio::test]
    async fn test_cached_batch_serves_later_pages() {
        let batch: Vec<CatalogItem> = (0..10).map(|i| item(&format!("yt{}", i), None)).collect();
        let provider = Arc::new(FixedProvider::new(batch));
        let store = Arc::new(MemoryTrackStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = service_with(provider.clone(), store, clock);

        let page1 = service.search("q", 0, 3).await.unwrap();
        let page2 = service.search("q", 3, 3).await.unwrap();

        assert_eq!(page1.len(), 3);
        assert_eq!(page2.len(), 3);
        assert_eq!(page2[0].remote_id(), Some("yt3"));
        // Both pages out of one provider call.
        assert_eq!(provider.search_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refetch_after_ttl() {
        let provider = Arc::new(FixedProvider::new(vec![item("yt0", None)]));
        let store = Arc::new(MemoryTrackStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = service_with(provider.clone(), store, clock.clone());

        service.search("q", 0, 5).await.unwrap();
        clock.advance_secs(299);
        service.search("q", 0, 5).await.unwrap();
        assert_eq!(provider.search_calls.load(Ordering::SeqCst), 1);

        clock.advance_secs(2);
        service.search("q", 0, 5).await.unwrap();
        assert_eq!(provider.search_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_local_record_wins_and_thumbnail_backfilled() {
        let provider = Arc::new(FixedProvider::new(vec![item(
            "yt0",
            Some("http://img/yt0.jpg"),
        )]));
        let store = Arc::new(MemoryTrackStore::new());
        let record = core_library::TrackRecord::remote("Title yt0", "Artist", "yt0");
        store.insert(&record).await.unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = service_with(provider, store.clone(), clock);

        let hits = service.search("Title", 0, 10).await.unwrap();

        // The one local record absorbs the remote item.
        assert_eq!(hits.len(), 1);
        assert!(matches!(&hits[0], SearchHit::Local(r) if r.id == record.id));

        // Backfill persisted to the store.
        let updated = store.find_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(updated.thumbnail.as_deref(), Some("http://img/yt0.jpg"));
    }

    #[tokio::test]
    async fn test_thumbnail_backfill_when_local_title_differs() {
        // The record is known by remote id only; its stored title does not
        // match the query text, so the dedupe pass never sees it.
        let provider = Arc::new(FixedProvider::new(vec![item(
            "yt0",
            Some("http://img/yt0.jpg"),
        )]));
        let store = Arc::new(MemoryTrackStore::new());
        let record = core_library::TrackRecord::remote("Old Name", "Artist", "yt0");
        store.insert(&record).await.unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = service_with(provider, store.clone(), clock);

        let hits = service.search("Title", 0, 10).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert!(matches!(&hits[0], SearchHit::Local(r) if r.id == record.id));

        let updated = store.find_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(updated.thumbnail.as_deref(), Some("http://img/yt0.jpg"));
    }

    #[tokio::test]
    async fn test_provider_failure_degrades_to_local() {
        let provider = Arc::new(FixedProvider::failing());
        let store = Arc::new(MemoryTrackStore::new());
        let record = core_library::TrackRecord::local("Blue Train", "Coltrane", "/lib/bt.flac");
        store.insert(&record).await.unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = service_with(provider, store, clock);

        let hits = service.search("Blue", 0, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(matches!(hits[0], SearchHit::Local(_)));
    }

    #[tokio::test]
    async fn test_related_filters_seed_and_degrades() {
        let provider = Arc::new(FixedProvider::new(vec![item("seed", None), item("yt1", None)]));
        let store = Arc::new(MemoryTrackStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = service_with(provider, store.clone(), clock.clone());

        let related = service.related("seed", 10).await;
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].remote_id, "yt1");

        let failing = service_with(Arc::new(FixedProvider::failing()), store, clock);
        assert!(failing.related("seed", 10).await.is_empty());
    }
}
