//! Service facade wiring the library, cache, catalog, and streaming layers.

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use core_cache::{reconcile, CacheStore, EvictionPolicy, PromotionTracker, ReconcileReport};
use core_catalog::{CatalogItem, CatalogProvider, SearchHit, SearchResultCache, SearchService};
use core_library::{Clock, PlayStat, SystemClock, TrackRecord, TrackStore};
use core_streaming::{ByteRange, StreamSession, StreamingPipeline};
use std::sync::Arc;
use store_sqlite::{connect, DatabaseConfig, SqliteTrackStore};
use tracing::{info, instrument};

/// Single entry point for hosts embedding the media core.
///
/// Owns one instance of each component and routes every operation through
/// the same store, cache, and in-flight guard, which is what makes the
/// single-fetch and promotion invariants hold process-wide.
pub struct MediaService {
    store: Arc<dyn TrackStore>,
    cache: Arc<CacheStore>,
    pipeline: StreamingPipeline,
    search: SearchService,
    promotion: PromotionTracker,
    clock: Arc<dyn Clock>,
}

impl MediaService {
    /// Open the configured SQLite store and assemble the service around it.
    pub async fn connect(
        config: &ServiceConfig,
        provider: Arc<dyn CatalogProvider>,
    ) -> Result<Self> {
        let url = config.database_url.as_deref().ok_or_else(|| {
            ServiceError::Config(
                "A database_url is required to open the SQLite store. \
                 Use .database_url() or inject a store with with_store()."
                    .to_string(),
            )
        })?;

        let pool = connect(&DatabaseConfig::new(url)).await?;
        let store = SqliteTrackStore::new(pool);
        store.init_schema().await?;

        Self::with_store(config, Arc::new(store), provider, Arc::new(SystemClock))
    }

    /// Assemble the service around an injected store and clock.
    pub fn with_store(
        config: &ServiceConfig,
        store: Arc<dyn TrackStore>,
        provider: Arc<dyn CatalogProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(CacheStore::new(config.cache.clone())?);
        let eviction = EvictionPolicy::new(config.cache.quota_bytes);

        let pipeline = StreamingPipeline::new(
            Arc::clone(&cache),
            Arc::clone(&provider),
            Arc::clone(&store),
        )
        .with_fetch_timeout(config.fetch_timeout);

        let search = SearchService::new(
            Arc::clone(&provider),
            Arc::clone(&store),
            SearchResultCache::new(config.search_ttl_secs, Arc::clone(&clock)),
            config.search_batch_size,
        );

        let promotion = PromotionTracker::new(
            Arc::clone(&cache),
            eviction,
            Arc::clone(&store),
            config.cache.promotion_threshold,
        );

        Ok(Self {
            store,
            cache,
            pipeline,
            search,
            promotion,
            clock,
        })
    }

    /// Prepare the cache directories and bring disk and database back into
    /// agreement after an unclean shutdown.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<ReconcileReport> {
        self.cache.init().await?;
        let report = reconcile(&self.cache, self.store.as_ref()).await?;
        info!(
            cleared = report.cleared,
            restored = report.restored,
            orphans = report.orphans,
            "Startup reconcile complete"
        );
        Ok(report)
    }

    /// Resolve a track by id or remote id and open a byte stream for it.
    pub async fn stream(
        &self,
        id_or_remote_id: &str,
        range: Option<ByteRange>,
    ) -> Result<StreamSession> {
        let track = self.resolve(id_or_remote_id).await?;
        Ok(self.pipeline.stream(&track, range).await?)
    }

    /// Merged local-and-catalog search, paginated.
    pub async fn search(&self, query: &str, offset: u32, limit: u32) -> Result<Vec<SearchHit>> {
        Ok(self.search.search(query, offset, limit).await?)
    }

    /// Tracks related to a seed track (radio mode). Degrades to empty on
    /// provider failure.
    pub async fn related(&self, remote_id: &str, limit: u32) -> Vec<CatalogItem> {
        self.search.related(remote_id, limit).await
    }

    /// Record one play for `(user_id, track)` and let the promotion tracker
    /// react to the updated count.
    #[instrument(skip(self))]
    pub async fn record_play(&self, user_id: &str, id_or_remote_id: &str) -> Result<PlayStat> {
        let track = self.resolve(id_or_remote_id).await?;
        let stat = self
            .store
            .record_play(user_id, &track.id, self.clock.now())
            .await?;
        self.promotion.on_play_recorded(&track, stat.play_count).await;
        Ok(stat)
    }

    /// The metadata store backing this service.
    pub fn store(&self) -> &Arc<dyn TrackStore> {
        &self.store
    }

    async fn resolve(&self, id_or_remote_id: &str) -> Result<TrackRecord> {
        self.store
            .resolve(id_or_remote_id)
            .await?
            .ok_or_else(|| ServiceError::TrackNotFound(id_or_remote_id.to_string()))
    }
}
