//! Play-count driven promotion
//!
//! Watches play events recorded by the calling layer and moves a track's
//! ephemeral download into the durable tier once its play count reaches the
//! configured threshold. The transition fires exactly once, at the moment
//! the counter becomes the threshold value; later plays hit the idempotent
//! path in the cache store and change nothing.

use crate::eviction::EvictionPolicy;
use crate::store::{CacheStore, PromoteOutcome};
use core_library::{TrackRecord, TrackStore};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Decides when an ephemeral cache entry becomes durable.
pub struct PromotionTracker {
    cache: Arc<CacheStore>,
    eviction: EvictionPolicy,
    store: Arc<dyn TrackStore>,
    threshold: i64,
}

impl PromotionTracker {
    pub fn new(
        cache: Arc<CacheStore>,
        eviction: EvictionPolicy,
        store: Arc<dyn TrackStore>,
        threshold: i64,
    ) -> Self {
        Self {
            cache,
            eviction,
            store,
            threshold,
        }
    }

    /// React to a recorded play.
    ///
    /// Promotion failures are logged and swallowed; they never fail the play
    /// recording that triggered them.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn on_play_recorded(&self, track: &TrackRecord, new_play_count: i64) {
        // Exact-transition semantics: the 4th, 5th, ... play does not
        // re-trigger promotion.
        if new_play_count != self.threshold {
            return;
        }

        let Some(remote_id) = track.remote_id.as_deref() else {
            debug!("Track has no remote identifier, nothing to promote");
            return;
        };

        info!(
            remote_id,
            threshold = self.threshold,
            "Play threshold reached, promoting track to durable tier"
        );

        match self.cache.promote(remote_id).await {
            Ok(PromoteOutcome::Promoted) => {
                let durable_path = self.cache.durable_path(remote_id);
                if let Err(e) = self
                    .store
                    .update_cache_fields(&track.id, true, Some(&durable_path))
                    .await
                {
                    error!(error = %e, "Failed to record promotion in metadata store");
                }
                // Never leave the durable tier over quota after a promotion.
                if let Err(e) = self.eviction.run(&self.cache).await {
                    error!(error = %e, "Eviction pass after promotion failed");
                }
            }
            Ok(PromoteOutcome::AlreadyPromoted) => {
                debug!(remote_id, "Track was already durable");
            }
            Ok(PromoteOutcome::SourceMissing) => {
                warn!(remote_id, "No cached file to promote");
            }
            Err(e) => {
                error!(remote_id, error = %e, "Promotion failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use core_library::MemoryTrackStore;
    use std::path::Path;
    use tokio::io::AsyncWriteExt;

    fn test_cache(dir: &Path) -> Arc<CacheStore> {
        Arc::new(
            CacheStore::new(CacheConfig::new(dir.join("ephemeral"), dir.join("durable"))).unwrap(),
        )
    }

    async fn write_ephemeral(cache: &CacheStore, remote_id: &str, data: &[u8]) {
        let mut file = cache.open_for_write(remote_id).await.unwrap();
        file.write_all(data).await.unwrap();
        file.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_promotes_exactly_on_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let cache = test_cache(dir.path());
        cache.init().await.unwrap();
        let store = Arc::new(MemoryTrackStore::new());
        let track = TrackRecord::remote("Song", "Artist", "yt123");
        store.insert(&track).await.unwrap();
        write_ephemeral(&cache, "yt123", b"audio bytes").await;

        let tracker =
            PromotionTracker::new(cache.clone(), EvictionPolicy::new(u64::MAX), store.clone(), 3);

        // Plays 1 and 2: nothing happens.
        tracker.on_play_recorded(&track, 1).await;
        tracker.on_play_recorded(&track, 2).await;
        assert!(matches!(
            cache.locate("yt123").await,
            Some((crate::store::CacheTier::Ephemeral, _))
        ));

        // Play 3: promoted, metadata updated.
        tracker.on_play_recorded(&track, 3).await;
        assert!(matches!(
            cache.locate("yt123").await,
            Some((crate::store::CacheTier::Durable, _))
        ));
        let updated = store.find_by_id(&track.id).await.unwrap().unwrap();
        assert!(updated.is_cached);
        assert_eq!(
            updated.local_path_buf(),
            Some(cache.durable_path("yt123"))
        );

        // Plays 4 and 5: still exactly one durable file.
        tracker.on_play_recorded(&track, 4).await;
        tracker.on_play_recorded(&track, 5).await;
        assert_eq!(cache.durable_entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_source_does_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let cache = test_cache(dir.path());
        cache.init().await.unwrap();
        let store = Arc::new(MemoryTrackStore::new());
        let track = TrackRecord::remote("Song", "Artist", "never-downloaded");
        store.insert(&track).await.unwrap();

        let tracker =
            PromotionTracker::new(cache.clone(), EvictionPolicy::new(u64::MAX), store.clone(), 3);

        // Nothing was ever streamed for this track; logged and ignored.
        tracker.on_play_recorded(&track, 3).await;
        let unchanged = store.find_by_id(&track.id).await.unwrap().unwrap();
        assert!(!unchanged.is_cached);
    }

    #[tokio::test]
    async fn test_local_track_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = test_cache(dir.path());
        cache.init().await.unwrap();
        let store = Arc::new(MemoryTrackStore::new());
        let track = TrackRecord::local("Song", "Artist", "/library/song.flac");

        let tracker =
            PromotionTracker::new(cache.clone(), EvictionPolicy::new(u64::MAX), store, 3);
        tracker.on_play_recorded(&track, 3).await;
        assert!(cache.durable_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_promotion_triggers_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let cache = test_cache(dir.path());
        cache.init().await.unwrap();
        let store = Arc::new(MemoryTrackStore::new());

        // Pre-existing durable file with an old access time.
        write_ephemeral(&cache, "old", &[0u8; 80]).await;
        cache.promote("old").await.unwrap();
        let stale = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
        let file = std::fs::OpenOptions::new()
            .append(true)
            .open(cache.durable_path("old"))
            .unwrap();
        file.set_times(
            std::fs::FileTimes::new()
                .set_accessed(stale)
                .set_modified(stale),
        )
        .unwrap();

        let track = TrackRecord::remote("Song", "Artist", "hot");
        store.insert(&track).await.unwrap();
        write_ephemeral(&cache, "hot", &[0u8; 80]).await;

        // Quota fits one file: promoting "hot" must push out "old".
        let tracker = PromotionTracker::new(cache.clone(), EvictionPolicy::new(100), store, 3);
        tracker.on_play_recorded(&track, 3).await;

        assert!(cache.locate("hot").await.is_some());
        assert!(cache.locate("old").await.is_none());
        assert!(cache.durable_size().await.unwrap() <= 100);
    }
}
