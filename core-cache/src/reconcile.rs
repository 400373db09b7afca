//! Filesystem / metadata-store reconciliation
//!
//! A crash between a cache-file operation and the matching metadata update
//! can leave a durable file without a flagged record, or a record claiming a
//! path that no longer exists. This sweep repairs both directions and is
//! idempotent, so it runs unconditionally at service startup.

use crate::error::Result;
use crate::store::CacheStore;
use core_library::TrackStore;
use tracing::{debug, info, instrument, warn};

/// Summary of one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records whose cache fields were cleared because the file is gone.
    pub cleared: usize,
    /// Records whose cache fields were restored from a durable file.
    pub restored: usize,
    /// Durable files with no resolvable owner, left for eviction to age out.
    pub orphans: usize,
}

/// Bring metadata-store cache flags back in sync with the durable tier.
#[instrument(skip_all)]
pub async fn reconcile(cache: &CacheStore, store: &dyn TrackStore) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();

    // Records claiming a cached file that is no longer on disk.
    for record in store.cached_records().await? {
        let present = match record.local_path_buf() {
            Some(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            None => false,
        };
        if !present {
            info!(track_id = %record.id, "Cached file missing, clearing cache fields");
            store.update_cache_fields(&record.id, false, None).await?;
            report.cleared += 1;
        }
    }

    // Durable files whose owning record lost (or never got) its flag.
    for entry in cache.durable_entries().await? {
        let Some(stem) = entry.path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match store.find_by_remote_id(stem).await? {
            Some(record) => {
                let path_matches = record.is_cached
                    && record.local_path_buf().as_deref() == Some(entry.path.as_path());
                if !path_matches {
                    info!(track_id = %record.id, path = %entry.path.display(), "Restoring cache fields from durable file");
                    store
                        .update_cache_fields(&record.id, true, Some(&entry.path))
                        .await?;
                    report.restored += 1;
                }
            }
            None => {
                // Hash-named or unowned file; eviction will age it out.
                debug!(path = %entry.path.display(), "Durable file has no owning record");
                report.orphans += 1;
            }
        }
    }

    if report.cleared > 0 || report.restored > 0 || report.orphans > 0 {
        warn!(
            cleared = report.cleared,
            restored = report.restored,
            orphans = report.orphans,
            "Reconciliation repaired filesystem/store drift"
        );
    } else {
        info!("Reconciliation found no drift");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use core_library::{MemoryTrackStore, TrackRecord};
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;

    async fn durable_file(cache: &CacheStore, remote_id: &str) {
        let mut file = cache.open_for_write(remote_id).await.unwrap();
        file.write_all(b"audio").await.unwrap();
        file.flush().await.unwrap();
        drop(file);
        cache.promote(remote_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_clears_records_for_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(CacheConfig::new(
            dir.path().join("ephemeral"),
            dir.path().join("durable"),
        ))
        .unwrap();
        cache.init().await.unwrap();
        let store = Arc::new(MemoryTrackStore::new());

        let mut track = TrackRecord::remote("Song", "Artist", "gone");
        track.is_cached = true;
        track.local_path = Some(
            cache
                .durable_path("gone")
                .to_string_lossy()
                .into_owned(),
        );
        store.insert(&track).await.unwrap();

        let report = reconcile(&cache, store.as_ref()).await.unwrap();
        assert_eq!(report.cleared, 1);
        assert_eq!(report.restored, 0);

        let fixed = store.find_by_id(&track.id).await.unwrap().unwrap();
        assert!(!fixed.is_cached);
        assert!(fixed.local_path.is_none());
    }

    #[tokio::test]
    async fn test_restores_records_for_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(CacheConfig::new(
            dir.path().join("ephemeral"),
            dir.path().join("durable"),
        ))
        .unwrap();
        cache.init().await.unwrap();
        let store = Arc::new(MemoryTrackStore::new());

        let track = TrackRecord::remote("Song", "Artist", "yt123");
        store.insert(&track).await.unwrap();
        durable_file(&cache, "yt123").await;

        let report = reconcile(&cache, store.as_ref()).await.unwrap();
        assert_eq!(report.restored, 1);

        let fixed = store.find_by_id(&track.id).await.unwrap().unwrap();
        assert!(fixed.is_cached);
        assert_eq!(fixed.local_path_buf(), Some(cache.durable_path("yt123")));
    }

    #[tokio::test]
    async fn test_orphan_files_are_counted_not_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(CacheConfig::new(
            dir.path().join("ephemeral"),
            dir.path().join("durable"),
        ))
        .unwrap();
        cache.init().await.unwrap();
        let store = Arc::new(MemoryTrackStore::new());
        durable_file(&cache, "nobody-owns-me").await;

        let report = reconcile(&cache, store.as_ref()).await.unwrap();
        assert_eq!(report.orphans, 1);
        assert!(cache.locate("nobody-owns-me").await.is_some());
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(CacheConfig::new(
            dir.path().join("ephemeral"),
            dir.path().join("durable"),
        ))
        .unwrap();
        cache.init().await.unwrap();
        let store = Arc::new(MemoryTrackStore::new());
        let track = TrackRecord::remote("Song", "Artist", "yt123");
        store.insert(&track).await.unwrap();
        durable_file(&cache, "yt123").await;

        let first = reconcile(&cache, store.as_ref()).await.unwrap();
        assert_eq!(first.restored, 1);

        // Second sweep finds nothing left to fix.
        let second = reconcile(&cache, store.as_ref()).await.unwrap();
        assert_eq!(second, ReconcileReport::default());
    }
}
