//! Track store trait and in-memory implementation
//!
//! This is the narrow surface the cache core needs from the metadata store.
//! Schema ownership, migrations and richer querying belong to the storage
//! crate implementing the trait.

use crate::error::Result;
use crate::models::{PlayStat, TrackId, TrackRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Metadata store surface used by the cache and streaming components.
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Find a track by its ID
    ///
    /// # Returns
    /// - `Ok(Some(record))` if found
    /// - `Ok(None)` if not found
    /// - `Err` if a storage error occurs
    async fn find_by_id(&self, id: &TrackId) -> Result<Option<TrackRecord>>;

    /// Find a track by its remote catalog identifier
    async fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<TrackRecord>>;

    /// Find a track matching either its ID or its remote identifier.
    ///
    /// Callers frequently hold an opaque identifier that may be either; this
    /// resolves both in one query.
    async fn resolve(&self, id_or_remote_id: &str) -> Result<Option<TrackRecord>>;

    /// Insert a new track record
    ///
    /// # Errors
    /// Returns error if the record fails validation or already exists.
    async fn insert(&self, record: &TrackRecord) -> Result<()>;

    /// Update the cache-related fields of a record.
    async fn update_cache_fields(
        &self,
        id: &TrackId,
        is_cached: bool,
        local_path: Option<&Path>,
    ) -> Result<()>;

    /// Set the thumbnail URL of a record.
    async fn update_thumbnail(&self, id: &TrackId, thumbnail: &str) -> Result<()>;

    /// Record a play event for `(user_id, track_id)`, creating the stat row
    /// on first play and incrementing it afterwards.
    ///
    /// # Returns
    /// The updated statistics, including the new play count.
    async fn record_play(
        &self,
        user_id: &str,
        track_id: &TrackId,
        at: DateTime<Utc>,
    ) -> Result<PlayStat>;

    /// Read the play statistics for `(user_id, track_id)`, if any.
    async fn play_stat(&self, user_id: &str, track_id: &TrackId) -> Result<Option<PlayStat>>;

    /// Substring search over title, artist and album.
    async fn search(&self, query: &str, offset: u32, limit: u32) -> Result<Vec<TrackRecord>>;

    /// All records currently flagged as cached. Used by the startup
    /// reconciliation sweep.
    async fn cached_records(&self) -> Result<Vec<TrackRecord>>;
}

// =============================================================================
// In-memory implementation
// =============================================================================

#[derive(Default)]
struct MemoryState {
    tracks: HashMap<TrackId, TrackRecord>,
    stats: HashMap<(String, TrackId), PlayStat>,
}

/// In-memory [`TrackStore`] for tests and examples.
#[derive(Default)]
pub struct MemoryTrackStore {
    state: Mutex<MemoryState>,
}

impl MemoryTrackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrackStore for MemoryTrackStore {
    async fn find_by_id(&self, id: &TrackId) -> Result<Option<TrackRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state.tracks.get(id).cloned())
    }

    async fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<TrackRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tracks
            .values()
            .find(|t| t.remote_id.as_deref() == Some(remote_id))
            .cloned())
    }

    async fn resolve(&self, id_or_remote_id: &str) -> Result<Option<TrackRecord>> {
        if let Ok(id) = TrackId::from_string(id_or_remote_id) {
            if let Some(record) = self.find_by_id(&id).await? {
                return Ok(Some(record));
            }
        }
        self.find_by_remote_id(id_or_remote_id).await
    }

    async fn insert(&self, record: &TrackRecord) -> Result<()> {
        record
            .validate()
            .map_err(|message| crate::error::LibraryError::InvalidInput {
                field: "track".to_string(),
                message,
            })?;
        let mut state = self.state.lock().unwrap();
        state.tracks.insert(record.id, record.clone());
        Ok(())
    }

    async fn update_cache_fields(
        &self,
        id: &TrackId,
        is_cached: bool,
        local_path: Option<&Path>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state.tracks.get_mut(id) {
            record.is_cached = is_cached;
            record.local_path = local_path.map(|p| p.to_string_lossy().into_owned());
        }
        Ok(())
    }

    async fn update_thumbnail(&self, id: &TrackId, thumbnail: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state.tracks.get_mut(id) {
            record.thumbnail = Some(thumbnail.to_string());
        }
        Ok(())
    }

    async fn record_play(
        &self,
        user_id: &str,
        track_id: &TrackId,
        at: DateTime<Utc>,
    ) -> Result<PlayStat> {
        let mut state = self.state.lock().unwrap();
        let stat = state
            .stats
            .entry((user_id.to_string(), *track_id))
            .and_modify(|s| {
                s.play_count += 1;
                s.last_played = at;
            })
            .or_insert(PlayStat {
                user_id: user_id.to_string(),
                track_id: *track_id,
                play_count: 1,
                last_played: at,
            });
        Ok(stat.clone())
    }

    async fn play_stat(&self, user_id: &str, track_id: &TrackId) -> Result<Option<PlayStat>> {
        let state = self.state.lock().unwrap();
        Ok(state.stats.get(&(user_id.to_string(), *track_id)).cloned())
    }

    async fn search(&self, query: &str, offset: u32, limit: u32) -> Result<Vec<TrackRecord>> {
        let state = self.state.lock().unwrap();
        let needle = query.to_lowercase();
        let mut matches: Vec<TrackRecord> = state
            .tracks
            .values()
            .filter(|t| {
                t.title.to_lowercase().contains(&needle)
                    || t.artist.to_lowercase().contains(&needle)
                    || t.album
                        .as_deref()
                        .is_some_and(|a| a.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.added_at.cmp(&b.added_at));
        Ok(matches
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn cached_records(&self) -> Result<Vec<TrackRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state.tracks.values().filter(|t| t.is_cached).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_by_id_and_remote_id() {
        let store = MemoryTrackStore::new();
        let record = TrackRecord::remote("Song", "Artist", "yt123");
        store.insert(&record).await.unwrap();

        let by_id = store.resolve(&record.id.to_string()).await.unwrap();
        assert_eq!(by_id.as_ref().map(|r| r.id), Some(record.id));

        let by_remote = store.resolve("yt123").await.unwrap();
        assert_eq!(by_remote.map(|r| r.id), Some(record.id));

        assert!(store.resolve("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_play_increments() {
        let store = MemoryTrackStore::new();
        let record = TrackRecord::remote("Song", "Artist", "yt123");
        store.insert(&record).await.unwrap();

        for expected in 1..=3 {
            let stat = store
                .record_play("user-1", &record.id, Utc::now())
                .await
                .unwrap();
            assert_eq!(stat.play_count, expected);
        }
    }

    #[tokio::test]
    async fn test_update_cache_fields() {
        let store = MemoryTrackStore::new();
        let record = TrackRecord::remote("Song", "Artist", "yt123");
        store.insert(&record).await.unwrap();

        store
            .update_cache_fields(&record.id, true, Some(Path::new("/cache/yt123.mp3")))
            .await
            .unwrap();

        let updated = store.find_by_id(&record.id).await.unwrap().unwrap();
        assert!(updated.is_cached);
        assert_eq!(updated.local_path.as_deref(), Some("/cache/yt123.mp3"));
        assert_eq!(store.cached_records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_matches_title_artist_album() {
        let store = MemoryTrackStore::new();
        let mut a = TrackRecord::remote("Blue Train", "Coltrane", "yt1");
        a.album = Some("Blue Train".to_string());
        let b = TrackRecord::remote("So What", "Miles Davis", "yt2");
        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();

        let hits = store.search("blue", 0, 20).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, a.id);
    }
}
