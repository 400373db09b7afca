//! SQLite implementation of the track store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_library::{LibraryError, PlayStat, Result, TrackId, TrackRecord, TrackStore};
use sqlx::{query, query_as, Pool, Sqlite};
use std::path::Path;
use tracing::debug;

/// SQLite implementation of [`TrackStore`].
pub struct SqliteTrackStore {
    pool: Pool<Sqlite>,
}

impl SqliteTrackStore {
    /// Create a new SQLite track store over an existing pool.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Create the tables this store needs, if they do not exist yet.
    pub async fn init_schema(&self) -> Result<()> {
        query(
            r#"
            CREATE TABLE IF NOT EXISTS tracks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                artist TEXT NOT NULL,
                album TEXT,
                duration_secs INTEGER,
                source TEXT NOT NULL,
                remote_id TEXT UNIQUE,
                local_path TEXT,
                is_cached BOOLEAN NOT NULL DEFAULT FALSE,
                thumbnail TEXT,
                added_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        query(
            r#"
            CREATE TABLE IF NOT EXISTS play_stats (
                user_id TEXT NOT NULL,
                track_id TEXT NOT NULL,
                play_count INTEGER NOT NULL DEFAULT 0,
                last_played TEXT NOT NULL,
                PRIMARY KEY (user_id, track_id),
                FOREIGN KEY (track_id) REFERENCES tracks(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("Track store schema initialized");
        Ok(())
    }
}

#[async_trait]
impl TrackStore for SqliteTrackStore {
    async fn find_by_id(&self, id: &TrackId) -> Result<Option<TrackRecord>> {
        let record = query_as::<_, TrackRecord>("SELECT * FROM tracks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<TrackRecord>> {
        let record = query_as::<_, TrackRecord>("SELECT * FROM tracks WHERE remote_id = ?")
            .bind(remote_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn resolve(&self, id_or_remote_id: &str) -> Result<Option<TrackRecord>> {
        // Ids are stored in sqlx's Uuid encoding, not as display strings, so
        // the id leg must bind a parsed TrackId rather than the raw text.
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
            .map_err(|message| LibraryError::InvalidInput {
                field: "track".to_string(),
                message,
            })?;

        query(
            r#"
            INSERT INTO tracks
                (id, title, artist, album, duration_secs, source, remote_id,
                 local_path, is_cached, thumbnail, added_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id)
        .bind(&record.title)
        .bind(&record.artist)
        .bind(&record.album)
        .bind(record.duration_secs)
        .bind(record.source)
        .bind(&record.remote_id)
        .bind(&record.local_path)
        .bind(record.is_cached)
        .bind(&record.thumbnail)
        .bind(record.added_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_cache_fields(
        &self,
        id: &TrackId,
        is_cached: bool,
        local_path: Option<&Path>,
    ) -> Result<()> {
        query("UPDATE tracks SET is_cached = ?, local_path = ? WHERE id = ?")
            .bind(is_cached)
            .bind(local_path.map(|p| p.to_string_lossy().into_owned()))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_thumbnail(&self, id: &TrackId, thumbnail: &str) -> Result<()> {
        query("UPDATE tracks SET thumbnail = ? WHERE id = ?")
            .bind(thumbnail)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn record_play(
        &self,
        user_id: &str,
        track_id: &TrackId,
        at: DateTime<Utc>,
    ) -> Result<PlayStat> {
        // Upsert keeps first-play insert and increment in one statement.
        let stat = query_as::<_, PlayStat>(
            r#"
            INSERT INTO play_stats (user_id, track_id, play_count, last_played)
            VALUES (?, ?, 1, ?)
            ON CONFLICT (user_id, track_id) DO UPDATE SET
                play_count = play_count + 1,
                last_played = excluded.last_played
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(track_id)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stat)
    }

    async fn play_stat(&self, user_id: &str, track_id: &TrackId) -> Result<Option<PlayStat>> {
        let stat = query_as::<_, PlayStat>(
            "SELECT * FROM play_stats WHERE user_id = ? AND track_id = ?",
        )
        .bind(user_id)
        .bind(track_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stat)
    }

    async fn search(&self, search_query: &str, offset: u32, limit: u32) -> Result<Vec<TrackRecord>> {
        let pattern = format!("%{}%", search_query);
        let records = query_as::<_, TrackRecord>(
            r#"
            SELECT * FROM tracks
            WHERE title LIKE ? OR artist LIKE ? OR album LIKE ?
            ORDER BY added_at
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn cached_records(&self) -> Result<Vec<TrackRecord>> {
        let records = query_as::<_, TrackRecord>("SELECT * FROM tracks WHERE is_cached = TRUE")
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect, DatabaseConfig};

    async fn test_store() -> SqliteTrackStore {
        let pool = connect(&DatabaseConfig::in_memory()).await.unwrap();
        let store = SqliteTrackStore::new(pool);
        store.init_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_insert_and_resolve() {
        let store = test_store().await;
        let record = TrackRecord::remote("Song", "Artist", "yt123");
        store.insert(&record).await.unwrap();

        let by_id = store.find_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(by_id.title, "Song");

        let by_remote = store.resolve("yt123").await.unwrap().unwrap();
        assert_eq!(by_remote.id, record.id);

        assert!(store.resolve("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_by_uuid_string() {
        let store = test_store().await;
        let record = TrackRecord::remote("Song", "Artist", "yt123");
        store.insert(&record).await.unwrap();

        let by_id = store.resolve(&record.id.to_string()).await.unwrap();
        assert_eq!(by_id.unwrap().id, record.id);

        // A well-formed uuid with no matching row is simply absent.
        let missing = TrackId::new();
        assert!(store.resolve(&missing.to_string()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_field_updates() {
        let store = test_store().await;
        let record = TrackRecord::remote("Song", "Artist", "yt123");
        store.insert(&record).await.unwrap();

        store
            .update_cache_fields(&record.id, true, Some(Path::new("/cache/abc.mp3")))
            .await
            .unwrap();

        let updated = store.find_by_id(&record.id).await.unwrap().unwrap();
        assert!(updated.is_cached);
        assert_eq!(updated.local_path.as_deref(), Some("/cache/abc.mp3"));

        let cached = store.cached_records().await.unwrap();
        assert_eq!(cached.len(), 1);

        store
            .update_cache_fields(&record.id, false, None)
            .await
            .unwrap();
        let cleared = store.find_by_id(&record.id).await.unwrap().unwrap();
        assert!(!cleared.is_cached);
        assert!(cleared.local_path.is_none());
    }

    #[tokio::test]
    async fn test_record_play_upsert() {
        let store = test_store().await;
        let record = TrackRecord::remote("Song", "Artist", "yt123");
        store.insert(&record).await.unwrap();

        let first = store
            .record_play("user-1", &record.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(first.play_count, 1);

        let second = store
            .record_play("user-1", &record.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(second.play_count, 2);

        // A different user starts from one.
        let other = store
            .record_play("user-2", &record.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(other.play_count, 1);
    }

    #[tokio::test]
    async fn test_search_pagination() {
        let store = test_store().await;
        for i in 0..5 {
            let record = TrackRecord::remote(format!("Blue {}", i), "Artist", format!("yt{}", i));
            store.insert(&record).await.unwrap();
        }

        let page = store.search("Blue", 2, 2).await.unwrap();
        assert_eq!(page.len(), 2);

        let none = store.search("Red", 0, 10).await.unwrap();
        assert!(none.is_empty());
    }
}
