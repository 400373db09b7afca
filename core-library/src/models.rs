//! Domain models for track metadata
//!
//! A track is either a file discovered in the local library or a remote
//! catalog entry known by its provider identifier. The original source of a
//! record is carried explicitly in [`SourceKind`] instead of being inferred
//! from which optional fields happen to be set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Track Records
// =============================================================================

/// Where a track record originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Indexed from the local library directory.
    Local,
    /// Known only through the remote catalog provider.
    Remote,
}

/// A persisted track record.
///
/// The cache core reads and writes a subset of these fields: it resolves
/// records by id or remote id, flips `{is_cached, local_path}` when the
/// streaming pipeline or promotion finishes writing a file, and backfills
/// `thumbnail` from catalog search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrackRecord {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_secs: Option<i64>,
    pub source: SourceKind,
    /// Provider identifier; always present for `SourceKind::Remote`.
    pub remote_id: Option<String>,
    /// Path of the durable local copy, when one exists.
    pub local_path: Option<String>,
    pub is_cached: bool,
    pub thumbnail: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl TrackRecord {
    /// Create a record for a remote catalog track that has not been
    /// downloaded yet.
    pub fn remote(title: impl Into<String>, artist: impl Into<String>, remote_id: impl Into<String>) -> Self {
        Self {
            id: TrackId::new(),
            title: title.into(),
            artist: artist.into(),
            album: None,
            duration_secs: None,
            source: SourceKind::Remote,
            remote_id: Some(remote_id.into()),
            local_path: None,
            is_cached: false,
            thumbnail: None,
            added_at: Utc::now(),
        }
    }

    /// Create a record for a file already present in the local library.
    pub fn local(title: impl Into<String>, artist: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: TrackId::new(),
            title: title.into(),
            artist: artist.into(),
            album: None,
            duration_secs: None,
            source: SourceKind::Local,
            remote_id: None,
            local_path: Some(path.into().to_string_lossy().into_owned()),
            is_cached: true,
            thumbnail: None,
            added_at: Utc::now(),
        }
    }

    pub fn local_path_buf(&self) -> Option<PathBuf> {
        self.local_path.as_ref().map(PathBuf::from)
    }

    /// Validate invariants that the store relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.is_empty() {
            return Err("title cannot be empty".to_string());
        }
        if self.source == SourceKind::Remote && self.remote_id.is_none() {
            return Err("remote tracks must carry a remote_id".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Play Statistics
// =============================================================================

/// Per-user play statistics for a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlayStat {
    pub user_id: String,
    pub track_id: TrackId,
    pub play_count: i64,
    pub last_played: DateTime<Utc>,
}
