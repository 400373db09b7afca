//! Two-tier cache store
//!
//! Maps a remote track identifier to a filesystem location and tier, and
//! performs tier transitions atomically. Size accounting is recomputed on
//! demand rather than kept as a counter; correctness over micro-optimization.

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use sha2::{Digest, Sha256};
use std::fs::FileTimes;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, instrument, warn};

/// Cache tier a file lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    /// Mid-stream download, not yet confirmed popular.
    Ephemeral,
    /// Promoted, persistent, subject to the quota.
    Durable,
}

/// Outcome of a promotion attempt. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoteOutcome {
    /// The ephemeral file was moved into the durable tier.
    Promoted,
    /// A durable file already existed; its access time was refreshed so the
    /// re-promoted track resists eviction.
    AlreadyPromoted,
    /// Neither tier holds a file for this identifier.
    SourceMissing,
}

/// A durable-tier file, derived from the filesystem on demand.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub last_access: SystemTime,
}

/// Owns the two-tier on-disk layout.
pub struct CacheStore {
    config: CacheConfig,
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate().map_err(CacheError::InvalidConfig)?;
        Ok(Self { config })
    }

    /// Create both tier directories if they do not exist yet.
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.ephemeral_dir).await?;
        tokio::fs::create_dir_all(&self.config.durable_dir).await?;
        Ok(())
    }

    /// Stable filename for a remote identifier.
    ///
    /// Filesystem-safe identifiers are used literally (which lets the
    /// reconcile sweep recover the owner from a filename); anything else
    /// falls back to a sha256 digest.
    pub fn file_name(&self, remote_id: &str) -> String {
        let safe = !remote_id.is_empty()
            && remote_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        let stem = if safe {
            remote_id.to_string()
        } else {
            let digest = Sha256::digest(remote_id.as_bytes());
            format!("{:x}", digest)
        };
        format!("{}.{}", stem, self.config.audio_extension)
    }

    pub fn ephemeral_path(&self, remote_id: &str) -> PathBuf {
        self.config.ephemeral_dir.join(self.file_name(remote_id))
    }

    pub fn durable_path(&self, remote_id: &str) -> PathBuf {
        self.config.durable_dir.join(self.file_name(remote_id))
    }

    /// Find the cached file for `remote_id`, durable tier preferred.
    pub async fn locate(&self, remote_id: &str) -> Option<(CacheTier, PathBuf)> {
        let durable = self.durable_path(remote_id);
        if tokio::fs::try_exists(&durable).await.unwrap_or(false) {
            return Some((CacheTier::Durable, durable));
        }
        let ephemeral = self.ephemeral_path(remote_id);
        if tokio::fs::try_exists(&ephemeral).await.unwrap_or(false) {
            return Some((CacheTier::Ephemeral, ephemeral));
        }
        None
    }

    /// Open a writable handle at the ephemeral path, creating parent
    /// directories as needed. The caller writes and closes it.
    pub async fn open_for_write(&self, remote_id: &str) -> Result<tokio::fs::File> {
        tokio::fs::create_dir_all(&self.config.ephemeral_dir).await?;
        let path = self.ephemeral_path(remote_id);
        let file = tokio::fs::File::create(&path).await?;
        debug!(remote_id, path = %path.display(), "Opened ephemeral cache file for writing");
        Ok(file)
    }

    /// Move a track's file from the ephemeral to the durable tier.
    ///
    /// Idempotent: a second promotion is a no-op that refreshes the durable
    /// file's access time. A missing source is reported, not raised.
    #[instrument(skip(self))]
    pub async fn promote(&self, remote_id: &str) -> Result<PromoteOutcome> {
        let durable = self.durable_path(remote_id);
        if tokio::fs::try_exists(&durable).await.unwrap_or(false) {
            if let Err(e) = refresh_times(&durable) {
                warn!(remote_id, error = %e, "Failed to refresh access time on durable file");
            }
            info!(remote_id, "Track already in durable tier, refreshed timestamp");
            return Ok(PromoteOutcome::AlreadyPromoted);
        }

        let ephemeral = self.ephemeral_path(remote_id);
        if !tokio::fs::try_exists(&ephemeral).await.unwrap_or(false) {
            warn!(remote_id, "Promotion skipped: no ephemeral file found");
            return Ok(PromoteOutcome::SourceMissing);
        }

        tokio::fs::create_dir_all(&self.config.durable_dir).await?;
        match tokio::fs::rename(&ephemeral, &durable).await {
            Ok(()) => {}
            Err(_) => {
                // Tiers on different filesystems: stage a full copy next to
                // the destination, then rename. The final rename keeps the
                // move all-or-nothing at the durable path.
                let staging = durable.with_extension("part");
                tokio::fs::copy(&ephemeral, &staging).await?;
                tokio::fs::rename(&staging, &durable).await?;
                tokio::fs::remove_file(&ephemeral).await?;
            }
        }

        info!(remote_id, path = %durable.display(), "Promoted track to durable tier");
        Ok(PromoteOutcome::Promoted)
    }

    /// Delete the ephemeral file for `remote_id`, if present.
    ///
    /// Used by the streaming pipeline when an interrupted download must not
    /// be left behind as a silently truncated cache file.
    pub async fn discard_ephemeral(&self, remote_id: &str) -> Result<bool> {
        let path = self.ephemeral_path(remote_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(remote_id, "Discarded partial ephemeral file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// List the durable tier, one entry per regular file.
    pub async fn durable_entries(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.config.durable_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            // Fall back to mtime where atime tracking is disabled.
            let last_access = metadata
                .accessed()
                .or_else(|_| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push(CacheEntry {
                path: entry.path(),
                size_bytes: metadata.len(),
                last_access,
            });
        }
        Ok(entries)
    }

    /// Total size of the durable tier in bytes, recomputed on demand.
    pub async fn durable_size(&self) -> Result<u64> {
        let entries = self.durable_entries().await?;
        Ok(entries.iter().map(|e| e.size_bytes).sum())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

fn refresh_times(path: &Path) -> std::io::Result<()> {
    let file = std::fs::OpenOptions::new().append(true).open(path)?;
    let now = SystemTime::now();
    file.set_times(FileTimes::new().set_accessed(now).set_modified(now))
}
