//! Cache configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default durable-tier quota: 5 GiB.
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Default play count at which a track is promoted to the durable tier.
pub const DEFAULT_PROMOTION_THRESHOLD: i64 = 3;

/// Configuration for the tiered media cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory for in-flight downloads not yet confirmed popular.
    pub ephemeral_dir: PathBuf,

    /// Directory for promoted tracks, subject to the quota.
    pub durable_dir: PathBuf,

    /// Maximum total size of the durable tier in bytes (default: 5 GiB).
    pub quota_bytes: u64,

    /// Play count at which a track is promoted (fires on the exact
    /// transition, default: 3).
    pub promotion_threshold: i64,

    /// File extension for cached audio files (default: "mp3").
    pub audio_extension: String,
}

impl CacheConfig {
    pub fn new(ephemeral_dir: impl Into<PathBuf>, durable_dir: impl Into<PathBuf>) -> Self {
        Self {
            ephemeral_dir: ephemeral_dir.into(),
            durable_dir: durable_dir.into(),
            quota_bytes: DEFAULT_QUOTA_BYTES,
            promotion_threshold: DEFAULT_PROMOTION_THRESHOLD,
            audio_extension: "mp3".to_string(),
        }
    }

    /// Set the durable-tier quota.
    pub fn with_quota_bytes(mut self, bytes: u64) -> Self {
        self.quota_bytes = bytes;
        self
    }

    /// Set the promotion threshold.
    pub fn with_promotion_threshold(mut self, plays: i64) -> Self {
        self.promotion_threshold = plays;
        self
    }

    /// Set the audio file extension.
    pub fn with_audio_extension(mut self, ext: impl Into<String>) -> Self {
        self.audio_extension = ext.into();
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.quota_bytes == 0 {
            return Err("quota_bytes must be greater than 0".to_string());
        }
        if self.promotion_threshold < 1 {
            return Err("promotion_threshold must be at least 1".to_string());
        }
        if self.audio_extension.is_empty() || self.audio_extension.contains('.') {
            return Err("audio_extension must be a bare extension".to_string());
        }
        if self.ephemeral_dir == self.durable_dir {
            return Err("ephemeral_dir and durable_dir must differ".to_string());
        }
        Ok(())
    }
}
