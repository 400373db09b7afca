//! # Service Configuration
//!
//! Builder-pattern configuration for the media service. Validation is
//! fail-fast: every invalid value is reported at [`ServiceConfigBuilder::build`]
//! time, before any component touches the disk or the network.
//!
//! ## Usage
//!
//! ```ignore
//! use core_service::ServiceConfig;
//!
//! let config = ServiceConfig::builder()
//!     .database_url("sqlite:/var/lib/media/library.db")
//!     .ephemeral_dir("/var/cache/media/ephemeral")
//!     .durable_dir("/var/cache/media/durable")
//!     .quota_bytes(2 * 1024 * 1024 * 1024)
//!     .build()?;
//! ```

use crate::error::{Result, ServiceError};
use core_cache::CacheConfig;
use core_catalog::search::DEFAULT_SEARCH_BATCH_SIZE;
use core_catalog::search_cache::DEFAULT_SEARCH_TTL_SECS;
use core_streaming::DEFAULT_FETCH_TIMEOUT;
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration for [`MediaService`](crate::MediaService).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// SQLite database URL; only needed when the service opens its own store.
    pub database_url: Option<String>,

    /// Tiered cache layout and policy knobs.
    pub cache: CacheConfig,

    /// How long a catalog search batch stays servable (default: 300s).
    pub search_ttl_secs: i64,

    /// Catalog items fetched per provider search call (default: 100).
    pub search_batch_size: u32,

    /// Deadline for one remote audio fetch; `None` disables the deadline.
    pub fetch_timeout: Option<Duration>,
}

impl ServiceConfig {
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        self.cache.validate().map_err(ServiceError::Config)?;
        if self.search_ttl_secs <= 0 {
            return Err(ServiceError::Config(
                "search_ttl_secs must be positive".to_string(),
            ));
        }
        if self.search_batch_size == 0 {
            return Err(ServiceError::Config(
                "search_batch_size must be greater than 0".to_string(),
            ));
        }
        if let Some(timeout) = self.fetch_timeout {
            if timeout.is_zero() {
                return Err(ServiceError::Config(
                    "fetch_timeout must be greater than zero; use None to disable".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Default)]
pub struct ServiceConfigBuilder {
    database_url: Option<String>,
    ephemeral_dir: Option<PathBuf>,
    durable_dir: Option<PathBuf>,
    quota_bytes: Option<u64>,
    promotion_threshold: Option<i64>,
    audio_extension: Option<String>,
    search_ttl_secs: Option<i64>,
    search_batch_size: Option<u32>,
    fetch_timeout: Option<Option<Duration>>,
}

impl ServiceConfigBuilder {
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Directory for in-flight downloads (required).
    pub fn ephemeral_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ephemeral_dir = Some(dir.into());
        self
    }

    /// Directory for promoted tracks (required).
    pub fn durable_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.durable_dir = Some(dir.into());
        self
    }

    /// Durable-tier quota in bytes (default: 5 GiB).
    pub fn quota_bytes(mut self, bytes: u64) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    /// Play count at which a track is promoted (default: 3).
    pub fn promotion_threshold(mut self, plays: i64) -> Self {
        self.promotion_threshold = Some(plays);
        self
    }

    /// Cached audio file extension (default: "mp3").
    pub fn audio_extension(mut self, ext: impl Into<String>) -> Self {
        self.audio_extension = Some(ext.into());
        self
    }

    /// Search result cache TTL in seconds (default: 300).
    pub fn search_ttl_secs(mut self, secs: i64) -> Self {
        self.search_ttl_secs = Some(secs);
        self
    }

    /// Provider items per search batch (default: 100).
    pub fn search_batch_size(mut self, size: u32) -> Self {
        self.search_batch_size = Some(size);
        self
    }

    /// Remote fetch deadline; `None` disables it (default: 300s).
    pub fn fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<ServiceConfig> {
        let ephemeral_dir = self.ephemeral_dir.ok_or_else(|| {
            ServiceError::Config(
                "Ephemeral cache directory is required. Use .ephemeral_dir() to set it."
                    .to_string(),
            )
        })?;
        let durable_dir = self.durable_dir.ok_or_else(|| {
            ServiceError::Config(
                "Durable cache directory is required. Use .durable_dir() to set it.".to_string(),
            )
        })?;

        let mut cache = CacheConfig::new(ephemeral_dir, durable_dir);
        if let Some(bytes) = self.quota_bytes {
            cache = cache.with_quota_bytes(bytes);
        }
        if let Some(plays) = self.promotion_threshold {
            cache = cache.with_promotion_threshold(plays);
        }
        if let Some(ext) = self.audio_extension {
            cache = cache.with_audio_extension(ext);
        }

        let config = ServiceConfig {
            database_url: self.database_url,
            cache,
            search_ttl_secs: self.search_ttl_secs.unwrap_or(DEFAULT_SEARCH_TTL_SECS),
            search_batch_size: self.search_batch_size.unwrap_or(DEFAULT_SEARCH_BATCH_SIZE),
            fetch_timeout: self.fetch_timeout.unwrap_or(Some(DEFAULT_FETCH_TIMEOUT)),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ServiceConfig::builder()
            .ephemeral_dir("/tmp/eph")
            .durable_dir("/tmp/dur")
            .build()
            .unwrap();

        assert_eq!(config.search_ttl_secs, 300);
        assert_eq!(config.search_batch_size, 100);
        assert_eq!(config.fetch_timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.cache.promotion_threshold, 3);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_builder_requires_both_directories() {
        let missing_durable = ServiceConfig::builder().ephemeral_dir("/tmp/eph").build();
        assert!(matches!(missing_durable, Err(ServiceError::Config(_))));

        let missing_ephemeral = ServiceConfig::builder().durable_dir("/tmp/dur").build();
        assert!(matches!(missing_ephemeral, Err(ServiceError::Config(_))));
    }

    #[test]
    fn test_builder_rejects_invalid_values() {
        let zero_batch = ServiceConfig::builder()
            .ephemeral_dir("/tmp/eph")
            .durable_dir("/tmp/dur")
            .search_batch_size(0)
            .build();
        assert!(zero_batch.is_err());

        let zero_ttl = ServiceConfig::builder()
            .ephemeral_dir("/tmp/eph")
            .durable_dir("/tmp/dur")
            .search_ttl_secs(0)
            .build();
        assert!(zero_ttl.is_err());

        let zero_timeout = ServiceConfig::builder()
            .ephemeral_dir("/tmp/eph")
            .durable_dir("/tmp/dur")
            .fetch_timeout(Some(Duration::ZERO))
            .build();
        assert!(zero_timeout.is_err());

        let same_dirs = ServiceConfig::builder()
            .ephemeral_dir("/tmp/cache")
            .durable_dir("/tmp/cache")
            .build();
        assert!(same_dirs.is_err());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = ServiceConfig::builder()
            .database_url("sqlite:/data/library.db")
            .ephemeral_dir("/tmp/eph")
            .durable_dir("/tmp/dur")
            .quota_bytes(1024)
            .promotion_threshold(5)
            .audio_extension("ogg")
            .search_ttl_secs(60)
            .search_batch_size(25)
            .fetch_timeout(None)
            .build()
            .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("sqlite:/data/library.db"));
        assert_eq!(config.cache.quota_bytes, 1024);
        assert_eq!(config.cache.promotion_threshold, 5);
        assert_eq!(config.cache.audio_extension, "ogg");
        assert_eq!(config.search_ttl_secs, 60);
        assert_eq!(config.search_batch_size, 25);
        assert_eq!(config.fetch_timeout, None);
    }
}
