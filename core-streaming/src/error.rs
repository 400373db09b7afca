use thiserror::Error;

/// Errors surfaced by the streaming pipeline.
#[derive(Error, Debug)]
pub enum StreamError {
    /// The track is unknown or has no playable source.
    #[error("No playable source for track: {0}")]
    NoSource(String),

    /// Remote catalog failure while opening or reading the provider stream.
    #[error("Catalog error: {0}")]
    Catalog(#[from] core_catalog::CatalogError),

    /// Disk full, permissions, or other filesystem failure. Never silently
    /// drops bytes already promised to the client.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Error from the metadata store.
    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    /// Cache error while preparing the tee.
    #[error("Cache error: {0}")]
    Cache(#[from] core_cache::CacheError),

    /// The provider fetch exceeded its deadline.
    #[error("Provider fetch timed out")]
    FetchTimeout,
}

impl StreamError {
    /// Returns `true` if the failure is safe to retry on the next request.
    pub fn is_transient(&self) -> bool {
        match self {
            StreamError::Catalog(e) => e.is_transient(),
            StreamError::FetchTimeout => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
