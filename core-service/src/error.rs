use thiserror::Error;

/// Errors surfaced by the service facade.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Invalid or incomplete configuration. Raised before any component
    /// starts, never during steady-state operation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The requested track is unknown to the metadata store.
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Cache error: {0}")]
    Cache(#[from] core_cache::CacheError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] core_catalog::CatalogError),

    #[error("Streaming error: {0}")]
    Stream(#[from] core_streaming::StreamError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
