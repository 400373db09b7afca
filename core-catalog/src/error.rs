use thiserror::Error;

/// Errors surfaced by the catalog provider and the components built on it.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Identifier unknown to the provider.
    #[error("Not found in catalog: {0}")]
    NotFound(String),

    /// The provider rejected the request or is down.
    #[error("Catalog provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Transient network failure; safe to retry on the next request.
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Error from the local metadata store.
    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),
}

impl CatalogError {
    /// Returns `true` if this error is transient and the operation can be
    /// retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CatalogError::ProviderUnavailable(_) | CatalogError::TransientNetwork(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
