use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    /// Disk full, permissions, or other filesystem failure.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),
}

pub type Result<T> = std::result::Result<T, CacheError>;
