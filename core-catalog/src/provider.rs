//! Catalog provider trait

use crate::error::{CatalogError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// A chunked audio byte stream produced by [`CatalogProvider::fetch_audio`].
///
/// Chunk boundaries carry no meaning; consumers must treat the stream as a
/// plain byte sequence.
pub type AudioByteStream = BoxStream<'static, std::result::Result<Bytes, CatalogError>>;

/// A search result from the remote catalog.
///
/// Not persisted by the core; merged with local track records by the search
/// service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub remote_id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_secs: Option<i64>,
    pub thumbnail: Option<String>,
}

/// Remote search/metadata/audio-retrieval service.
///
/// Implementations wrap whatever network client or subprocess actually talks
/// to the catalog; the core only depends on this surface.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Search the catalog for tracks matching `query`.
    ///
    /// # Errors
    /// May fail with [`CatalogError::ProviderUnavailable`] or
    /// [`CatalogError::TransientNetwork`]. Callers that present merged search
    /// results treat failures as an empty result set.
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<CatalogItem>>;

    /// Open an audio byte stream for the given remote identifier.
    ///
    /// # Errors
    /// - [`CatalogError::NotFound`] if the identifier is unknown
    /// - [`CatalogError::ProviderUnavailable`] / [`CatalogError::TransientNetwork`]
    ///   on dependency failure; nothing is cached for a failed attempt
    async fn fetch_audio(&self, remote_id: &str) -> Result<AudioByteStream>;

    /// Fetch tracks related to the given remote identifier (radio mode).
    async fn related_tracks(&self, remote_id: &str, limit: u32) -> Result<Vec<CatalogItem>>;
}
