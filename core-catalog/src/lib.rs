//! # Catalog Provider Surface
//!
//! The remote search/metadata/audio-retrieval service, consumed as an opaque
//! trait, plus the short-lived in-memory cache for its search results and the
//! pagination stitching that merges cached remote pages with live
//! local-library lookups.
//!
//! Provider failures degrade gracefully: search and related-track lookups
//! return empty result sets (logged) rather than propagating, so local
//! results are always shown even when the remote catalog is down.

pub mod error;
pub mod provider;
pub mod search;
pub mod search_cache;

pub use error::{CatalogError, Result};
pub use provider::{AudioByteStream, CatalogItem, CatalogProvider};
pub use search::{SearchHit, SearchService};
pub use search_cache::SearchResultCache;
