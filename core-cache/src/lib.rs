//! # Tiered Media Cache
//!
//! Two-tier on-disk cache for streamed audio:
//!
//! - the **ephemeral tier** receives bytes as they are pulled from the remote
//!   provider, before a track has proven popular;
//! - the **durable tier** holds promoted tracks, bounded by a byte quota that
//!   the eviction policy enforces after every promotion.
//!
//! Promotion is an atomic rename triggered by an observed play-count signal
//! (the [`PromotionTracker`]); eviction deletes least-recently-accessed
//! durable files until the tier fits the quota again. A startup
//! [`reconcile`] sweep repairs disagreements between the filesystem and the
//! metadata store left behind by a crash mid-operation.

pub mod config;
pub mod error;
pub mod eviction;
pub mod promotion;
pub mod reconcile;
pub mod store;

pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use eviction::{EvictionPolicy, EvictionReport};
pub use promotion::PromotionTracker;
pub use reconcile::{reconcile, ReconcileReport};
pub use store::{CacheEntry, CacheStore, CacheTier, PromoteOutcome};
