//! # Core Library
//!
//! Domain models and the narrow metadata-store surface shared by the media
//! cache core. The rest of the workspace talks to track metadata exclusively
//! through the [`TrackStore`] trait defined here; the SQLite implementation
//! lives in the `store-sqlite` crate and an in-memory implementation is
//! provided for tests.

pub mod error;
pub mod models;
pub mod store;
pub mod time;

pub use error::{LibraryError, Result};
pub use models::{PlayStat, SourceKind, TrackId, TrackRecord};
pub use store::{MemoryTrackStore, TrackStore};
pub use time::{Clock, ManualClock, SystemClock};
