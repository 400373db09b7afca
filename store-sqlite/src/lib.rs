//! # SQLite Track Store
//!
//! `sqlx`-backed implementation of [`core_library::TrackStore`].
//!
//! The pool is configured for the usual library workload: WAL mode so that
//! streaming sessions can read while play stats are written, enforced foreign
//! keys, and a small schema bootstrap instead of a migration framework.

mod db;
mod track_store;

pub use db::{connect, DatabaseConfig};
pub use track_store::SqliteTrackStore;
