//! # Media Service Facade
//!
//! Top-level assembly of the media core: the metadata store, the tiered
//! cache, the catalog search layer, and the streaming pipeline, wired
//! together behind one [`MediaService`] type.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                MediaService                   │
//! │                                               │
//! │  stream()       ──► StreamingPipeline         │
//! │  search()       ──► SearchService             │
//! │  record_play()  ──► TrackStore + Promotion    │
//! │  start()        ──► reconcile sweep           │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Hosts construct a [`ServiceConfig`] with the builder, hand in a
//! [`CatalogProvider`](core_catalog::CatalogProvider) implementation, and
//! call [`MediaService::start`] once before serving requests.

pub mod config;
pub mod error;
pub mod logging;
pub mod service;

pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{Result, ServiceError};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use service::MediaService;
