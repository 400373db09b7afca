//! # Pull-Through Streaming Pipeline
//!
//! Delivers audio bytes for a track regardless of where they currently live,
//! with minimal latency to first byte.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            StreamingPipeline                 │
//! │                                              │
//! │  resolve ──► durable / ephemeral hit ──► LocalServe
//! │          └─► miss ─► in-flight guard ─► RemoteServe
//! │                                              │
//! │  RemoteServe: provider chunk ─► cache file   │
//! │                             └─► client        │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! On a cache miss the provider stream is *teed*: every chunk is written to
//! the ephemeral cache file and forwarded to the client in the same pass, in
//! order, without buffering the whole file. At most one remote fetch runs per
//! identifier; concurrent requests for the same track wait for the leader and
//! then serve the finished file locally.

pub mod error;
pub mod pipeline;

pub use error::{Result, StreamError};
pub use pipeline::{
    ByteRange, MediaStream, ServeSource, StreamSession, StreamingPipeline, DEFAULT_FETCH_TIMEOUT,
};
