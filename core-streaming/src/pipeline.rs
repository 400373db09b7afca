//! Streaming pipeline state machine

use crate::error::{Result, StreamError};
use bytes::Bytes;
use core_cache::CacheStore;
use core_catalog::{AudioByteStream, CatalogProvider};
use core_library::{TrackRecord, TrackStore};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, instrument, warn};

/// Chunk size for local file reads, matching the remote fetch granularity.
const LOCAL_READ_CHUNK_BYTES: usize = 64 * 1024;

/// Buffered chunks between the tee and a slow client.
const CLIENT_CHANNEL_CAPACITY: usize = 16;

/// Default deadline for one remote fetch session.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// A chunked byte stream delivered to the requesting client.
pub type MediaStream = BoxStream<'static, Result<Bytes>>;

/// Half-open byte range `[start, end)` for seek/scrub support.
///
/// Only honored for local serves; a remote pull always starts at byte zero,
/// as the provider stream is not seekable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

/// Where the served bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeSource {
    /// Durable cache tier.
    DurableCache,
    /// Ephemeral cache tier.
    EphemeralCache,
    /// A file the library indexer registered directly.
    LibraryFile,
    /// Pulled from the catalog provider (and teed into the cache).
    Remote,
}

/// One streaming session handed to the caller.
pub struct StreamSession {
    pub source: ServeSource,
    pub stream: MediaStream,
}

impl fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("source", &self.source)
            .field("stream", &"MediaStream")
            .finish()
    }
}

type InflightMap = Mutex<HashMap<String, watch::Receiver<()>>>;

/// Exclusive right to run the remote fetch for one identifier.
///
/// Dropping the lease removes the map entry and wakes every waiting
/// follower, whether the fetch finished or failed.
struct FetchLease {
    map: Arc<InflightMap>,
    remote_id: String,
    _tx: watch::Sender<()>,
}

impl Drop for FetchLease {
    fn drop(&mut self) {
        self.map.lock().unwrap().remove(&self.remote_id);
    }
}

/// Decides tier/source for a track and produces its byte stream.
pub struct StreamingPipeline {
    cache: Arc<CacheStore>,
    provider: Arc<dyn CatalogProvider>,
    store: Arc<dyn TrackStore>,
    inflight: Arc<InflightMap>,
    fetch_timeout: Option<Duration>,
}

impl StreamingPipeline {
    pub fn new(
        cache: Arc<CacheStore>,
        provider: Arc<dyn CatalogProvider>,
        store: Arc<dyn TrackStore>,
    ) -> Self {
        Self {
            cache,
            provider,
            store,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
        }
    }

    /// Override or disable the remote fetch deadline.
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Deliver audio bytes for `record`.
    ///
    /// Resolution order: the record's own library file, then the durable
    /// cache tier, then the ephemeral tier, then a remote pull that tees
    /// into the cache.
    #[instrument(skip(self, record), fields(track_id = %record.id))]
    pub async fn stream(
        &self,
        record: &TrackRecord,
        range: Option<ByteRange>,
    ) -> Result<StreamSession> {
        if let Some(path) = record.local_path_buf() {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                debug!(path = %path.display(), "Serving track from library file");
                return self.serve_local(&path, range, ServeSource::LibraryFile).await;
            }
        }

        let Some(remote_id) = record.remote_id.clone() else {
            return Err(StreamError::NoSource(record.id.to_string()));
        };

        loop {
            // A fetch in progress means the ephemeral file may be mid-write;
            // it must never be served until the leader finishes.
            if let Some(mut rx) = self.inflight_waiter(&remote_id) {
                debug!(remote_id, "Fetch already in flight, waiting for leader");
                let _ = rx.changed().await;
                continue;
            }

            if let Some((tier, path)) = self.cache.locate(&remote_id).await {
                // Re-check the guard: a leader that registered after our
                // first check may have just created this file.
                if self.inflight_waiter(&remote_id).is_some() {
                    continue;
                }
                let source = match tier {
                    core_cache::CacheTier::Durable => ServeSource::DurableCache,
                    core_cache::CacheTier::Ephemeral => ServeSource::EphemeralCache,
                };
                debug!(remote_id, ?tier, "Serving track from cache");
                return self.serve_local(&path, range, source).await;
            }

            if let Some(lease) = self.try_lead(&remote_id) {
                return self.serve_remote(record, remote_id, lease).await;
            }
            // Lost the leadership race; loop back and wait.
        }
    }

    fn inflight_waiter(&self, remote_id: &str) -> Option<watch::Receiver<()>> {
        self.inflight.lock().unwrap().get(remote_id).cloned()
    }

    fn try_lead(&self, remote_id: &str) -> Option<FetchLease> {
        let mut map = self.inflight.lock().unwrap();
        if map.contains_key(remote_id) {
            return None;
        }
        let (tx, rx) = watch::channel(());
        map.insert(remote_id.to_string(), rx);
        Some(FetchLease {
            map: Arc::clone(&self.inflight),
            remote_id: remote_id.to_string(),
            _tx: tx,
        })
    }

    /// Open a local file and produce a chunked stream over the requested
    /// range.
    async fn serve_local(
        &self,
        path: &Path,
        range: Option<ByteRange>,
        source: ServeSource,
    ) -> Result<StreamSession> {
        let mut file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();

        let (start, end) = match range {
            Some(range) => {
                let start = range.start.min(len);
                let end = range.end.unwrap_or(len).clamp(start, len);
                (start, end)
            }
            None => (0, len),
        };
        if start > 0 {
            file.seek(std::io::SeekFrom::Start(start)).await?;
        }

        let reader = file.take(end - start);
        let stream = ReaderStream::with_capacity(reader, LOCAL_READ_CHUNK_BYTES)
            .map(|chunk| chunk.map_err(StreamError::from))
            .boxed();

        Ok(StreamSession { source, stream })
    }

    /// Pull from the provider, teeing every chunk into the ephemeral cache
    /// file while forwarding it to the client.
    async fn serve_remote(
        &self,
        record: &TrackRecord,
        remote_id: String,
        lease: FetchLease,
    ) -> Result<StreamSession> {
        info!(remote_id, "Cache miss, pulling track from catalog provider");

        // Nothing is cached for a failed open; the lease is dropped on the
        // way out and the next request retries.
        let provider_stream = self.provider.fetch_audio(&remote_id).await?;
        let cache_file = self.cache.open_for_write(&remote_id).await?;

        let (tx, rx) = mpsc::channel::<Result<Bytes>>(CLIENT_CHANNEL_CAPACITY);

        let session = TeeSession {
            cache: Arc::clone(&self.cache),
            store: Arc::clone(&self.store),
            track_id: record.id,
            remote_id,
            lease,
        };
        let fetch_timeout = self.fetch_timeout;

        // Detached: if the client disconnects mid-stream the fetch and the
        // cache write run to completion so the next requester hits the cache.
        tokio::spawn(async move {
            session.run(provider_stream, cache_file, tx, fetch_timeout).await;
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed();

        Ok(StreamSession {
            source: ServeSource::Remote,
            stream,
        })
    }
}

/// State owned by one leader fetch task.
struct TeeSession {
    cache: Arc<CacheStore>,
    store: Arc<dyn TrackStore>,
    track_id: core_library::TrackId,
    remote_id: String,
    lease: FetchLease,
}

impl TeeSession {
    async fn run(
        self,
        provider_stream: AudioByteStream,
        cache_file: tokio::fs::File,
        tx: mpsc::Sender<Result<Bytes>>,
        fetch_timeout: Option<Duration>,
    ) {
        let tee = Self::tee(provider_stream, cache_file, &tx);
        let outcome = match fetch_timeout {
            Some(deadline) => tokio::time::timeout(deadline, tee)
                .await
                .unwrap_or(Err(StreamError::FetchTimeout)),
            None => tee.await,
        };

        match outcome {
            Ok(bytes_written) => {
                info!(
                    remote_id = %self.remote_id,
                    bytes = bytes_written,
                    "Remote fetch complete, ephemeral cache written"
                );
                let path = self.cache.ephemeral_path(&self.remote_id);
                if let Err(e) = self
                    .store
                    .update_cache_fields(&self.track_id, true, Some(&path))
                    .await
                {
                    error!(error = %e, "Failed to record cache path in metadata store");
                }
            }
            Err(e) => {
                // An interrupted download must never be served later as if
                // it were complete.
                warn!(remote_id = %self.remote_id, error = %e, "Remote fetch failed, discarding partial cache file");
                if let Err(discard_err) = self.cache.discard_ephemeral(&self.remote_id).await {
                    error!(error = %discard_err, "Failed to discard partial cache file");
                }
                let _ = tx.send(Err(e)).await;
            }
        }
        // Lease dropped here: waiting followers re-resolve against the cache.
        drop(self.lease);
    }

    /// Forward provider chunks to the cache file and the client, in order.
    ///
    /// A vanished client stops the forwarding but not the cache write.
    async fn tee(
        mut provider_stream: AudioByteStream,
        mut cache_file: tokio::fs::File,
        tx: &mpsc::Sender<Result<Bytes>>,
    ) -> Result<u64> {
        let mut bytes_written: u64 = 0;
        let mut client_connected = true;

        while let Some(chunk) = provider_stream.next().await {
            let chunk = chunk?;
            cache_file.write_all(&chunk).await?;
            bytes_written += chunk.len() as u64;

            if client_connected && tx.send(Ok(chunk)).await.is_err() {
                debug!("Client disconnected, finishing fetch for the cache only");
                client_connected = false;
            }
        }

        cache_file.flush().await?;
        Ok(bytes_written)
    }
}
