//! Durable-tier eviction
//!
//! Keeps the durable tier under its byte quota by deleting the
//! least-recently-accessed files. The pass is best-effort: a single failed
//! delete is logged and the next candidate is tried. Play-count "value" is
//! deliberately ignored; pure recency with a filename tie-break keeps the
//! policy deterministic and simple.

use crate::error::Result;
use crate::store::CacheStore;
use tracing::{debug, info, instrument, warn};

/// Summary of one eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub files_deleted: usize,
    pub bytes_freed: u64,
    pub remaining_bytes: u64,
}

/// Least-recently-accessed eviction over the durable tier.
pub struct EvictionPolicy {
    quota_bytes: u64,
}

impl EvictionPolicy {
    pub fn new(quota_bytes: u64) -> Self {
        Self { quota_bytes }
    }

    pub fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }

    /// Run one eviction pass.
    ///
    /// Deletes durable files in ascending last-access order (ties broken by
    /// filename) until the tier is at or under quota or the candidate list is
    /// exhausted. An oversized single file that alone exceeds the quota is
    /// left in place once everything else is gone.
    #[instrument(skip_all)]
    pub async fn run(&self, store: &CacheStore) -> Result<EvictionReport> {
        let mut entries = store.durable_entries().await?;
        let mut total: u64 = entries.iter().map(|e| e.size_bytes).sum();

        if total <= self.quota_bytes {
            debug!(total, quota = self.quota_bytes, "Durable tier under quota, nothing to evict");
            return Ok(EvictionReport {
                remaining_bytes: total,
                ..Default::default()
            });
        }

        info!(
            total,
            quota = self.quota_bytes,
            "Durable tier over quota, starting eviction pass"
        );
        entries.sort_by(|a, b| {
            a.last_access
                .cmp(&b.last_access)
                .then_with(|| a.path.file_name().cmp(&b.path.file_name()))
        });

        // The most recently accessed file is never a candidate: if it alone
        // exceeds the quota, that is the documented degenerate case, not a
        // reason to empty the tier.
        let candidates = &entries[..entries.len().saturating_sub(1)];

        let mut report = EvictionReport::default();
        for entry in candidates {
            if total <= self.quota_bytes {
                break;
            }
            match tokio::fs::remove_file(&entry.path).await {
                Ok(()) => {
                    total -= entry.size_bytes;
                    report.files_deleted += 1;
                    report.bytes_freed += entry.size_bytes;
                    info!(path = %entry.path.display(), size = entry.size_bytes, "Evicted cached file");
                }
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "Failed to evict cached file");
                }
            }
        }

        if total > self.quota_bytes {
            warn!(
                total,
                quota = self.quota_bytes,
                "Durable tier still over quota after deleting every other file"
            );
        }

        report.remaining_bytes = total;
        info!(
            deleted = report.files_deleted,
            freed = report.bytes_freed,
            remaining = report.remaining_bytes,
            "Eviction pass complete"
        );
        Ok(report)
    }
}
