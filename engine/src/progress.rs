//! Progress and status reporting traits.
//!
//! These traits decouple the migration engine from any specific UI
//! technology (CLI, GUI, agent daemon). Per the design's "event
//! subscriptions" redesign note, there is no ambient subscription state —
//! callers pass a callback reference into the operation that needs it, and
//! callbacks fire synchronously on the same task that produced the event.

use crate::model::{MigrationItem, MigrationJob, TransferProgress};

/// Receives byte-level progress during any single streaming operation:
/// a bandwidth-throttled copy, an image block-copy, a split/reassemble
/// pass, or an agent file transfer.
pub trait ProgressCallback: Send + Sync {
    /// `bytes_so_far` / `bytes_total` describe the operation currently in
    /// flight; `bytes_total` is 0 when the size isn't known up front.
    fn on_progress(&self, bytes_so_far: u64, bytes_total: u64);
}

/// A no-op callback for callers that don't want progress events.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn on_progress(&self, _bytes_so_far: u64, _bytes_total: u64) {}
}

/// Receives coordinator- and tier-level status transitions: which item
/// started, which finished, and in what state. This is the callback
/// surface the coordinator's `capture`/`restore` entry points accept
/// (spec §4.6).
pub trait StatusCallback: Send + Sync {
    fn on_job_started(&self, job: &MigrationJob);
    fn on_item_started(&self, item: &MigrationItem);
    fn on_item_completed(&self, item: &MigrationItem);
    fn on_job_completed(&self, job: &MigrationJob);
}

/// A no-op status callback.
pub struct NullStatus;

impl StatusCallback for NullStatus {
    fn on_job_started(&self, _job: &MigrationJob) {}
    fn on_item_started(&self, _item: &MigrationItem) {}
    fn on_item_completed(&self, _item: &MigrationItem) {}
    fn on_job_completed(&self, _job: &MigrationJob) {}
}

/// Builds a `TransferProgress` snapshot from raw running counters; kept
/// as a free function rather than engine-owned state so callers can
/// recompute it at whatever cadence they like (spec: "at most every 100ms
/// or every 1 MiB, whichever first").
pub fn snapshot(
    current_item_name: &str,
    current_item_index: usize,
    total_items: usize,
    current_item_bytes_transferred: u64,
    current_item_bytes_total: u64,
    overall_bytes_transferred: u64,
    overall_bytes_total: u64,
    bytes_per_second: f64,
) -> TransferProgress {
    let estimated_remaining_secs = if bytes_per_second > 0.0 && overall_bytes_total > overall_bytes_transferred {
        Some((overall_bytes_total - overall_bytes_transferred) as f64 / bytes_per_second)
    } else {
        None
    };

    TransferProgress {
        current_item_name: current_item_name.to_string(),
        current_item_index,
        total_items,
        current_item_bytes_transferred,
        current_item_bytes_total,
        overall_bytes_transferred,
        overall_bytes_total,
        bytes_per_second,
        estimated_remaining_secs,
    }
}
