//! Bandwidth-throttled stream copy with progress reporting.
//!
//! Reads in 64 KiB frames; after each frame, if the projected
//! instantaneous rate would exceed the configured cap, sleeps just
//! enough to bring the rolling average back under the cap. Progress is
//! reported at most every 100 ms or every 1 MiB, whichever comes first.
//! The copy is cancellable at frame boundaries.

use crate::error::EngineError;
use crate::progress::ProgressCallback;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const FRAME_SIZE: usize = 64 * 1024;
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);
const PROGRESS_BYTE_INTERVAL: u64 = 1024 * 1024;

/// Cooperative cancellation flag threaded through every public
/// operation (spec §5 "Cancellation"). Cloning shares the same flag.
#[derive(Clone, Default)]
pub struct CancellationToken(std::sync::Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(std::sync::Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Copy `total_bytes` (if known; pass 0 when not known up front) from
/// `reader` to `writer`, optionally capped at `bytes_per_sec`. Returns
/// the number of bytes actually copied, or `EngineError::Cancelled` if
/// the token was set between frames — the destination is left at a
/// frame boundary, never mid-frame.
pub fn throttled_copy(
    mut reader: impl Read,
    mut writer: impl Write,
    total_bytes: u64,
    bytes_per_sec: Option<u64>,
    cancellation: &CancellationToken,
    progress: &dyn ProgressCallback,
) -> Result<u64, EngineError> {
    let mut buffer = [0u8; FRAME_SIZE];
    let mut copied: u64 = 0;
    let start = Instant::now();
    let mut last_progress_at = Instant::now();
    let mut last_progress_bytes: u64 = 0;

    loop {
        if cancellation.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n])?;
        copied += n as u64;

        if let Some(cap) = bytes_per_sec {
            if cap > 0 {
                let elapsed = start.elapsed().as_secs_f64().max(1e-6);
                let projected_rate = copied as f64 / elapsed;
                if projected_rate > cap as f64 {
                    let target_elapsed = copied as f64 / cap as f64;
                    let sleep_for = target_elapsed - elapsed;
                    if sleep_for > 0.0 {
                        std::thread::sleep(Duration::from_secs_f64(sleep_for));
                    }
                }
            }
        }

        let since_last = last_progress_at.elapsed();
        let bytes_since_last = copied - last_progress_bytes;
        if since_last >= PROGRESS_INTERVAL || bytes_since_last >= PROGRESS_BYTE_INTERVAL {
            progress.on_progress(copied, total_bytes);
            last_progress_at = Instant::now();
            last_progress_bytes = copied;
        }
    }

    progress.on_progress(copied, total_bytes);
    writer.flush()?;
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;

    #[test]
    fn copies_all_bytes_without_cap() {
        let data = vec![7u8; 200_000];
        let mut out = Vec::new();
        let token = CancellationToken::new();
        let copied = throttled_copy(data.as_slice(), &mut out, data.len() as u64, None, &token, &NullProgress).unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(out, data);
    }

    #[test]
    fn respects_cancellation_before_any_bytes() {
        let data = vec![1u8; 1024];
        let mut out = Vec::new();
        let token = CancellationToken::new();
        token.cancel();
        let result = throttled_copy(data.as_slice(), &mut out, data.len() as u64, None, &token, &NullProgress);
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[test]
    fn zero_byte_stream_round_trips() {
        let data: Vec<u8> = vec![];
        let mut out = Vec::new();
        let token = CancellationToken::new();
        let copied = throttled_copy(data.as_slice(), &mut out, 0, None, &token, &NullProgress).unwrap();
        assert_eq!(copied, 0);
        assert!(out.is_empty());
    }
}
