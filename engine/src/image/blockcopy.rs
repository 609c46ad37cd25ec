//! Fixed 1 MiB block copy used by the raw-image pipeline. Emits a
//! progress event every block or every 100 ms, whichever comes first.
//! A read failure on a non-final block is retried once at the same
//! offset; a second failure marks the image corrupt and aborts.

use crate::error::EngineError;
use crate::progress::ProgressCallback;
use crate::throttle::CancellationToken;
use std::io::{Read, Seek, SeekFrom, Write};
use std::time::{Duration, Instant};

pub const BLOCK_SIZE: usize = 1024 * 1024;
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Copy `total_bytes` from `source` to `destination` in fixed 1 MiB
/// blocks. `source` must support seeking so a failed block can be
/// retried at its own offset.
pub fn block_copy(
    mut source: impl Read + Seek,
    mut destination: impl Write,
    total_bytes: u64,
    cancellation: &CancellationToken,
    progress: &dyn ProgressCallback,
) -> Result<u64, EngineError> {
    let mut buffer = vec![0u8; BLOCK_SIZE];
    let mut copied: u64 = 0;
    let mut last_progress_at = Instant::now();

    while copied < total_bytes {
        if cancellation.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let remaining = total_bytes - copied;
        let this_block = remaining.min(BLOCK_SIZE as u64) as usize;
        let is_final_block = remaining <= BLOCK_SIZE as u64;
        let offset = copied;

        let n = match source.read(&mut buffer[..this_block]) {
            Ok(n) => n,
            Err(e) if !is_final_block => {
                source.seek(SeekFrom::Start(offset)).map_err(|e| EngineError::ReadError {
                    path: std::path::PathBuf::from("<image-source>"),
                    source: e,
                })?;
                match source.read(&mut buffer[..this_block]) {
                    Ok(n) => n,
                    Err(_) => {
                        return Err(EngineError::UserError {
                            message: format!("image block at offset {} unreadable after retry; image marked corrupt", offset),
                        })
                    }
                }
            }
            Err(e) => {
                return Err(EngineError::ReadError {
                    path: std::path::PathBuf::from("<image-source>"),
                    source: e,
                })
            }
        };

        if n == 0 {
            break;
        }
        destination.write_all(&buffer[..n])?;
        copied += n as u64;

        if last_progress_at.elapsed() >= PROGRESS_INTERVAL || n < BLOCK_SIZE {
            progress.on_progress(copied, total_bytes);
            last_progress_at = Instant::now();
        }
    }

    progress.on_progress(copied, total_bytes);
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;
    use std::io::Cursor;

    #[test]
    fn copies_multi_block_source_exactly() {
        let data = vec![0xABu8; BLOCK_SIZE * 2 + 123];
        let mut source = Cursor::new(data.clone());
        let mut dest = Vec::new();
        let token = CancellationToken::new();
        let copied = block_copy(&mut source, &mut dest, data.len() as u64, &token, &NullProgress).unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(dest, data);
    }

    #[test]
    fn cancellation_aborts_before_any_block() {
        let data = vec![0u8; BLOCK_SIZE];
        let mut source = Cursor::new(data.clone());
        let mut dest = Vec::new();
        let token = CancellationToken::new();
        token.cancel();
        let result = block_copy(&mut source, &mut dest, data.len() as u64, &token, &NullProgress);
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }
}
