//! FAT32-aware splitting and reassembly of large image files into
//! numbered `.partNNNN` chunks.

use crate::error::EngineError;
use crate::progress::ProgressCallback;
use crate::throttle::CancellationToken;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const READ_BUFFER_SIZE: usize = 1024 * 1024;

fn chunk_path(base: &Path, index: u32) -> PathBuf {
    let file_name = base.file_name().and_then(|n| n.to_str()).unwrap_or("image");
    base.with_file_name(format!("{}.part{:04}", file_name, index + 1))
}

/// Stream `source_path` into chunks of at most `chunk_size` bytes,
/// writing them next to `source_path` as `<name>.part0001`, … Returns
/// the ordered chunk path list. Never materializes more than one chunk
/// in memory.
pub fn split(
    source_path: &Path,
    chunk_size: u64,
    cancellation: &CancellationToken,
    progress: &dyn ProgressCallback,
) -> Result<Vec<PathBuf>, EngineError> {
    let total_size = fs::metadata(source_path)
        .map_err(|e| EngineError::ReadError { path: source_path.to_path_buf(), source: e })?
        .len();

    let mut source = fs::File::open(source_path).map_err(|e| EngineError::ReadError {
        path: source_path.to_path_buf(),
        source: e,
    })?;

    let mut chunk_paths = Vec::new();
    let mut written_total: u64 = 0;
    let mut chunk_index: u32 = 0;
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    while written_total < total_size {
        if cancellation.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let path = chunk_path(source_path, chunk_index);
        let mut out = fs::File::create(&path).map_err(|e| EngineError::WriteError { path: path.clone(), source: e })?;

        let mut written_this_chunk: u64 = 0;
        while written_this_chunk < chunk_size && written_total < total_size {
            let want = (chunk_size - written_this_chunk).min(READ_BUFFER_SIZE as u64) as usize;
            let n = source.read(&mut buffer[..want]).map_err(|e| EngineError::ReadError {
                path: source_path.to_path_buf(),
                source: e,
            })?;
            if n == 0 {
                break;
            }
            out.write_all(&buffer[..n])?;
            written_this_chunk += n as u64;
            written_total += n as u64;
            progress.on_progress(written_total, total_size);
        }

        chunk_paths.push(path);
        chunk_index += 1;
    }

    Ok(chunk_paths)
}

/// Concatenate `chunk_count` chunks located next to `original_path`
/// into `out_path`, in numeric order.
pub fn reassemble(
    out_path: &Path,
    original_path: &Path,
    chunk_count: u32,
    cancellation: &CancellationToken,
    progress: &dyn ProgressCallback,
) -> Result<u64, EngineError> {
    let mut out = fs::File::create(out_path).map_err(|e| EngineError::WriteError { path: out_path.to_path_buf(), source: e })?;

    let total_size: u64 = (0..chunk_count)
        .map(|i| fs::metadata(chunk_path(original_path, i)).map(|m| m.len()).unwrap_or(0))
        .sum();

    let mut copied: u64 = 0;
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    for index in 0..chunk_count {
        if cancellation.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let path = chunk_path(original_path, index);
        let mut chunk = fs::File::open(&path).map_err(|e| EngineError::ReadError { path: path.clone(), source: e })?;
        loop {
            let n = chunk.read(&mut buffer).map_err(|e| EngineError::ReadError { path: path.clone(), source: e })?;
            if n == 0 {
                break;
            }
            out.write_all(&buffer[..n])?;
            copied += n as u64;
            progress.on_progress(copied, total_size);
        }
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;
    use std::io::Write as _;

    #[test]
    fn split_then_reassemble_round_trips_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("disk.img");
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        fs::File::create(&source_path).unwrap().write_all(&data).unwrap();

        let token = CancellationToken::new();
        let chunks = split(&source_path, 3_000, &token, &NullProgress).unwrap();
        assert_eq!(chunks.len(), 4);

        let sum_chunk_sizes: u64 = chunks.iter().map(|p| fs::metadata(p).unwrap().len()).sum();
        assert_eq!(sum_chunk_sizes, data.len() as u64);

        let reassembled_path = dir.path().join("reassembled.img");
        let copied = reassemble(&reassembled_path, &source_path, chunks.len() as u32, &token, &NullProgress).unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(fs::read(&reassembled_path).unwrap(), data);
    }

    #[test]
    fn chunk_naming_is_numbered_and_ordered() {
        let base = Path::new("/images/disk0.img");
        assert_eq!(chunk_path(base, 0).file_name().unwrap().to_str().unwrap(), "disk0.img.part0001");
        assert_eq!(chunk_path(base, 9).file_name().unwrap().to_str().unwrap(), "disk0.img.part0010");
    }
}
