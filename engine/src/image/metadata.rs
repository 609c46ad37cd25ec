//! Sidecar metadata for a captured disk image: `<stem>.zim-meta.json`
//! next to the image (or first chunk), read/written/verified before the
//! image is ever applied on restore.

use crate::checksums::{self, ChecksumAlgorithm};
use crate::error::EngineError;
use crate::model::DiskImageMetadata;
use std::path::{Path, PathBuf};

fn sidecar_path(image_path: &Path) -> PathBuf {
    let file_name = image_path.file_name().and_then(|n| n.to_str()).unwrap_or("image");
    image_path.with_file_name(format!("{}.zim-meta.json", file_name))
}

pub fn write(image_path: &Path, metadata: &DiskImageMetadata) -> Result<(), EngineError> {
    let path = sidecar_path(image_path);
    let json = serde_json::to_string_pretty(metadata)?;
    std::fs::write(&path, json).map_err(|e| EngineError::WriteError { path, source: e })
}

pub fn read(image_path: &Path) -> Result<DiskImageMetadata, EngineError> {
    let path = sidecar_path(image_path);
    let text = std::fs::read_to_string(&path).map_err(|e| EngineError::ReadError { path: path.clone(), source: e })?;
    let metadata: DiskImageMetadata = serde_json::from_str(&text)?;
    Ok(metadata)
}

/// Verify a non-split image's whole-file checksum against its sidecar.
pub fn verify_whole_image(image_path: &Path, metadata: &DiskImageMetadata) -> Result<bool, EngineError> {
    checksums::verify(image_path, &metadata.checksum, ChecksumAlgorithm::Sha256)
}

/// Verify each chunk of a split image against its sidecar's per-chunk
/// checksum list, in order. `chunk_path_fn` maps a chunk index to its
/// path so this stays agnostic of the naming scheme in [`super::split`].
pub fn verify_chunks(
    metadata: &DiskImageMetadata,
    chunk_path_fn: impl Fn(u32) -> PathBuf,
) -> Result<bool, EngineError> {
    for (index, expected) in metadata.chunk_checksums.iter().enumerate() {
        let path = chunk_path_fn(index as u32);
        if !checksums::verify(&path, expected, ChecksumAlgorithm::Sha256)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BitLockerStatus, ImageFormat};
    use std::io::Write;

    fn sample_metadata() -> DiskImageMetadata {
        DiskImageMetadata {
            source_hostname: "SRC-PC".into(),
            source_os_version: "Windows 11".into(),
            source_volume: "C:".into(),
            source_volume_size_bytes: 1000,
            source_volume_used_bytes: 500,
            image_size_bytes: 500,
            format: ImageFormat::Raw,
            is_compressed: false,
            checksum: String::new(),
            is_split: false,
            chunk_count: 1,
            chunk_size_bytes: 500,
            chunk_checksums: vec![],
            file_system_type: "NTFS".into(),
            used_vss: true,
            source_was_bit_locker_encrypted: false,
            source_bit_locker_status: BitLockerStatus::NotProtected,
            bit_locker_was_suspended: false,
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("disk0.raw");
        let metadata = sample_metadata();
        write(&image_path, &metadata).unwrap();

        let loaded = read(&image_path).unwrap();
        assert_eq!(loaded.source_hostname, "SRC-PC");
        assert_eq!(loaded.format, ImageFormat::Raw);
    }

    #[test]
    fn verify_whole_image_detects_tamper() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("disk0.raw");
        let mut f = std::fs::File::create(&image_path).unwrap();
        f.write_all(b"image bytes").unwrap();
        drop(f);

        let checksum = checksums::compute_file_checksum(&image_path, ChecksumAlgorithm::Sha256).unwrap();
        let mut metadata = sample_metadata();
        metadata.checksum = checksum.hex().to_string();
        assert!(verify_whole_image(&image_path, &metadata).unwrap());

        metadata.checksum = "0000".to_string();
        assert!(!verify_whole_image(&image_path, &metadata).unwrap());
    }
}
