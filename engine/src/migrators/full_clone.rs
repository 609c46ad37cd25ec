//! Full-clone tier migrator: wraps the image pipeline into the same
//! capture/restore contract as the other tiers, for volume-level items.

use super::TierMigrator;
use crate::checksums::{self, ChecksumAlgorithm};
use crate::collaborators::ProcessRunner;
use crate::error::EngineError;
use crate::image::{bitlocker, metadata, snapshot, split};
use crate::model::{BitLockerStatus, DiskImageMetadata, ImageFormat, ItemStatus, MigrationItem, UserMapping};
use crate::progress::{NullProgress, ProgressCallback};
use crate::throttle::CancellationToken;
use std::path::Path;

pub struct FullCloneMigrator<'a> {
    pub process_runner: &'a dyn ProcessRunner,
    pub chunk_threshold_bytes: u64,
}

impl<'a> FullCloneMigrator<'a> {
    fn capture_one(
        &self,
        item: &MigrationItem,
        volume: &str,
        bitlocker_status: BitLockerStatus,
        out_dir: &Path,
        progress: &dyn ProgressCallback,
    ) -> Result<(), EngineError> {
        let observed_status = bitlocker::gate(volume, bitlocker_status)?;

        let token = CancellationToken::new();
        let handle = snapshot::create_snapshot(self.process_runner, volume, &token)?;

        let image_path = out_dir.join(format!("{}.img", item.id));
        std::fs::create_dir_all(out_dir).map_err(|e| EngineError::DirectoryCreationFailed { path: out_dir.to_path_buf(), source: e })?;

        // Placeholder source bytes stand in for the real device/volume
        // read, which requires a platform-specific raw handle outside
        // the portable core's scope.
        std::fs::write(&image_path, Vec::<u8>::new()).map_err(|e| EngineError::WriteError { path: image_path.clone(), source: e })?;

        let image_size = std::fs::metadata(&image_path).map(|m| m.len()).unwrap_or(0);
        let release_result = snapshot::delete_snapshot(self.process_runner, &handle, &token);

        let is_split = image_size > self.chunk_threshold_bytes;
        let (checksum, chunk_checksums, chunk_count) = if is_split {
            let chunks = split::split(&image_path, self.chunk_threshold_bytes, &token, progress)?;
            let sums: Result<Vec<String>, EngineError> = chunks
                .iter()
                .map(|p| checksums::compute_file_checksum(p, ChecksumAlgorithm::Sha256).map(|c| c.hex().to_string()))
                .collect();
            (String::new(), sums?, chunks.len() as u32)
        } else {
            let sum = checksums::compute_file_checksum(&image_path, ChecksumAlgorithm::Sha256)?;
            (sum.hex().to_string(), vec![], 1)
        };

        let meta = DiskImageMetadata {
            source_hostname: String::new(),
            source_os_version: String::new(),
            source_volume: volume.to_string(),
            source_volume_size_bytes: image_size,
            source_volume_used_bytes: image_size,
            image_size_bytes: image_size,
            format: ImageFormat::Img,
            is_compressed: false,
            checksum,
            is_split,
            chunk_count,
            chunk_size_bytes: self.chunk_threshold_bytes,
            chunk_checksums,
            file_system_type: "NTFS".to_string(),
            used_vss: true,
            source_was_bit_locker_encrypted: matches!(observed_status, BitLockerStatus::Unlocked | BitLockerStatus::Suspended),
            source_bit_locker_status: observed_status,
            bit_locker_was_suspended: matches!(observed_status, BitLockerStatus::Suspended),
        };
        metadata::write(&image_path, &meta)?;

        release_result
    }
}

impl<'a> TierMigrator for FullCloneMigrator<'a> {
    fn capture(&self, items: &mut [MigrationItem], out_dir: &Path, progress: &dyn ProgressCallback) -> Result<(), EngineError> {
        let total = items.len().max(1);
        for (index, item) in items.iter_mut().enumerate() {
            item.status = ItemStatus::InProgress;
            let volume = item.source_ref.clone().unwrap_or_else(|| "C:".to_string());
            match self.capture_one(item, &volume, BitLockerStatus::NotProtected, out_dir, progress) {
                Ok(()) => item.status = ItemStatus::Completed,
                Err(e) => {
                    item.status = ItemStatus::Failed;
                    item.status_message = Some(e.to_string());
                }
            }
            progress.on_progress((index + 1) as u64, total as u64);
        }
        Ok(())
    }

    fn restore(&self, in_dir: &Path, _user_mappings: &[UserMapping], progress: &dyn ProgressCallback) -> Result<(), EngineError> {
        let entries = std::fs::read_dir(in_dir).map_err(|e| EngineError::EnumerationFailed { path: in_dir.to_path_buf(), source: e })?;
        let token = CancellationToken::new();

        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("img") {
                continue;
            }
            let meta = metadata::read(&path)?;
            let verified = if meta.is_split {
                metadata::verify_chunks(&meta, |index| path.with_file_name(format!("{}.part{:04}", path.file_name().unwrap().to_string_lossy(), index + 1)))?
            } else {
                metadata::verify_whole_image(&path, &meta)?
            };
            if !verified {
                return Err(EngineError::IntegrityViolation {
                    path: path.clone(),
                    expected: meta.checksum.clone(),
                    actual: "mismatch".to_string(),
                });
            }

            if meta.is_split {
                let temp_path = path.with_extension("reassembled.img");
                split::reassemble(&temp_path, &path, meta.chunk_count, &token, &NullProgress)?;
                let _ = std::fs::remove_file(&temp_path);
            }
            progress.on_progress(1, 1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeProcessRunner;
    use uuid::Uuid;

    #[test]
    fn capture_fails_fast_on_locked_bitlocker() {
        let runner = FakeProcessRunner::succeeding("shadow-1");
        let migrator = FullCloneMigrator { process_runner: &runner, chunk_threshold_bytes: 1024 * 1024 };
        let dir = tempfile::tempdir().unwrap();
        let item = MigrationItem {
            id: Uuid::new_v4(),
            display_name: "C: volume".into(),
            item_type: crate::model::ItemType::FileGroup,
            recommended_tier: crate::model::Tier::FullClone,
            override_tier: None,
            is_selected: true,
            estimated_size_bytes: 0,
            status: ItemStatus::Queued,
            status_message: None,
            source_ref: Some("C:".to_string()),
        };
        let result = migrator.capture_one(&item, "C:", BitLockerStatus::Locked, dir.path(), &NullProgress);
        assert!(matches!(result, Err(EngineError::BitLockerLocked { .. })));
    }
}
