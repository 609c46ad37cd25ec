//! Email client data capture/restore: Outlook `.pst`/`.ost` files and
//! Thunderbird profile folders.

use crate::error::EngineError;
use crate::fs_ops;
use crate::model::EmailClientData;
use std::path::Path;

pub fn capture(data: &EmailClientData, out_dir: &Path) -> Result<(), EngineError> {
    std::fs::create_dir_all(out_dir).map_err(|e| EngineError::DirectoryCreationFailed { path: out_dir.to_path_buf(), source: e })?;

    if !data.data_path.exists() {
        return Ok(());
    }

    if data.data_path.is_dir() {
        fs_ops::copy_tree(&data.data_path, &out_dir.join(&data.client))?;
    } else {
        let file_name = data.data_path.file_name().unwrap_or_default();
        fs_ops::copy_file_with_metadata(&data.data_path, &out_dir.join(file_name))?;
    }
    Ok(())
}

pub fn restore(captured_dir: &Path, destination_data_path: &Path) -> Result<(), EngineError> {
    if captured_dir.is_dir() {
        fs_ops::copy_tree(captured_dir, destination_data_path)?;
    } else {
        fs_ops::copy_file_with_metadata(captured_dir, destination_data_path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_copies_a_single_pst_file() {
        let dir = tempfile::tempdir().unwrap();
        let pst_path = dir.path().join("outlook.pst");
        std::fs::write(&pst_path, b"pst contents").unwrap();

        let data = EmailClientData { client: "outlook".to_string(), data_path: pst_path };
        let out_dir = dir.path().join("out");
        capture(&data, &out_dir).unwrap();

        assert_eq!(std::fs::read(out_dir.join("outlook.pst")).unwrap(), b"pst contents");
    }

    #[test]
    fn capture_tolerates_missing_source_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let data = EmailClientData { client: "thunderbird".to_string(), data_path: dir.path().join("absent") };
        let out_dir = dir.path().join("out");
        assert!(capture(&data, &out_dir).is_ok());
    }
}
