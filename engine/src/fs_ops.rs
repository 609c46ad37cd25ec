//! Low-level filesystem operations shared by the tier migrators and the
//! profile/settings migrator: tree enumeration, metadata-preserving
//! copy, and directory sizing. Generalized from the teacher's
//! single-job tree copier so any caller can enumerate and copy a tree
//! without owning a `TransferJob`.

use crate::error::EngineError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One entry discovered while walking a source tree.
#[derive(Debug, Clone)]
pub struct TreeEntry {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub size_bytes: u64,
    pub is_dir: bool,
}

/// Enumerate `source`'s tree, pairing each entry with its mirrored path
/// under `destination_root`. Errors walking a subdirectory are recorded
/// by omitting that subtree rather than aborting the whole walk — the
/// caller decides whether a partial tree is acceptable (tier migrators
/// log-and-skip locked files per spec §4.4).
pub fn enumerate_tree(source: &Path, destination_root: &Path) -> Result<Vec<TreeEntry>, EngineError> {
    let mut items = Vec::new();

    fn recurse(path: &Path, rel_path: &Path, destination_root: &Path, items: &mut Vec<TreeEntry>) -> io::Result<()> {
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            let file_name = entry.file_name();
            let rel_full_path = rel_path.join(Path::new(&file_name));
            let dest_path = destination_root.join(&rel_full_path);
            let entry_path = entry.path();

            if metadata.is_dir() {
                items.push(TreeEntry {
                    source_path: entry_path.clone(),
                    destination_path: dest_path,
                    size_bytes: 0,
                    is_dir: true,
                });
                let _ = recurse(&entry_path, &rel_full_path, destination_root, items);
            } else {
                items.push(TreeEntry {
                    source_path: entry_path,
                    destination_path: dest_path,
                    size_bytes: metadata.len(),
                    is_dir: false,
                });
            }
        }
        Ok(())
    }

    recurse(source, Path::new(""), destination_root, &mut items).map_err(|e| EngineError::EnumerationFailed {
        path: source.to_path_buf(),
        source: e,
    })?;
    Ok(items)
}

/// Sum of file sizes under `path`, recursing into subdirectories.
/// Unreadable subtrees contribute 0 rather than failing the whole sum.
pub fn dir_size(path: &Path) -> u64 {
    let mut total = 0u64;
    if let Ok(entries) = fs::read_dir(path) {
        for entry in entries.flatten() {
            if let Ok(metadata) = entry.metadata() {
                if metadata.is_dir() {
                    total += dir_size(&entry.path());
                } else {
                    total += metadata.len();
                }
            }
        }
    }
    total
}

/// Copy a file from source to destination, preserving the modification
/// time. Returns the number of bytes copied.
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<u64, EngineError> {
    ensure_parent_dir_exists(dst)?;

    let mut src_file = fs::File::open(src).map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;

    let src_mtime = src_file.metadata().ok().and_then(|m| m.modified().ok());

    let mut dst_file = fs::File::create(dst).map_err(|e| EngineError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            EngineError::WriteError { path: dst.to_path_buf(), source: e }
        } else {
            EngineError::ReadError { path: src.to_path_buf(), source: e }
        }
    })?;

    if let Some(mtime) = src_mtime {
        let _ = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime));
    }

    Ok(bytes_copied)
}

/// Recursively copy an entire tree, preserving timestamps on every
/// file. Locked or unreadable files are appended to the returned
/// `skipped` list rather than aborting the copy (spec §4.4: "Locked
/// files are logged and skipped, not propagated as failures").
pub fn copy_tree(source: &Path, destination: &Path) -> Result<Vec<(PathBuf, String)>, EngineError> {
    let entries = enumerate_tree(source, destination)?;
    let mut skipped = Vec::new();

    for entry in &entries {
        if entry.is_dir {
            if let Err(e) = fs::create_dir_all(&entry.destination_path) {
                skipped.push((entry.source_path.clone(), e.to_string()));
            }
            continue;
        }
        if let Err(e) = copy_file_with_metadata(&entry.source_path, &entry.destination_path) {
            skipped.push((entry.source_path.clone(), e.to_string()));
        }
    }

    Ok(skipped)
}

/// Ensure the parent directory of a path exists, creating it if necessary.
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        if parent.as_os_str().is_empty() {
            return Ok(());
        }

        match fs::metadata(parent) {
            Ok(metadata) => {
                if metadata.is_dir() {
                    Ok(())
                } else {
                    Err(EngineError::DirectoryCreationFailed {
                        path: parent.to_path_buf(),
                        source: io::Error::new(io::ErrorKind::InvalidInput, "Parent path exists but is not a directory"),
                    })
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(parent).map_err(|e| EngineError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
                Ok(())
            }
            Err(e) => Err(EngineError::DirectoryCreationFailed { path: parent.to_path_buf(), source: e }),
        }
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_enumerate_nested_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir(&src).unwrap();
        let subdir = src.join("subdir");
        fs::create_dir(&subdir).unwrap();

        let mut file1 = fs::File::create(src.join("file1.txt")).unwrap();
        file1.write_all(b"data1").unwrap();
        let mut file2 = fs::File::create(subdir.join("file2.txt")).unwrap();
        file2.write_all(b"data2").unwrap();

        let dst = temp_dir.path().join("dst");
        let items = enumerate_tree(&src, &dst).unwrap();

        let dirs: Vec<_> = items.iter().filter(|f| f.is_dir).collect();
        let files: Vec<_> = items.iter().filter(|f| !f.is_dir).collect();
        assert_eq!(dirs.len(), 1);
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_copy_tree_preserves_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir(&src).unwrap();
        let mut f = fs::File::create(src.join("a.txt")).unwrap();
        f.write_all(b"hello").unwrap();
        drop(f);

        let dst = temp_dir.path().join("dst");
        let skipped = copy_tree(&src, &dst).unwrap();
        assert!(skipped.is_empty());
        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "hello");
    }

    #[test]
    fn test_dir_size_sums_nested_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let src = temp_dir.path().join("src");
        let subdir = src.join("sub");
        fs::create_dir_all(&subdir).unwrap();
        fs::File::create(src.join("a.txt")).unwrap().write_all(b"1234").unwrap();
        fs::File::create(subdir.join("b.txt")).unwrap().write_all(b"12").unwrap();

        assert_eq!(dir_size(&src), 6);
    }
}
