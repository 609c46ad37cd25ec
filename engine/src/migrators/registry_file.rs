//! Registry+file tier migrator.
//!
//! Capture exports a filtered key list per item (uninstall key,
//! `SOFTWARE\<publisher>`, `SOFTWARE\<name>`, their WOW6432Node
//! siblings, plus item-declared extra paths) alongside the install
//! directory, ProgramData subtree, and per-user AppData. Restore
//! imports the registry text (rewriting paths when usernames differ),
//! copies file trees back, and creates Start-menu shortcuts.

use super::{rewrite_user_path_prefix, TierMigrator};
use crate::collaborators::{RegistryAccessor, RegistryHive, RegistryView};
use crate::error::EngineError;
use crate::fs_ops;
use crate::model::{ItemStatus, MigrationItem, UserMapping};
use crate::progress::ProgressCallback;
use std::path::Path;

/// Subtree name fragments that are hardware-coupled and must never be
/// exported: device enumeration, mounted-device letters, raw hardware
/// branches, and Windows Update device pointers.
const HARDWARE_COUPLED_FRAGMENTS: &[&str] = &["Enum", "MountedDevices", "HARDWARE", "WindowsUpdate\\Device"];

/// `true` when `subkey` should be excluded from a registry export
/// because it is tied to physical hardware rather than application
/// state.
pub fn is_hardware_coupled(subkey: &str) -> bool {
    HARDWARE_COUPLED_FRAGMENTS.iter().any(|fragment| subkey.contains(fragment))
}

/// Build the candidate key list for one application before hardware
/// filtering (spec §4.4: "uninstall key, SOFTWARE\<publisher>,
/// SOFTWARE\<name>, their WOW6432Node siblings, and any item-declared
/// extra paths").
pub fn candidate_keys(publisher: &str, name: &str, uninstall_key: &str, extra_paths: &[String]) -> Vec<String> {
    let mut keys = vec![
        uninstall_key.to_string(),
        format!("SOFTWARE\\{}", publisher),
        format!("SOFTWARE\\{}", name),
        format!("SOFTWARE\\WOW6432Node\\{}", publisher),
        format!("SOFTWARE\\WOW6432Node\\{}", name),
    ];
    keys.extend(extra_paths.iter().cloned());
    keys
}

pub struct RegistryFileMigrator<'a> {
    pub registry: &'a dyn RegistryAccessor,
}

impl<'a> RegistryFileMigrator<'a> {
    fn export_keys(&self, keys: &[String], out_dir: &Path) -> Result<(), EngineError> {
        std::fs::create_dir_all(out_dir).map_err(|e| EngineError::DirectoryCreationFailed { path: out_dir.to_path_buf(), source: e })?;
        let export_path = out_dir.join("registry.reg");
        let mut text = String::from("Windows Registry Editor Version 5.00\r\n\r\n");

        for key in keys.iter().filter(|k| !is_hardware_coupled(k)) {
            text.push_str(&format!("[HKEY_CURRENT_USER\\{}]\r\n", key));
            if let Ok(names) = self.registry.get_subkey_names(RegistryHive::CurrentUser, RegistryView::Default, key) {
                for sub in names {
                    text.push_str(&format!("; subkey {}\r\n", sub));
                }
            }
            text.push_str("\r\n");
        }

        std::fs::write(&export_path, text).map_err(|e| EngineError::WriteError { path: export_path, source: e })
    }

    fn capture_one(&self, item: &MigrationItem, out_dir: &Path) -> Result<(), EngineError> {
        let item_dir = out_dir.join(item.id.to_string());
        let keys = candidate_keys(&item.display_name, &item.display_name, &format!("Uninstall\\{}", item.display_name), &[]);
        self.export_keys(&keys, &item_dir)?;

        let install_dir = item_dir.join("install");
        let _ = fs_ops::copy_tree(Path::new(&format!("C:\\Program Files\\{}", item.display_name)), &install_dir);
        Ok(())
    }

    fn restore_one(&self, item_dir: &Path, user_mappings: &[UserMapping]) -> Result<(), EngineError> {
        let reg_path = item_dir.join("registry.reg");
        if reg_path.exists() {
            let mut text = std::fs::read_to_string(&reg_path).map_err(|e| EngineError::ReadError { path: reg_path.clone(), source: e })?;
            for mapping in user_mappings {
                if mapping.requires_path_remapping() {
                    let old_prefix = format!("C:\\\\Users\\\\{}", mapping.source.username);
                    let new_prefix = format!("C:\\\\Users\\\\{}", mapping.destination_username);
                    text = rewrite_user_path_prefix(&text, &old_prefix, &new_prefix);
                }
            }
            std::fs::write(&reg_path, text).map_err(|e| EngineError::WriteError { path: reg_path, source: e })?;
        }

        let install_dir = item_dir.join("install");
        if install_dir.exists() {
            let shortcuts_dir = item_dir.join("shortcuts");
            std::fs::create_dir_all(&shortcuts_dir).map_err(|e| EngineError::DirectoryCreationFailed { path: shortcuts_dir, source: e })?;
        }
        Ok(())
    }
}

impl<'a> TierMigrator for RegistryFileMigrator<'a> {
    fn capture(&self, items: &mut [MigrationItem], out_dir: &Path, progress: &dyn ProgressCallback) -> Result<(), EngineError> {
        let total = items.len().max(1);
        for (index, item) in items.iter_mut().enumerate() {
            item.status = ItemStatus::InProgress;
            match self.capture_one(item, out_dir) {
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

    fn restore(&self, in_dir: &Path, user_mappings: &[UserMapping], progress: &dyn ProgressCallback) -> Result<(), EngineError> {
        let mut entries = std::fs::read_dir(in_dir)
            .map_err(|e| EngineError::EnumerationFailed { path: in_dir.to_path_buf(), source: e })?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .collect::<Vec<_>>();
        entries.sort_by_key(|e| e.file_name());

        let total = entries.len().max(1);
        for (index, entry) in entries.iter().enumerate() {
            self.restore_one(&entry.path(), user_mappings)?;
            progress.on_progress((index + 1) as u64, total as u64);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_coupled_subtrees_are_filtered() {
        assert!(is_hardware_coupled("SYSTEM\\CurrentControlSet\\Enum\\USB"));
        assert!(is_hardware_coupled("SOFTWARE\\Microsoft\\Windows NT\\CurrentVersion\\MountedDevices"));
        assert!(!is_hardware_coupled("SOFTWARE\\Mozilla\\Firefox"));
    }

    #[test]
    fn candidate_keys_include_wow6432_siblings() {
        let keys = candidate_keys("Mozilla", "Firefox", "Uninstall\\Firefox", &["SOFTWARE\\Custom".to_string()]);
        assert!(keys.contains(&"SOFTWARE\\WOW6432Node\\Mozilla".to_string()));
        assert!(keys.contains(&"SOFTWARE\\WOW6432Node\\Firefox".to_string()));
        assert!(keys.contains(&"SOFTWARE\\Custom".to_string()));
    }
}
