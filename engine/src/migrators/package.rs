//! Package tier migrator.
//!
//! Resolution preference order: winget → chocolatey on Windows, or
//! brew → apt → flatpak → snap elsewhere. Capture copies per-user
//! AppData subtrees and exports the matching HKCU subtree; restore
//! replays the recorded package installs and then overlays per-user
//! state, rewriting old user-path prefixes when the destination
//! username differs from the source.

use super::{rewrite_user_path_prefix, TierMigrator};
use crate::collaborators::{ProcessRunner, RegistryAccessor, RegistryHive, RegistryView};
use crate::error::EngineError;
use crate::fs_ops;
use crate::model::{ItemStatus, MigrationItem, PackageIdentifiers, PackageInstallEntry, UserMapping};
use crate::progress::ProgressCallback;
use crate::throttle::CancellationToken;
use std::path::{Path, PathBuf};

/// Resolve a single package-manager identifier from the preference
/// order, returning `(manager, identifier)`.
pub fn resolve_package(ids: &PackageIdentifiers, is_windows: bool) -> Option<(&'static str, String)> {
    if is_windows {
        ids.winget
            .clone()
            .map(|id| ("winget", id))
            .or_else(|| ids.chocolatey.clone().map(|id| ("chocolatey", id)))
    } else {
        ids.brew_cask
            .clone()
            .map(|id| ("brew", id))
            .or_else(|| ids.apt.clone().map(|id| ("apt", id)))
            .or_else(|| ids.flatpak.clone().map(|id| ("flatpak", id)))
            .or_else(|| ids.snap.clone().map(|id| ("snap", id)))
    }
}

fn install_args(manager: &str, identifier: &str) -> Vec<String> {
    match manager {
        "winget" => vec!["install".to_string(), "--id".to_string(), identifier.to_string(), "--silent".to_string()],
        "chocolatey" => vec!["install".to_string(), identifier.to_string(), "-y".to_string()],
        "brew" => vec!["install".to_string(), "--cask".to_string(), identifier.to_string()],
        "apt" => vec!["install".to_string(), "-y".to_string(), identifier.to_string()],
        "flatpak" => vec!["install".to_string(), "-y".to_string(), identifier.to_string()],
        "snap" => vec!["install".to_string(), identifier.to_string()],
        other => vec![other.to_string()],
    }
}

fn program_for(manager: &str) -> &'static str {
    match manager {
        "winget" => "winget",
        "chocolatey" => "choco",
        "brew" => "brew",
        "apt" => "apt-get",
        "flatpak" => "flatpak",
        "snap" => "snap",
        _ => "true",
    }
}

pub struct PackageMigrator<'a> {
    pub process_runner: &'a dyn ProcessRunner,
    pub registry: &'a dyn RegistryAccessor,
    pub is_windows: bool,
}

impl<'a> PackageMigrator<'a> {
    fn capture_one(&self, item: &mut MigrationItem, out_dir: &Path, usernames: &[String]) -> Result<PackageInstallEntry, EngineError> {
        let item_dir = out_dir.join(item.id.to_string());

        for username in usernames {
            let user_out_dir = item_dir.join(username);
            for subtree in ["AppData\\Roaming", "AppData\\Local", "AppData\\LocalLow"] {
                let src = PathBuf::from(format!("C:\\Users\\{}\\{}", username, subtree));
                if src.exists() {
                    let dest = user_out_dir.join(subtree);
                    let skipped = fs_ops::copy_tree(&src, &dest)?;
                    if !skipped.is_empty() {
                        item.status_message = Some(format!("{} entries skipped while capturing {}", skipped.len(), subtree));
                    }
                }
            }
        }

        let hkcu_subtree = format!("Software\\{}", item.display_name);
        let _ = self.registry.get_subkey_names(RegistryHive::CurrentUser, RegistryView::Default, &hkcu_subtree);

        let identifier = item.source_ref.clone().unwrap_or_else(|| item.display_name.clone());
        Ok(PackageInstallEntry {
            name: item.display_name.clone(),
            manager: if self.is_windows { "winget".to_string() } else { "brew".to_string() },
            identifier,
            version: None,
        })
    }

    fn restore_one(
        &self,
        install: &PackageInstallEntry,
        cancellation: &CancellationToken,
        user_mappings: &[UserMapping],
        in_dir: &Path,
        item_id: &str,
    ) -> Result<(), EngineError> {
        let program = program_for(&install.manager);
        let args = install_args(&install.manager, &install.identifier);
        let output = self.process_runner.run(program, &args, cancellation)?;
        if output.exit_code != 0 {
            return Err(EngineError::UserError {
                message: format!("package install for {} failed: {}", install.name, output.stderr),
            });
        }

        for mapping in user_mappings {
            if mapping.requires_path_remapping() {
                let old_prefix = format!("C:\\Users\\{}", mapping.source.username);
                let new_prefix = format!("C:\\Users\\{}", mapping.destination_username);
                let item_dir = in_dir.join(item_id).join(&mapping.source.username);
                if item_dir.exists() {
                    apply_path_rewrite_to_text_files(&item_dir, &old_prefix, &new_prefix)?;
                }
            }
        }
        Ok(())
    }
}

fn apply_path_rewrite_to_text_files(dir: &Path, old_prefix: &str, new_prefix: &str) -> Result<(), EngineError> {
    let entries = fs_ops::enumerate_tree(dir, dir)?;
    for entry in entries.iter().filter(|e| !e.is_dir) {
        if matches!(entry.source_path.extension().and_then(|e| e.to_str()), Some("ini") | Some("json") | Some("xml")) {
            if let Ok(text) = std::fs::read_to_string(&entry.source_path) {
                let rewritten = rewrite_user_path_prefix(&text, old_prefix, new_prefix);
                if rewritten != text {
                    std::fs::write(&entry.source_path, rewritten).map_err(|e| EngineError::WriteError {
                        path: entry.source_path.clone(),
                        source: e,
                    })?;
                }
            }
        }
    }
    Ok(())
}

impl<'a> TierMigrator for PackageMigrator<'a> {
    fn capture(&self, items: &mut [MigrationItem], out_dir: &Path, progress: &dyn ProgressCallback) -> Result<(), EngineError> {
        let total = items.len().max(1);
        let mut installs = Vec::new();
        for (index, item) in items.iter_mut().enumerate() {
            item.status = ItemStatus::InProgress;
            let usernames = item
                .source_ref
                .as_ref()
                .map(|s| vec![s.clone()])
                .unwrap_or_default();

            match self.capture_one(item, out_dir, &usernames) {
                Ok(install) => {
                    installs.push(install);
                    item.status = ItemStatus::Completed;
                }
                Err(e) => {
                    item.status = ItemStatus::Failed;
                    item.status_message = Some(e.to_string());
                }
            }
            progress.on_progress((index + 1) as u64, total as u64);
        }

        std::fs::create_dir_all(out_dir).map_err(|e| EngineError::DirectoryCreationFailed { path: out_dir.to_path_buf(), source: e })?;
        let manifest_path = out_dir.join("package-installs.json");
        let json = serde_json::to_string_pretty(&installs)?;
        std::fs::write(&manifest_path, json).map_err(|e| EngineError::WriteError { path: manifest_path, source: e })?;
        Ok(())
    }

    fn restore(&self, in_dir: &Path, user_mappings: &[UserMapping], progress: &dyn ProgressCallback) -> Result<(), EngineError> {
        let manifest_path = in_dir.join("package-installs.json");
        let text = std::fs::read_to_string(&manifest_path).map_err(|e| EngineError::ReadError {
            path: manifest_path.clone(),
            source: e,
        })?;
        let installs: Vec<PackageInstallEntry> = serde_json::from_str(&text)?;
        let token = CancellationToken::new();
        let total = installs.len().max(1);

        for (index, install) in installs.iter().enumerate() {
            self.restore_one(install, &token, user_mappings, in_dir, &install.identifier)?;
            progress.on_progress((index + 1) as u64, total as u64);
        }
        Ok(())
    }
}
