//! Profile & settings migrator: everything that isn't tied to a
//! specific application — account resolution, profile folder transfer,
//! path remapping, browser/email data, and system-setting replay.

pub mod account;
pub mod browser;
pub mod email;
pub mod pathremap;
pub mod settings;

use crate::collaborators::ProcessRunner;
use crate::error::EngineError;
use crate::fs_ops;
use crate::model::UserMapping;
use crate::progress::ProgressCallback;
use crate::throttle::CancellationToken;
use std::path::Path;

pub struct ProfileSettingsMigrator<'a> {
    pub process_runner: &'a dyn ProcessRunner,
}

impl<'a> ProfileSettingsMigrator<'a> {
    /// Capture a single user's profile folder, browser data, and email
    /// data into `out_dir`, mirroring the structure `restore` expects.
    pub fn capture_user(&self, mapping: &UserMapping, out_dir: &Path, progress: &dyn ProgressCallback) -> Result<(), EngineError> {
        let user_dir = out_dir.join(&mapping.source.username);

        let profile_dir = user_dir.join("profile");
        let skipped = fs_ops::copy_tree(&mapping.source.profile_path, &profile_dir)?;
        progress.on_progress(1, 4);

        for browser_profile in &mapping.source.browser_profiles {
            let browser_out = user_dir.join("browsers").join(&browser_profile.browser).join(&browser_profile.profile_name);
            browser::capture_profile(browser_profile, &browser_out, mapping.allow_password_capture)?;
        }
        progress.on_progress(2, 4);

        for email_data in &mapping.source.email_data {
            let email_out = user_dir.join("email");
            email::capture(email_data, &email_out)?;
        }
        progress.on_progress(3, 4);

        if !skipped.is_empty() {
            tracing::warn!(user = %mapping.source.username, skipped_count = skipped.len(), "profile capture skipped some locked files");
        }
        progress.on_progress(4, 4);
        Ok(())
    }

    /// Restore a single user's captured profile, rewriting paths when
    /// the destination username differs from the source.
    pub fn restore_user(&self, captured_user_dir: &Path, mapping: &UserMapping, progress: &dyn ProgressCallback) -> Result<(), EngineError> {
        let profile_dir = captured_user_dir.join("profile");
        if profile_dir.exists() {
            fs_ops::copy_tree(&profile_dir, &mapping.destination_profile_path)?;
        }
        progress.on_progress(1, 2);

        if mapping.requires_path_remapping() {
            let old_path = mapping.source.profile_path.to_string_lossy().to_string();
            let new_path = mapping.destination_profile_path.to_string_lossy().to_string();
            pathremap::remap_tree(&mapping.destination_profile_path, &old_path, &new_path)?;
        }

        let browsers_dir = captured_user_dir.join("browsers");
        if browsers_dir.exists() {
            for browser_profile in &mapping.source.browser_profiles {
                let browser_captured = browsers_dir.join(&browser_profile.browser).join(&browser_profile.profile_name);
                if browser_captured.exists() {
                    browser::restore_profile(&browser_captured, &browser_profile.profile_path)?;
                }
            }
        }

        let email_dir = captured_user_dir.join("email");
        for email_data in &mapping.source.email_data {
            if email_dir.exists() {
                let _ = email::restore(&email_dir, &email_data.data_path);
            }
        }
        progress.on_progress(2, 2);
        Ok(())
    }

    /// Resolve every mapping's destination account before any data is
    /// transferred.
    pub fn resolve_accounts(&self, mappings: &mut [UserMapping], cancellation: &CancellationToken) -> Result<(), EngineError> {
        for mapping in mappings.iter_mut() {
            account::resolve_account(self.process_runner, mapping, cancellation)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccountType, UserProfile};
    use crate::progress::NullProgress;
    use crate::testutil::FakeProcessRunner;
    use std::path::PathBuf;

    fn sample_mapping(src: &Path, dst: &Path) -> UserMapping {
        UserMapping {
            source: UserProfile {
                username: "bill".into(),
                sid: "S-1-5-21-1".into(),
                profile_path: src.to_path_buf(),
                is_domain: false,
                account_type: AccountType::Local,
                known_folders: Default::default(),
                browser_profiles: vec![],
                email_data: vec![],
                estimated_size_bytes: 0,
            },
            destination_username: "william".into(),
            destination_profile_path: dst.to_path_buf(),
            destination_sid: None,
            create_if_missing: false,
            new_account_password: None,
            allow_password_capture: false,
        }
    }

    #[test]
    fn capture_then_restore_round_trips_profile_contents() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src-profile");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("Documents.txt"), "hello bill").unwrap();

        let dst = dir.path().join("dst-profile");
        let mapping = sample_mapping(&src, &dst);

        let runner = FakeProcessRunner::succeeding("");
        let migrator = ProfileSettingsMigrator { process_runner: &runner };

        let capture_dir = dir.path().join("capture");
        migrator.capture_user(&mapping, &capture_dir, &NullProgress).unwrap();

        migrator.restore_user(&capture_dir.join("bill"), &mapping, &NullProgress).unwrap();
        assert_eq!(std::fs::read_to_string(dst.join("Documents.txt")).unwrap(), "hello bill");
    }

    #[test]
    fn resolve_accounts_processes_every_mapping() {
        let runner = FakeProcessRunner::succeeding("SID\nS-1-5-21-1-1001\n");
        let migrator = ProfileSettingsMigrator { process_runner: &runner };
        let src = PathBuf::from("/tmp/src");
        let dst = PathBuf::from("/tmp/dst");
        let mut mappings = vec![sample_mapping(&src, &dst)];
        let token = CancellationToken::new();
        migrator.resolve_accounts(&mut mappings, &token).unwrap();
        assert_eq!(mappings[0].destination_sid, Some("S-1-5-21-1-1001".to_string()));
    }
}
