//! Migration coordinator: owns the `MigrationJob` lifecycle and
//! dispatches selected items to the tier migrator matching their
//! `effective_tier`, then layers the profile & settings migrator's
//! per-user work on top for `UserProfile` items.

use crate::collaborators::JobLogger;
use crate::error::EngineError;
use crate::model::{ItemStatus, ItemType, JobStatus, MigrationItem, MigrationJob, Tier, UserMapping};
use crate::profile::settings::SystemSetting;
use crate::profile::ProfileSettingsMigrator;
use crate::progress::{ProgressCallback, StatusCallback};
use crate::migrators::TierMigrator;
use crate::throttle::CancellationToken;
use chrono::Utc;
use std::path::Path;

pub struct MigrationCoordinator<'a> {
    pub job_logger: &'a dyn JobLogger,
    pub package_migrator: &'a dyn TierMigrator,
    pub registry_file_migrator: &'a dyn TierMigrator,
    pub full_clone_migrator: &'a dyn TierMigrator,
    pub profile_migrator: &'a ProfileSettingsMigrator<'a>,
}

impl<'a> MigrationCoordinator<'a> {
    fn migrator_for(&self, tier: Tier) -> &dyn TierMigrator {
        match tier {
            Tier::Package => self.package_migrator,
            Tier::RegistryFile => self.registry_file_migrator,
            Tier::FullClone => self.full_clone_migrator,
        }
    }

    /// Run every selected item in `job` through its effective tier
    /// migrator, then capture each `UserProfile` item's per-user state.
    /// `out_dir` is the root every tier writes its captured artifacts
    /// under, keyed by item id (per-tier migrators own the subpath).
    pub fn capture(
        &self,
        job: &mut MigrationJob,
        out_dir: &Path,
        cancellation: &CancellationToken,
        progress: &dyn ProgressCallback,
        status: &dyn StatusCallback,
    ) -> Result<(), EngineError> {
        job.status = JobStatus::InProgress;
        job.started_utc = Some(Utc::now());
        self.job_logger.create_job(job)?;
        status.on_job_started(job);

        for item in job.items.iter().filter(|i| i.is_selected) {
            status.on_item_started(item);
        }

        let result = self.run_tiers_and_profiles(job, out_dir, cancellation, progress, true);
        self.finish(job, result)?;

        for item in job.items.iter().filter(|i| i.is_selected) {
            status.on_item_completed(item);
        }
        status.on_job_completed(job);
        Ok(())
    }

    /// Resolve destination accounts, then restore every selected item
    /// through its effective tier migrator and each `UserProfile` item's
    /// per-user state, rewriting paths wherever a mapping's destination
    /// username differs from its source.
    pub fn restore(
        &self,
        job: &mut MigrationJob,
        in_dir: &Path,
        cancellation: &CancellationToken,
        progress: &dyn ProgressCallback,
        status: &dyn StatusCallback,
    ) -> Result<(), EngineError> {
        job.status = JobStatus::InProgress;
        job.started_utc = Some(Utc::now());
        self.job_logger.create_job(job)?;
        status.on_job_started(job);

        for item in job.items.iter().filter(|i| i.is_selected) {
            status.on_item_started(item);
        }

        let result = self
            .profile_migrator
            .resolve_accounts(&mut job.user_mappings, cancellation)
            .and_then(|()| self.run_tiers_and_profiles(job, in_dir, cancellation, progress, false));
        self.finish(job, result)?;

        for item in job.items.iter().filter(|i| i.is_selected) {
            status.on_item_completed(item);
        }
        status.on_job_completed(job);
        Ok(())
    }

    fn run_tiers_and_profiles(
        &self,
        job: &mut MigrationJob,
        dir: &Path,
        cancellation: &CancellationToken,
        progress: &dyn ProgressCallback,
        is_capture: bool,
    ) -> Result<(), EngineError> {
        for tier in [Tier::Package, Tier::RegistryFile, Tier::FullClone] {
            if cancellation.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            self.dispatch_tier(job, tier, dir, progress, is_capture)?;
        }

        for mapping in job.user_mappings.clone().iter() {
            if cancellation.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let has_profile_item = job
                .items
                .iter()
                .any(|i| i.is_selected && i.item_type == ItemType::UserProfile && i.source_ref.as_deref() == Some(mapping.source.username.as_str()));
            if !has_profile_item {
                continue;
            }
            if is_capture {
                self.profile_migrator.capture_user(mapping, dir, progress)?;
            } else {
                let captured_user_dir = dir.join(&mapping.source.username);
                self.profile_migrator.restore_user(&captured_user_dir, mapping, progress)?;
            }
        }
        Ok(())
    }

    fn dispatch_tier(&self, job: &mut MigrationJob, tier: Tier, dir: &Path, progress: &dyn ProgressCallback, is_capture: bool) -> Result<(), EngineError> {
        let indices: Vec<usize> = job
            .items
            .iter()
            .enumerate()
            .filter(|(_, i)| i.is_selected && i.effective_tier() == tier)
            .map(|(idx, _)| idx)
            .collect();
        if indices.is_empty() {
            return Ok(());
        }

        let migrator = self.migrator_for(tier);
        if is_capture {
            let mut subset: Vec<MigrationItem> = indices.iter().map(|&i| job.items[i].clone()).collect();
            migrator.capture(&mut subset, dir, progress)?;
            for (slot, &idx) in indices.iter().enumerate() {
                job.items[idx] = subset[slot].clone();
            }
        } else {
            migrator.restore(dir, &job.user_mappings, progress)?;
            for &idx in &indices {
                if job.items[idx].status != ItemStatus::Failed {
                    job.items[idx].status = ItemStatus::Completed;
                }
            }
        }
        Ok(())
    }

    /// Apply the terminal job status and persist it via `JobLogger`,
    /// deriving `PartialSuccess` when items ended in a mix of
    /// `Completed` and `Failed` (spec §4.6).
    fn finish(&self, job: &mut MigrationJob, result: Result<(), EngineError>) -> Result<(), EngineError> {
        job.completed_utc = Some(Utc::now());
        job.status = match result {
            Err(EngineError::Cancelled) => JobStatus::Cancelled,
            Err(_) => JobStatus::Failed,
            Ok(()) => {
                let selected: Vec<&MigrationItem> = job.items.iter().filter(|i| i.is_selected).collect();
                let any_failed = selected.iter().any(|i| i.status == ItemStatus::Failed);
                let any_completed = selected.iter().any(|i| i.status == ItemStatus::Completed);
                if any_failed && any_completed {
                    JobStatus::PartialSuccess
                } else if any_failed {
                    JobStatus::Failed
                } else {
                    JobStatus::Completed
                }
            }
        };
        self.job_logger.update_job(job)?;
        result.or_else(|e| if matches!(e, EngineError::Cancelled) { Ok(()) } else { Err(e) })
    }

    /// Replay a batch of previously discovered system settings against
    /// the destination, using `apply_fn` as the platform hook for a
    /// single setting's category-specific replay mechanism. Kept as a
    /// standalone entry point rather than folded into `restore` because
    /// `SystemSetting` isn't carried on `MigrationJob`'s item list (see
    /// the scoping note in `profile::settings`).
    pub fn replay_settings(&self, settings: &mut [SystemSetting], existing_lookup: impl Fn(&SystemSetting) -> Option<String>, mut apply_fn: impl FnMut(&SystemSetting) -> Result<(), EngineError>) {
        for setting in settings.iter_mut() {
            let existing = existing_lookup(setting);
            crate::profile::settings::replay_setting(setting, existing.as_deref(), &mut apply_fn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobStatus, Tier, TransportKind};
    use crate::progress::{NullProgress, NullStatus};
    use crate::testutil::{FakeJobLogger, FakeProcessRunner, FakeRegistry};
    use uuid::Uuid;

    fn sample_item(tier: Tier) -> MigrationItem {
        MigrationItem {
            id: Uuid::new_v4(),
            display_name: "Firefox".into(),
            item_type: ItemType::Application,
            recommended_tier: tier,
            override_tier: None,
            is_selected: true,
            estimated_size_bytes: 0,
            status: ItemStatus::Queued,
            status_message: None,
            source_ref: None,
        }
    }

    fn sample_job(items: Vec<MigrationItem>) -> MigrationJob {
        MigrationJob {
            id: "job-1".into(),
            created_utc: Utc::now(),
            started_utc: None,
            completed_utc: None,
            status: JobStatus::Pending,
            source_hostname: "SRC".into(),
            source_os: "Windows 11".into(),
            destination_hostname: "DST".into(),
            destination_os: "Windows 11".into(),
            transport: TransportKind::LocalRemovable,
            profile_name: None,
            user_mappings: vec![],
            items,
        }
    }

    #[test]
    fn capture_dispatches_by_effective_tier_and_completes_job() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeProcessRunner::succeeding("");
        let registry = FakeRegistry::default();
        let logger = FakeJobLogger::default();

        let package = crate::migrators::package::PackageMigrator { process_runner: &runner, registry: &registry, is_windows: true };
        let registry_file = crate::migrators::registry_file::RegistryFileMigrator { registry: &registry };
        let full_clone = crate::migrators::full_clone::FullCloneMigrator { process_runner: &runner, chunk_threshold_bytes: 1024 * 1024 * 1024 };
        let profile_migrator = ProfileSettingsMigrator { process_runner: &runner };

        let coordinator = MigrationCoordinator {
            job_logger: &logger,
            package_migrator: &package,
            registry_file_migrator: &registry_file,
            full_clone_migrator: &full_clone,
            profile_migrator: &profile_migrator,
        };

        let mut job = sample_job(vec![sample_item(Tier::RegistryFile)]);
        let token = CancellationToken::new();
        coordinator.capture(&mut job, dir.path(), &token, &NullProgress, &NullStatus).unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_utc.is_some());
        assert_eq!(logger.jobs.lock().unwrap().len(), 2);
    }

    #[test]
    fn capture_marks_job_cancelled_when_token_set_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeProcessRunner::succeeding("");
        let registry = FakeRegistry::default();
        let logger = FakeJobLogger::default();

        let package = crate::migrators::package::PackageMigrator { process_runner: &runner, registry: &registry, is_windows: true };
        let registry_file = crate::migrators::registry_file::RegistryFileMigrator { registry: &registry };
        let full_clone = crate::migrators::full_clone::FullCloneMigrator { process_runner: &runner, chunk_threshold_bytes: 1024 };
        let profile_migrator = ProfileSettingsMigrator { process_runner: &runner };

        let coordinator = MigrationCoordinator {
            job_logger: &logger,
            package_migrator: &package,
            registry_file_migrator: &registry_file,
            full_clone_migrator: &full_clone,
            profile_migrator: &profile_migrator,
        };

        let mut job = sample_job(vec![sample_item(Tier::Package)]);
        let token = CancellationToken::new();
        token.cancel();
        coordinator.capture(&mut job, dir.path(), &token, &NullProgress, &NullStatus).unwrap();

        assert_eq!(job.status, JobStatus::Cancelled);
    }

    #[test]
    fn replay_settings_applies_state_machine_per_entry() {
        let runner = FakeProcessRunner::succeeding("");
        let registry = FakeRegistry::default();
        let logger = FakeJobLogger::default();
        let package = crate::migrators::package::PackageMigrator { process_runner: &runner, registry: &registry, is_windows: true };
        let registry_file = crate::migrators::registry_file::RegistryFileMigrator { registry: &registry };
        let full_clone = crate::migrators::full_clone::FullCloneMigrator { process_runner: &runner, chunk_threshold_bytes: 1024 };
        let profile_migrator = ProfileSettingsMigrator { process_runner: &runner };
        let coordinator = MigrationCoordinator {
            job_logger: &logger,
            package_migrator: &package,
            registry_file_migrator: &registry_file,
            full_clone_migrator: &full_clone,
            profile_migrator: &profile_migrator,
        };

        let mut settings = vec![SystemSetting {
            category: crate::profile::settings::SettingCategory::EnvironmentVariable,
            name: "JAVA_HOME".into(),
            payload: "C:\\jdk-17".into(),
            status: crate::profile::settings::SettingStatus::Queued,
            status_message: None,
        }];
        coordinator.replay_settings(&mut settings, |_| None, |_| Ok(()));
        assert_eq!(settings[0].status, crate::profile::settings::SettingStatus::Applied);
    }
}
