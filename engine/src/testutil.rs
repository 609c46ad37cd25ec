//! Test-only doubles for the collaborator traits in [`crate::collaborators`].
//!
//! Each double is a minimal in-memory stand-in configured by the test
//! that uses it — no double tries to be a faithful OS simulation, only
//! enough surface for the migrator under test.

#![cfg(test)]

use crate::collaborators::{
    FileSystemAccessor, JobLogger, ProcessOutput, ProcessRunner, ProfileManager, RegistryAccessor, RegistryHive,
    RegistryView,
};
use crate::error::EngineError;
use crate::model::{MigrationJob, UserProfile};
use crate::throttle::CancellationToken;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Runs no process; returns a pre-configured output for every call and
/// records the invocations it received.
pub struct FakeProcessRunner {
    pub output: ProcessOutput,
    pub calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeProcessRunner {
    pub fn succeeding(stdout: &str) -> Self {
        FakeProcessRunner {
            output: ProcessOutput { exit_code: 0, stdout: stdout.to_string(), stderr: String::new() },
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ProcessRunner for FakeProcessRunner {
    fn run(&self, program: &str, args: &[String], _cancellation: &CancellationToken) -> Result<ProcessOutput, EngineError> {
        self.calls.lock().unwrap().push((program.to_string(), args.to_vec()));
        Ok(self.output.clone())
    }
}

/// An in-memory registry keyed by `(hive, view, subkey, value_name)`.
#[derive(Default)]
pub struct FakeRegistry {
    pub string_values: Mutex<BTreeMap<(String, String, String, String), String>>,
    pub dword_values: BTreeMap<(String, String, String, String), u32>,
    pub subkeys: BTreeMap<(String, String, String), Vec<String>>,
}

fn view_key(view: RegistryView) -> &'static str {
    match view {
        RegistryView::Default => "default",
        RegistryView::Wow6432 => "wow6432",
    }
}

fn hive_key(hive: RegistryHive) -> &'static str {
    match hive {
        RegistryHive::LocalMachine => "HKLM",
        RegistryHive::CurrentUser => "HKCU",
        RegistryHive::Users => "HKU",
        RegistryHive::ClassesRoot => "HKCR",
    }
}

impl RegistryAccessor for FakeRegistry {
    fn get_subkey_names(&self, hive: RegistryHive, view: RegistryView, subkey: &str) -> Result<Vec<String>, EngineError> {
        let key = (hive_key(hive).to_string(), view_key(view).to_string(), subkey.to_string());
        Ok(self.subkeys.get(&key).cloned().unwrap_or_default())
    }

    fn get_string_value(&self, hive: RegistryHive, view: RegistryView, subkey: &str, value_name: &str) -> Result<Option<String>, EngineError> {
        let key = (hive_key(hive).to_string(), view_key(view).to_string(), subkey.to_string(), value_name.to_string());
        Ok(self.string_values.lock().unwrap().get(&key).cloned())
    }

    fn get_dword_value(&self, hive: RegistryHive, view: RegistryView, subkey: &str, value_name: &str) -> Result<Option<u32>, EngineError> {
        let key = (hive_key(hive).to_string(), view_key(view).to_string(), subkey.to_string(), value_name.to_string());
        Ok(self.dword_values.get(&key).copied())
    }

    fn set_string_value(&self, hive: RegistryHive, view: RegistryView, subkey: &str, value_name: &str, value: &str) -> Result<(), EngineError> {
        let key = (hive_key(hive).to_string(), view_key(view).to_string(), subkey.to_string(), value_name.to_string());
        self.string_values.lock().unwrap().insert(key, value.to_string());
        Ok(())
    }
}

/// A filesystem double backed by an explicit in-memory tree, for
/// migrators that must not touch the real disk in unit tests.
#[derive(Default)]
pub struct FakeFileSystem {
    pub directories: Vec<PathBuf>,
    pub files: BTreeMap<PathBuf, String>,
}

impl FileSystemAccessor for FakeFileSystem {
    fn dir_exists(&self, path: &Path) -> bool {
        self.directories.iter().any(|d| d == path)
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn get_directories(&self, path: &Path) -> Result<Vec<PathBuf>, EngineError> {
        Ok(self.directories.iter().filter(|d| d.parent() == Some(path)).cloned().collect())
    }

    fn get_files(&self, path: &Path) -> Result<Vec<PathBuf>, EngineError> {
        Ok(self.files.keys().filter(|f| f.parent() == Some(path)).cloned().collect())
    }

    fn read_all_text(&self, path: &Path) -> Result<String, EngineError> {
        self.files.get(path).cloned().ok_or_else(|| EngineError::SourceNotFound { path: path.to_path_buf() })
    }

    fn read_all_lines(&self, path: &Path) -> Result<Vec<String>, EngineError> {
        Ok(self.read_all_text(path)?.lines().map(|l| l.to_string()).collect())
    }

    fn get_directory_size(&self, path: &Path) -> u64 {
        self.files.iter().filter(|(p, _)| p.starts_with(path)).map(|(_, c)| c.len() as u64).sum()
    }

    fn get_file_size(&self, path: &Path) -> Result<u64, EngineError> {
        Ok(self.read_all_text(path)?.len() as u64)
    }
}

/// Records job records in memory in creation order; `update_job`
/// overwrites the entry matching `id`.
#[derive(Default)]
pub struct FakeJobLogger {
    pub jobs: Mutex<Vec<MigrationJob>>,
}

impl JobLogger for FakeJobLogger {
    fn create_job(&self, job: &MigrationJob) -> Result<(), EngineError> {
        self.jobs.lock().unwrap().push(job.clone());
        Ok(())
    }

    fn update_job(&self, job: &MigrationJob) -> Result<(), EngineError> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(existing) = jobs.iter_mut().find(|j| j.id == job.id) {
            *existing = job.clone();
        }
        Ok(())
    }

    fn list_jobs(&self) -> Result<Vec<MigrationJob>, EngineError> {
        Ok(self.jobs.lock().unwrap().clone())
    }

    fn get_job(&self, job_id: &str) -> Result<Option<MigrationJob>, EngineError> {
        Ok(self.jobs.lock().unwrap().iter().find(|j| j.id == job_id).cloned())
    }

    fn generate_report(&self, job_id: &str) -> Result<String, EngineError> {
        Ok(format!("report for {}", job_id))
    }

    fn export_report(&self, _job_id: &str, _destination: &Path) -> Result<(), EngineError> {
        Ok(())
    }
}

/// A profile store backed by an in-memory map, standing in for both the
/// local and NAS stores (tests populate whichever side they need).
#[derive(Default)]
pub struct FakeProfileStore {
    pub local: Mutex<BTreeMap<String, UserProfile>>,
    pub nas: BTreeMap<String, UserProfile>,
}

impl ProfileManager for FakeProfileStore {
    fn list_local(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.local.lock().unwrap().keys().cloned().collect())
    }

    fn list_nas(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.nas.keys().cloned().collect())
    }

    fn load_local(&self, name: &str) -> Result<UserProfile, EngineError> {
        self.local
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UserError { message: format!("no local profile named {}", name) })
    }

    fn load_nas(&self, name: &str) -> Result<UserProfile, EngineError> {
        self.nas
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UserError { message: format!("no NAS profile named {}", name) })
    }

    fn save_local(&self, name: &str, profile: &UserProfile) -> Result<(), EngineError> {
        self.local.lock().unwrap().insert(name.to_string(), profile.clone());
        Ok(())
    }

    fn delete_local(&self, name: &str) -> Result<(), EngineError> {
        self.local.lock().unwrap().remove(name);
        Ok(())
    }
}
