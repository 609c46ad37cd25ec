//! Narrow trait interfaces the core consumes for host-OS integration.
//!
//! Each migrator takes exactly the collaborators it needs rather than a
//! single wide host object — `PackageMigrator` never sees a
//! `RegistryAccessor`, `RegistryFileMigrator` never sees a
//! `ProcessRunner` it doesn't use. Production implementations live
//! outside this crate (GUI/CLI binaries wire up the real Windows calls);
//! `#[cfg(test)]` doubles live in [`crate::testutil`].

use crate::throttle::CancellationToken;
use std::path::Path;

/// Result of invoking an external process to completion.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Invokes external processes (package managers, service control,
/// credential mount helpers) without the core depending on a concrete
/// process-spawning API.
pub trait ProcessRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[String],
        cancellation: &CancellationToken,
    ) -> Result<ProcessOutput, crate::error::EngineError>;
}

/// Which registry view to open — mirrors the 32-bit/64-bit redirection
/// a technician needs to reach when capturing a 32-bit application's
/// settings on a 64-bit host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryView {
    Default,
    Wow6432,
}

/// Which registry hive a key lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryHive {
    LocalMachine,
    CurrentUser,
    Users,
    ClassesRoot,
}

/// Reads and writes Windows registry keys/values. Queries are scoped by
/// `(hive, view, subkey)` so a single call identifies an exact key
/// regardless of redirection.
pub trait RegistryAccessor: Send + Sync {
    fn get_subkey_names(&self, hive: RegistryHive, view: RegistryView, subkey: &str) -> Result<Vec<String>, crate::error::EngineError>;

    fn get_string_value(
        &self,
        hive: RegistryHive,
        view: RegistryView,
        subkey: &str,
        value_name: &str,
    ) -> Result<Option<String>, crate::error::EngineError>;

    fn get_dword_value(
        &self,
        hive: RegistryHive,
        view: RegistryView,
        subkey: &str,
        value_name: &str,
    ) -> Result<Option<u32>, crate::error::EngineError>;

    fn set_string_value(
        &self,
        hive: RegistryHive,
        view: RegistryView,
        subkey: &str,
        value_name: &str,
        value: &str,
    ) -> Result<(), crate::error::EngineError>;
}

/// Filesystem enumeration and reads used by the profile/settings
/// migrator and application discovery, kept separate from `fs_ops`'s
/// tree-copy helpers so test doubles can simulate arbitrary trees
/// without touching a real disk.
pub trait FileSystemAccessor: Send + Sync {
    fn dir_exists(&self, path: &Path) -> bool;
    fn file_exists(&self, path: &Path) -> bool;
    fn get_directories(&self, path: &Path) -> Result<Vec<std::path::PathBuf>, crate::error::EngineError>;
    fn get_files(&self, path: &Path) -> Result<Vec<std::path::PathBuf>, crate::error::EngineError>;
    fn read_all_text(&self, path: &Path) -> Result<String, crate::error::EngineError>;
    fn read_all_lines(&self, path: &Path) -> Result<Vec<String>, crate::error::EngineError>;
    fn get_directory_size(&self, path: &Path) -> u64;
    fn get_file_size(&self, path: &Path) -> Result<u64, crate::error::EngineError>;
}

/// Persists `MigrationJob` records. The coordinator calls this at job
/// creation, after each tier, and on termination — it never writes job
/// history directly.
pub trait JobLogger: Send + Sync {
    fn create_job(&self, job: &crate::model::MigrationJob) -> Result<(), crate::error::EngineError>;
    fn update_job(&self, job: &crate::model::MigrationJob) -> Result<(), crate::error::EngineError>;
    fn list_jobs(&self) -> Result<Vec<crate::model::MigrationJob>, crate::error::EngineError>;
    fn get_job(&self, job_id: &str) -> Result<Option<crate::model::MigrationJob>, crate::error::EngineError>;
    fn generate_report(&self, job_id: &str) -> Result<String, crate::error::EngineError>;
    fn export_report(&self, job_id: &str, destination: &Path) -> Result<(), crate::error::EngineError>;
}

/// Loads and saves `UserProfile`/`UserMapping` templates from local disk
/// or a NAS-hosted profile store.
pub trait ProfileManager: Send + Sync {
    fn list_local(&self) -> Result<Vec<String>, crate::error::EngineError>;
    fn list_nas(&self) -> Result<Vec<String>, crate::error::EngineError>;
    fn load_local(&self, name: &str) -> Result<crate::model::UserProfile, crate::error::EngineError>;
    fn load_nas(&self, name: &str) -> Result<crate::model::UserProfile, crate::error::EngineError>;
    fn save_local(&self, name: &str, profile: &crate::model::UserProfile) -> Result<(), crate::error::EngineError>;
    fn delete_local(&self, name: &str) -> Result<(), crate::error::EngineError>;
}
