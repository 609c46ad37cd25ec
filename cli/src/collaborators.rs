//! Production collaborator implementations wiring the engine's narrow
//! traits to the real host OS: external processes via `std::process`,
//! the registry via the `reg.exe` console tool, plain `std::fs`
//! enumeration, and JSON-file-backed job/profile stores.
//!
//! The engine core never depends on Windows directly (see
//! `engine::collaborators`); these types are what a binary wires up in
//! its place. `RegCliRegistryAccessor` shells out to `reg.exe` rather
//! than linking a registry crate directly, the same way the tier
//! migrators already shell out to `winget`/`choco` through
//! `ProcessRunner` for package installs.

use engine::collaborators::{
    FileSystemAccessor, JobLogger, ProcessOutput, ProcessRunner, ProfileManager, RegistryAccessor, RegistryHive,
    RegistryView,
};
use engine::model::{MigrationJob, UserProfile};
use engine::throttle::CancellationToken;
use engine::EngineError;
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, program: &str, args: &[String], cancellation: &CancellationToken) -> Result<ProcessOutput, EngineError> {
        if cancellation.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| EngineError::Unknown { message: format!("failed to run {}: {}", program, e) })?;
        Ok(ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn hive_name(hive: RegistryHive) -> &'static str {
    match hive {
        RegistryHive::LocalMachine => "HKLM",
        RegistryHive::CurrentUser => "HKCU",
        RegistryHive::Users => "HKU",
        RegistryHive::ClassesRoot => "HKCR",
    }
}

fn view_flag(view: RegistryView) -> Option<&'static str> {
    match view {
        RegistryView::Default => None,
        RegistryView::Wow6432 => Some("32"),
    }
}

/// Reads and writes the registry through the `reg.exe` console tool,
/// the same shelling-out pattern the tier migrators already use for
/// package managers — no registry-access crate in the pack this engine
/// is grounded on, so this never links one directly.
pub struct RegCliRegistryAccessor<'a> {
    pub process_runner: &'a dyn ProcessRunner,
}

impl<'a> RegCliRegistryAccessor<'a> {
    fn query(&self, hive: RegistryHive, view: RegistryView, subkey: &str, extra: &[&str]) -> Result<ProcessOutput, EngineError> {
        let key_path = format!("{}\\{}", hive_name(hive), subkey);
        let mut args = vec!["query".to_string(), key_path];
        args.extend(extra.iter().map(|s| s.to_string()));
        if let Some(flag) = view_flag(view) {
            args.push(format!("/reg:{}", flag));
        }
        let token = CancellationToken::new();
        self.process_runner.run("reg", &args, &token)
    }
}

impl<'a> RegistryAccessor for RegCliRegistryAccessor<'a> {
    fn get_subkey_names(&self, hive: RegistryHive, view: RegistryView, subkey: &str) -> Result<Vec<String>, EngineError> {
        let key_path = format!("{}\\{}", hive_name(hive), subkey);
        let output = self.query(hive, view, subkey, &[])?;
        if output.exit_code != 0 {
            return Ok(Vec::new());
        }
        let names = output
            .stdout
            .lines()
            .filter(|line| line.starts_with(&key_path) && line.trim() != key_path)
            .filter_map(|line| line.rsplit('\\').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Ok(names)
    }

    fn get_string_value(&self, hive: RegistryHive, view: RegistryView, subkey: &str, value_name: &str) -> Result<Option<String>, EngineError> {
        let output = self.query(hive, view, subkey, &["/v", value_name])?;
        if output.exit_code != 0 {
            return Ok(None);
        }
        for line in output.stdout.lines() {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix(value_name) {
                if let Some(value) = rest.trim().strip_prefix("REG_SZ") {
                    return Ok(Some(value.trim().to_string()));
                }
            }
        }
        Ok(None)
    }

    fn get_dword_value(&self, hive: RegistryHive, view: RegistryView, subkey: &str, value_name: &str) -> Result<Option<u32>, EngineError> {
        let output = self.query(hive, view, subkey, &["/v", value_name])?;
        if output.exit_code != 0 {
            return Ok(None);
        }
        for line in output.stdout.lines() {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix(value_name) {
                if let Some(value) = rest.trim().strip_prefix("REG_DWORD") {
                    let hex = value.trim().trim_start_matches("0x");
                    if let Ok(n) = u32::from_str_radix(hex, 16) {
                        return Ok(Some(n));
                    }
                }
            }
        }
        Ok(None)
    }

    fn set_string_value(&self, hive: RegistryHive, view: RegistryView, subkey: &str, value_name: &str, value: &str) -> Result<(), EngineError> {
        let key_path = format!("{}\\{}", hive_name(hive), subkey);
        let mut args = vec![
            "add".to_string(),
            key_path,
            "/v".to_string(),
            value_name.to_string(),
            "/t".to_string(),
            "REG_SZ".to_string(),
            "/d".to_string(),
            value.to_string(),
            "/f".to_string(),
        ];
        if let Some(flag) = view_flag(view) {
            args.push(format!("/reg:{}", flag));
        }
        let token = CancellationToken::new();
        let output = self.process_runner.run("reg", &args, &token)?;
        if output.exit_code != 0 {
            return Err(EngineError::UserError { message: format!("reg add failed: {}", output.stderr) });
        }
        Ok(())
    }
}

pub struct StdFileSystemAccessor;

impl FileSystemAccessor for StdFileSystemAccessor {
    fn dir_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn get_directories(&self, path: &Path) -> Result<Vec<PathBuf>, EngineError> {
        let entries = std::fs::read_dir(path).map_err(|e| EngineError::EnumerationFailed { path: path.to_path_buf(), source: e })?;
        Ok(entries.filter_map(|e| e.ok()).map(|e| e.path()).filter(|p| p.is_dir()).collect())
    }

    fn get_files(&self, path: &Path) -> Result<Vec<PathBuf>, EngineError> {
        let entries = std::fs::read_dir(path).map_err(|e| EngineError::EnumerationFailed { path: path.to_path_buf(), source: e })?;
        Ok(entries.filter_map(|e| e.ok()).map(|e| e.path()).filter(|p| p.is_file()).collect())
    }

    fn read_all_text(&self, path: &Path) -> Result<String, EngineError> {
        std::fs::read_to_string(path).map_err(|e| EngineError::ReadError { path: path.to_path_buf(), source: e })
    }

    fn read_all_lines(&self, path: &Path) -> Result<Vec<String>, EngineError> {
        Ok(self.read_all_text(path)?.lines().map(|l| l.to_string()).collect())
    }

    fn get_directory_size(&self, path: &Path) -> u64 {
        engine::fs_ops::dir_size(path)
    }

    fn get_file_size(&self, path: &Path) -> Result<u64, EngineError> {
        std::fs::metadata(path)
            .map(|m| m.len())
            .map_err(|e| EngineError::ReadError { path: path.to_path_buf(), source: e })
    }
}

/// Persists one `<job-id>.json` file per job under `dir`.
pub struct FileJobLogger {
    pub dir: PathBuf,
}

impl FileJobLogger {
    pub fn new(dir: PathBuf) -> Self {
        FileJobLogger { dir }
    }

    fn job_path(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", job_id))
    }
}

impl JobLogger for FileJobLogger {
    fn create_job(&self, job: &MigrationJob) -> Result<(), EngineError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| EngineError::DirectoryCreationFailed { path: self.dir.clone(), source: e })?;
        let path = self.job_path(&job.id);
        let json = serde_json::to_string_pretty(job)?;
        std::fs::write(&path, json).map_err(|e| EngineError::WriteError { path, source: e })
    }

    fn update_job(&self, job: &MigrationJob) -> Result<(), EngineError> {
        self.create_job(job)
    }

    fn list_jobs(&self) -> Result<Vec<MigrationJob>, EngineError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir).map_err(|e| EngineError::EnumerationFailed { path: self.dir.clone(), source: e })?;
        let mut jobs = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                let text = std::fs::read_to_string(&path).map_err(|e| EngineError::ReadError { path: path.clone(), source: e })?;
                jobs.push(serde_json::from_str(&text)?);
            }
        }
        jobs.sort_by(|a: &MigrationJob, b: &MigrationJob| a.created_utc.cmp(&b.created_utc));
        Ok(jobs)
    }

    fn get_job(&self, job_id: &str) -> Result<Option<MigrationJob>, EngineError> {
        let path = self.job_path(job_id);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).map_err(|e| EngineError::ReadError { path: path.clone(), source: e })?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn generate_report(&self, job_id: &str) -> Result<String, EngineError> {
        let job = self
            .get_job(job_id)?
            .ok_or_else(|| EngineError::UserError { message: format!("no job with id {}", job_id) })?;

        let mut report = String::new();
        report.push_str(&format!("Job {}\n", job.id));
        report.push_str(&format!("  Status: {:?}\n", job.status));
        report.push_str(&format!("  Source: {} ({})\n", job.source_hostname, job.source_os));
        report.push_str(&format!("  Destination: {} ({})\n", job.destination_hostname, job.destination_os));
        report.push_str(&format!("  Transport: {:?}\n", job.transport));
        report.push_str(&format!("  Items: {}\n", job.items.len()));
        for item in &job.items {
            report.push_str(&format!(
                "    - [{:?}] {} ({:?}/{:?}){}\n",
                item.status,
                item.display_name,
                item.item_type,
                item.effective_tier(),
                item.status_message.as_ref().map(|m| format!(" — {}", m)).unwrap_or_default(),
            ));
        }
        Ok(report)
    }

    fn export_report(&self, job_id: &str, destination: &Path) -> Result<(), EngineError> {
        let report = self.generate_report(job_id)?;
        std::fs::write(destination, report).map_err(|e| EngineError::WriteError { path: destination.to_path_buf(), source: e })
    }
}

/// Persists `UserProfile` templates as `<name>.json` files; the "NAS"
/// store is just a second directory, which a technician points at an
/// actual network share by passing its UNC/mount path.
pub struct FileProfileManager {
    pub local_dir: PathBuf,
    pub nas_dir: PathBuf,
}

impl FileProfileManager {
    fn list_dir(dir: &Path) -> Result<Vec<String>, EngineError> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(dir).map_err(|e| EngineError::EnumerationFailed { path: dir.to_path_buf(), source: e })?;
        Ok(entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect())
    }

    fn load(dir: &Path, name: &str) -> Result<UserProfile, EngineError> {
        let path = dir.join(format!("{}.json", name));
        let text = std::fs::read_to_string(&path).map_err(|e| EngineError::ReadError { path: path.clone(), source: e })?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl ProfileManager for FileProfileManager {
    fn list_local(&self) -> Result<Vec<String>, EngineError> {
        Self::list_dir(&self.local_dir)
    }

    fn list_nas(&self) -> Result<Vec<String>, EngineError> {
        Self::list_dir(&self.nas_dir)
    }

    fn load_local(&self, name: &str) -> Result<UserProfile, EngineError> {
        Self::load(&self.local_dir, name)
    }

    fn load_nas(&self, name: &str) -> Result<UserProfile, EngineError> {
        Self::load(&self.nas_dir, name)
    }

    fn save_local(&self, name: &str, profile: &UserProfile) -> Result<(), EngineError> {
        std::fs::create_dir_all(&self.local_dir).map_err(|e| EngineError::DirectoryCreationFailed { path: self.local_dir.clone(), source: e })?;
        let path = self.local_dir.join(format!("{}.json", name));
        let json = serde_json::to_string_pretty(profile)?;
        std::fs::write(&path, json).map_err(|e| EngineError::WriteError { path, source: e })
    }

    fn delete_local(&self, name: &str) -> Result<(), EngineError> {
        let path = self.local_dir.join(format!("{}.json", name));
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| EngineError::WriteError { path, source: e })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::model::{JobStatus, TransportKind};

    fn sample_job(id: &str) -> MigrationJob {
        MigrationJob {
            id: id.to_string(),
            created_utc: chrono::Utc::now(),
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
            items: vec![],
        }
    }

    #[test]
    fn file_job_logger_round_trips_create_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileJobLogger::new(dir.path().to_path_buf());
        let job = sample_job("job-1");
        logger.create_job(&job).unwrap();
        let loaded = logger.get_job("job-1").unwrap().unwrap();
        assert_eq!(loaded.id, "job-1");
    }

    #[test]
    fn file_job_logger_list_jobs_sees_every_persisted_job() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileJobLogger::new(dir.path().to_path_buf());
        logger.create_job(&sample_job("job-1")).unwrap();
        logger.create_job(&sample_job("job-2")).unwrap();
        assert_eq!(logger.list_jobs().unwrap().len(), 2);
    }

    #[test]
    fn file_profile_manager_round_trips_local_profile() {
        let dir = tempfile::tempdir().unwrap();
        let manager = FileProfileManager { local_dir: dir.path().join("local"), nas_dir: dir.path().join("nas") };
        let profile = UserProfile {
            username: "bill".into(),
            sid: "S-1-5-21-1".into(),
            profile_path: PathBuf::from("C:\\Users\\bill"),
            is_domain: false,
            account_type: engine::model::AccountType::Local,
            known_folders: Default::default(),
            browser_profiles: vec![],
            email_data: vec![],
            estimated_size_bytes: 0,
        };
        manager.save_local("bill", &profile).unwrap();
        assert_eq!(manager.list_local().unwrap(), vec!["bill".to_string()]);
        assert_eq!(manager.load_local("bill").unwrap().sid, "S-1-5-21-1");
        manager.delete_local("bill").unwrap();
        assert!(manager.list_local().unwrap().is_empty());
    }
}
