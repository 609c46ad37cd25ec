//! Production collaborator implementations for the GUI binary, mirroring
//! the CLI's: external processes via `std::process`, the registry via
//! `reg.exe`, plain `std::fs` enumeration, and a JSON-file-backed job
//! store. Kept in the binary rather than the engine core per
//! `engine::collaborators`'s own doc comment.

use engine::collaborators::{JobLogger, ProcessOutput, ProcessRunner, RegistryAccessor, RegistryHive, RegistryView};
use engine::model::MigrationJob;
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
        Ok(output
            .stdout
            .lines()
            .filter(|line| line.starts_with(&key_path) && line.trim() != key_path)
            .filter_map(|line| line.rsplit('\\').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
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
        Ok(format!("{} ({:?}), {} items", job.id, job.status, job.items.len()))
    }

    fn export_report(&self, job_id: &str, destination: &Path) -> Result<(), EngineError> {
        let report = self.generate_report(job_id)?;
        std::fs::write(destination, report).map_err(|e| EngineError::WriteError { path: destination.to_path_buf(), source: e })
    }
}
