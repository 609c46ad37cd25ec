//! zim-cli — command-line interface for the migration engine.
//!
//! A technician drives a migration in two steps per machine: prepare a
//! capture plan (the selected applications, user mappings, and items),
//! run `capture` on the source to produce a job file plus a captured
//! data directory, carry both to the destination, then run `restore`
//! there against the same job file.

mod collaborators;

use clap::{Parser, Subcommand};
use engine::coordinator::MigrationCoordinator;
use engine::migrators::full_clone::FullCloneMigrator;
use engine::migrators::package::PackageMigrator;
use engine::migrators::registry_file::RegistryFileMigrator;
use engine::model::{JobStatus, MigrationItem, MigrationJob, TransportKind, UserMapping};
use engine::profile::ProfileSettingsMigrator;
use engine::progress::{ProgressCallback, StatusCallback};
use engine::throttle::CancellationToken;
use engine::{EngineError, MigrationConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;

use collaborators::{FileJobLogger, RegCliRegistryAccessor, StdFileSystemAccessor, SystemProcessRunner};

#[derive(Parser, Debug)]
#[command(name = "zim")]
#[command(version)]
#[command(about = "Zero-impact migration engine CLI")]
struct Args {
    /// Directory job records are persisted to.
    #[arg(long, global = true, value_name = "DIR")]
    jobs_dir: Option<PathBuf>,

    /// Path to a MigrationConfig TOML file; defaults to the platform config dir.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture a technician-prepared plan from the source machine.
    Capture {
        /// JSON file describing the items and user mappings to capture.
        #[arg(long, value_name = "PATH")]
        plan: PathBuf,
        /// Directory the captured data is written into.
        #[arg(long, value_name = "DIR")]
        out: PathBuf,
    },
    /// Restore a previously captured job onto the destination machine.
    Restore {
        /// The job.json file produced by `capture`.
        #[arg(long, value_name = "PATH")]
        job: PathBuf,
        /// Directory holding the captured data from `capture`.
        #[arg(long, value_name = "DIR")]
        input: PathBuf,
    },
    /// Inspect previously recorded jobs.
    #[command(subcommand)]
    Jobs(JobsCommand),
}

#[derive(Subcommand, Debug)]
enum JobsCommand {
    /// List every recorded job.
    List,
    /// Print a human-readable report for one job.
    Report {
        job_id: String,
        /// Write the report to a file instead of stdout.
        #[arg(long, value_name = "PATH")]
        export: Option<PathBuf>,
    },
}

/// The technician-authored input to `capture`: everything about a
/// `MigrationJob` except the lifecycle fields the CLI fills in itself.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CapturePlan {
    source_hostname: String,
    source_os: String,
    destination_hostname: String,
    destination_os: String,
    #[serde(default = "default_transport")]
    transport: TransportKind,
    #[serde(default)]
    profile_name: Option<String>,
    #[serde(default)]
    user_mappings: Vec<UserMapping>,
    items: Vec<MigrationItem>,
}

fn default_transport() -> TransportKind {
    TransportKind::LocalRemovable
}

fn build_job(plan: CapturePlan) -> MigrationJob {
    MigrationJob {
        id: uuid::Uuid::new_v4().to_string(),
        created_utc: chrono::Utc::now(),
        started_utc: None,
        completed_utc: None,
        status: JobStatus::Pending,
        source_hostname: plan.source_hostname,
        source_os: plan.source_os,
        destination_hostname: plan.destination_hostname,
        destination_os: plan.destination_os,
        transport: plan.transport,
        profile_name: plan.profile_name,
        user_mappings: plan.user_mappings,
        items: plan.items,
    }
}

/// Reports job/item lifecycle transitions and byte-level progress to
/// stderr, throttled the way the teacher's CLI throttled file progress.
struct CliStatus {
    start_time: Instant,
    last_progress_update: Mutex<Instant>,
}

impl CliStatus {
    fn new() -> Self {
        let now = Instant::now();
        CliStatus { start_time: now, last_progress_update: Mutex::new(now) }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;
        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }
        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    fn format_duration(elapsed: std::time::Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;
        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }
}

impl ProgressCallback for CliStatus {
    fn on_progress(&self, bytes_so_far: u64, bytes_total: u64) {
        let mut last = self.last_progress_update.lock().unwrap();
        if last.elapsed().as_millis() < 200 && bytes_so_far != bytes_total {
            return;
        }
        *last = Instant::now();
        if bytes_total == 0 {
            eprint!("\rProgress: {}", Self::format_bytes(bytes_so_far));
        } else {
            let percent = (bytes_so_far as f64 / bytes_total as f64 * 100.0) as u32;
            eprint!("\rProgress: {}% ({}/{})", percent, Self::format_bytes(bytes_so_far), Self::format_bytes(bytes_total));
        }
        let _ = std::io::Write::flush(&mut std::io::stderr());
    }
}

impl StatusCallback for CliStatus {
    fn on_job_started(&self, job: &MigrationJob) {
        eprintln!("Starting job {}", job.id);
        eprintln!("  {} -> {}", job.source_hostname, job.destination_hostname);
        eprintln!("  {} selected items", job.items.iter().filter(|i| i.is_selected).count());
    }

    fn on_item_started(&self, item: &MigrationItem) {
        eprintln!("[{:?}] {} starting", item.effective_tier(), item.display_name);
    }

    fn on_item_completed(&self, item: &MigrationItem) {
        let message = item.status_message.as_ref().map(|m| format!(" — {}", m)).unwrap_or_default();
        eprintln!("[{:?}] {} {:?}{}", item.effective_tier(), item.display_name, item.status, message);
    }

    fn on_job_completed(&self, job: &MigrationJob) {
        eprintln!();
        eprintln!("Job {:?} after {}", job.status, Self::format_duration(self.start_time.elapsed()));
        let failed = job.items.iter().filter(|i| i.status == engine::model::ItemStatus::Failed).count();
        if failed > 0 {
            eprintln!("{} item(s) failed:", failed);
            for item in job.items.iter().filter(|i| i.status == engine::model::ItemStatus::Failed) {
                eprintln!("  {}: {}", item.display_name, item.status_message.as_deref().unwrap_or("(no message)"));
            }
        }
    }
}

fn default_jobs_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(std::env::temp_dir).join("zim").join("jobs")
}

fn run(args: Args) -> Result<(), String> {
    let jobs_dir = args.jobs_dir.clone().unwrap_or_else(default_jobs_dir);
    let config = match &args.config {
        Some(path) => MigrationConfig::load(path).map_err(|e| e.to_string())?,
        None => MigrationConfig::load_default().map_err(|e| e.to_string())?,
    };

    let process_runner = SystemProcessRunner;
    let registry = RegCliRegistryAccessor { process_runner: &process_runner };
    let package_migrator = PackageMigrator { process_runner: &process_runner, registry: &registry, is_windows: cfg!(windows) };
    let registry_file_migrator = RegistryFileMigrator { registry: &registry };
    let full_clone_migrator = FullCloneMigrator { process_runner: &process_runner, chunk_threshold_bytes: config.split_threshold_bytes };
    let profile_migrator = ProfileSettingsMigrator { process_runner: &process_runner };
    let job_logger = FileJobLogger::new(jobs_dir);

    let coordinator = MigrationCoordinator {
        job_logger: &job_logger,
        package_migrator: &package_migrator,
        registry_file_migrator: &registry_file_migrator,
        full_clone_migrator: &full_clone_migrator,
        profile_migrator: &profile_migrator,
    };

    let status = CliStatus::new();
    let token = CancellationToken::new();

    match args.command {
        Command::Capture { plan, out } => {
            let text = std::fs::read_to_string(&plan).map_err(|e| format!("failed to read plan {}: {}", plan.display(), e))?;
            let plan: CapturePlan = serde_json::from_str(&text).map_err(|e| format!("invalid plan: {}", e))?;
            let mut job = build_job(plan);

            std::fs::create_dir_all(&out).map_err(|e| format!("failed to create {}: {}", out.display(), e))?;
            coordinator.capture(&mut job, &out, &token, &status, &status).map_err(|e| e.to_string())?;

            let job_path = out.join("job.json");
            let json = serde_json::to_string_pretty(&job).map_err(|e| e.to_string())?;
            std::fs::write(&job_path, json).map_err(|e| format!("failed to write {}: {}", job_path.display(), e))?;
            eprintln!("Job file written to {}", job_path.display());

            exit_on_job_status(&job)
        }
        Command::Restore { job, input } => {
            let text = std::fs::read_to_string(&job).map_err(|e| format!("failed to read job file {}: {}", job.display(), e))?;
            let mut job: MigrationJob = serde_json::from_str(&text).map_err(|e| format!("invalid job file: {}", e))?;
            coordinator.restore(&mut job, &input, &token, &status, &status).map_err(|e| e.to_string())?;
            exit_on_job_status(&job)
        }
        Command::Jobs(JobsCommand::List) => {
            let jobs = job_logger.list_jobs().map_err(|e| e.to_string())?;
            if jobs.is_empty() {
                println!("No recorded jobs.");
            }
            for job in jobs {
                println!("{}  {:?}  {} -> {}", job.id, job.status, job.source_hostname, job.destination_hostname);
            }
            Ok(())
        }
        Command::Jobs(JobsCommand::Report { job_id, export }) => {
            use engine::collaborators::JobLogger;
            match export {
                Some(path) => job_logger.export_report(&job_id, &path).map_err(|e| e.to_string()),
                None => {
                    let report = job_logger.generate_report(&job_id).map_err(|e| e.to_string())?;
                    print!("{}", report);
                    Ok(())
                }
            }
        }
    }
}

fn exit_on_job_status(job: &MigrationJob) -> Result<(), String> {
    match job.status {
        JobStatus::Completed => Ok(()),
        JobStatus::PartialSuccess => Err("job completed with some item failures".to_string()),
        other => Err(format!("job ended in status {:?}", other)),
    }
}

fn main() {
    let args = Args::parse();
    let exit_code = match run(args) {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };
    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::model::{ItemStatus, ItemType, Tier};

    fn sample_item() -> MigrationItem {
        MigrationItem {
            id: uuid::Uuid::new_v4(),
            display_name: "Notepad++".into(),
            item_type: ItemType::Application,
            recommended_tier: Tier::RegistryFile,
            override_tier: None,
            is_selected: true,
            estimated_size_bytes: 1024,
            status: ItemStatus::Queued,
            status_message: None,
            source_ref: None,
        }
    }

    #[test]
    fn build_job_fills_in_lifecycle_fields() {
        let plan = CapturePlan {
            source_hostname: "SRC".into(),
            source_os: "Windows 11".into(),
            destination_hostname: "DST".into(),
            destination_os: "Windows 11".into(),
            transport: TransportKind::LocalRemovable,
            profile_name: None,
            user_mappings: vec![],
            items: vec![sample_item()],
        };
        let job = build_job(plan);
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.started_utc.is_none());
        assert_eq!(job.items.len(), 1);
    }

    #[test]
    fn capture_plan_deserializes_with_defaulted_transport() {
        let json = r#"{
            "sourceHostname": "SRC",
            "sourceOs": "Windows 11",
            "destinationHostname": "DST",
            "destinationOs": "Windows 11",
            "items": []
        }"#;
        let plan: CapturePlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.transport, TransportKind::LocalRemovable);
    }

    #[test]
    fn exit_on_job_status_maps_partial_success_to_error() {
        let mut job = build_job(CapturePlan {
            source_hostname: "SRC".into(),
            source_os: "Windows 11".into(),
            destination_hostname: "DST".into(),
            destination_os: "Windows 11".into(),
            transport: TransportKind::LocalRemovable,
            profile_name: None,
            user_mappings: vec![],
            items: vec![],
        });
        job.status = JobStatus::PartialSuccess;
        assert!(exit_on_job_status(&job).is_err());
        job.status = JobStatus::Completed;
        assert!(exit_on_job_status(&job).is_ok());
    }
}
