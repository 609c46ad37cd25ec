use crate::collaborators::{FileJobLogger, RegCliRegistryAccessor, SystemProcessRunner};
use crate::progress::{GuiStatus, ProgressUpdate};
use crate::state::OperationMode;
use crate::JobSummary;
use crossbeam_channel::unbounded;
use engine::coordinator::MigrationCoordinator;
use engine::migrators::full_clone::FullCloneMigrator;
use engine::migrators::package::PackageMigrator;
use engine::migrators::registry_file::RegistryFileMigrator;
use engine::model::{ItemStatus, MigrationJob};
use engine::profile::ProfileSettingsMigrator;
use engine::throttle::CancellationToken;
use engine::MigrationConfig;
use std::path::{Path, PathBuf};
use std::thread;

/// Spawn a background worker thread to run a capture or restore job.
/// Progress flows out over a dedicated channel rather than back into
/// iced's message loop; `GuiApp` is a `Sandbox`, which has no
/// subscription mechanism to receive it asynchronously, so this mirrors
/// the same console-reporting pattern the teacher's worker used.
pub fn spawn_job(mode: OperationMode, plan_path: String, data_dir: String) {
    thread::spawn(move || {
        let (tx, rx) = unbounded::<ProgressUpdate>();
        thread::spawn(move || {
            while let Ok(update) = rx.recv() {
                match update {
                    ProgressUpdate::JobStarted { total_items } => println!("Job started: {} items", total_items),
                    ProgressUpdate::ItemStarted { name } => println!("  starting: {}", name),
                    ProgressUpdate::BytesProgress { bytes_so_far, bytes_total } => {
                        println!("  progress: {}/{}", bytes_so_far, bytes_total)
                    }
                    ProgressUpdate::ItemCompleted { name, status, message } => {
                        println!("  {} -> {:?}{}", name, status, message.map(|m| format!(" ({})", m)).unwrap_or_default())
                    }
                    ProgressUpdate::JobCompleted => println!("Job completed"),
                }
            }
        });

        match execute(mode, &plan_path, &data_dir, tx) {
            Ok(summary) => {
                println!(
                    "Run finished: {} completed, {} failed",
                    summary.done_count, summary.failed_count
                );
            }
            Err(e) => eprintln!("Run failed: {}", e),
        }
    });
}

fn execute(mode: OperationMode, plan_path: &str, data_dir: &str, tx: crossbeam_channel::Sender<ProgressUpdate>) -> Result<JobSummary, String> {
    let config = MigrationConfig::load_default().map_err(|e| e.to_string())?;
    let process_runner = SystemProcessRunner;
    let registry = RegCliRegistryAccessor { process_runner: &process_runner };
    let package_migrator = PackageMigrator { process_runner: &process_runner, registry: &registry, is_windows: cfg!(windows) };
    let registry_file_migrator = RegistryFileMigrator { registry: &registry };
    let full_clone_migrator = FullCloneMigrator { process_runner: &process_runner, chunk_threshold_bytes: config.split_threshold_bytes };
    let profile_migrator = ProfileSettingsMigrator { process_runner: &process_runner };

    let jobs_dir = dirs::data_dir().unwrap_or_else(std::env::temp_dir).join("zim").join("jobs");
    let job_logger = FileJobLogger::new(jobs_dir);

    let coordinator = MigrationCoordinator {
        job_logger: &job_logger,
        package_migrator: &package_migrator,
        registry_file_migrator: &registry_file_migrator,
        full_clone_migrator: &full_clone_migrator,
        profile_migrator: &profile_migrator,
    };

    let status = GuiStatus::new(tx);
    let token = CancellationToken::new();
    let data_dir = Path::new(data_dir);

    let mut job = load_job(mode, plan_path)?;

    match mode {
        OperationMode::Capture => {
            std::fs::create_dir_all(data_dir).map_err(|e| e.to_string())?;
            coordinator.capture(&mut job, data_dir, &token, &status, &status).map_err(|e| e.to_string())?;
            let job_path: PathBuf = data_dir.join("job.json");
            let json = serde_json::to_string_pretty(&job).map_err(|e| e.to_string())?;
            std::fs::write(job_path, json).map_err(|e| e.to_string())?;
        }
        OperationMode::Restore => {
            coordinator.restore(&mut job, data_dir, &token, &status, &status).map_err(|e| e.to_string())?;
        }
    }

    summarize(&job)
}

/// `Capture` takes a technician-authored plan; `Restore` takes the
/// `job.json` a prior capture produced, which already carries its own
/// items and lifecycle fields.
fn load_job(mode: OperationMode, path: &str) -> Result<MigrationJob, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path, e))?;
    match mode {
        OperationMode::Capture => {
            let plan: crate::plan::CapturePlan = serde_json::from_str(&text).map_err(|e| format!("invalid plan: {}", e))?;
            Ok(plan.into_job())
        }
        OperationMode::Restore => serde_json::from_str(&text).map_err(|e| format!("invalid job file: {}", e)),
    }
}

fn summarize(job: &MigrationJob) -> Result<JobSummary, String> {
    let mut done_count = 0;
    let mut failed_count = 0;
    let mut failed_items = Vec::new();

    for item in job.items.iter().filter(|i| i.is_selected) {
        match item.status {
            ItemStatus::Completed | ItemStatus::Skipped => done_count += 1,
            ItemStatus::Failed => {
                failed_count += 1;
                failed_items.push((item.display_name.clone(), item.status_message.clone().unwrap_or_else(|| "unknown error".to_string())));
            }
            _ => {}
        }
    }

    Ok(JobSummary {
        total_items: job.items.iter().filter(|i| i.is_selected).count(),
        done_count,
        failed_count,
        failed_items,
    })
}
