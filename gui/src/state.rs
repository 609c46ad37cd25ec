use crate::progress::ProgressUpdate;
use crate::JobSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    Capture,
    Restore,
}

impl std::fmt::Display for OperationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationMode::Capture => write!(f, "Capture"),
            OperationMode::Restore => write!(f, "Restore"),
        }
    }
}

/// Application state, holding all UI and job-related data.
#[derive(Debug)]
pub struct AppState {
    // Input fields
    pub plan_path: String,
    pub data_dir: String,
    pub selected_mode: OperationMode,

    // Job state
    pub is_running: bool,
    pub total_items: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub bytes_so_far: u64,
    pub bytes_total: u64,
    pub current_item_name: String,

    // UI state
    pub error_message: Option<String>,
    pub last_job_summary: Option<JobSummary>,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            plan_path: String::new(),
            data_dir: String::new(),
            selected_mode: OperationMode::Capture,

            is_running: false,
            total_items: 0,
            completed_count: 0,
            failed_count: 0,
            bytes_so_far: 0,
            bytes_total: 0,
            current_item_name: String::new(),

            error_message: None,
            last_job_summary: None,
        }
    }

    pub fn handle_progress_update(&mut self, update: ProgressUpdate) {
        match update {
            ProgressUpdate::JobStarted { total_items } => {
                self.total_items = total_items;
                self.completed_count = 0;
                self.failed_count = 0;
                self.bytes_so_far = 0;
                self.bytes_total = 0;
            }
            ProgressUpdate::ItemStarted { name } => {
                self.current_item_name = name;
            }
            ProgressUpdate::BytesProgress { bytes_so_far, bytes_total } => {
                self.bytes_so_far = bytes_so_far;
                self.bytes_total = bytes_total;
            }
            ProgressUpdate::ItemCompleted { status, .. } => match status {
                engine::model::ItemStatus::Completed | engine::model::ItemStatus::Skipped => {
                    self.completed_count += 1;
                }
                engine::model::ItemStatus::Failed => {
                    self.failed_count += 1;
                }
                _ => {}
            },
            ProgressUpdate::JobCompleted => {}
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
