use crossbeam_channel::Sender;
use engine::model::{ItemStatus, MigrationItem, MigrationJob};
use engine::progress::{ProgressCallback, StatusCallback};

#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    JobStarted { total_items: usize },
    ItemStarted { name: String },
    BytesProgress { bytes_so_far: u64, bytes_total: u64 },
    ItemCompleted { name: String, status: ItemStatus, message: Option<String> },
    JobCompleted,
}

/// A `ProgressCallback` + `StatusCallback` implementation that forwards
/// every event to the GUI thread via a channel instead of touching
/// widget state directly from the worker thread.
pub struct GuiStatus {
    sender: Sender<ProgressUpdate>,
}

impl GuiStatus {
    pub fn new(sender: Sender<ProgressUpdate>) -> Self {
        GuiStatus { sender }
    }
}

impl ProgressCallback for GuiStatus {
    fn on_progress(&self, bytes_so_far: u64, bytes_total: u64) {
        let _ = self.sender.send(ProgressUpdate::BytesProgress { bytes_so_far, bytes_total });
    }
}

impl StatusCallback for GuiStatus {
    fn on_job_started(&self, job: &MigrationJob) {
        let total_items = job.items.iter().filter(|i| i.is_selected).count();
        let _ = self.sender.send(ProgressUpdate::JobStarted { total_items });
    }

    fn on_item_started(&self, item: &MigrationItem) {
        let _ = self.sender.send(ProgressUpdate::ItemStarted { name: item.display_name.clone() });
    }

    fn on_item_completed(&self, item: &MigrationItem) {
        let _ = self.sender.send(ProgressUpdate::ItemCompleted {
            name: item.display_name.clone(),
            status: item.status,
            message: item.status_message.clone(),
        });
    }

    fn on_job_completed(&self, _job: &MigrationJob) {
        let _ = self.sender.send(ProgressUpdate::JobCompleted);
    }
}
