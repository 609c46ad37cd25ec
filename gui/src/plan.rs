//! The technician-authored input to a capture run, mirroring the CLI's
//! own `CapturePlan` — everything about a `MigrationJob` except the
//! lifecycle fields the binary fills in itself.

use engine::model::{JobStatus, MigrationItem, MigrationJob, TransportKind, UserMapping};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePlan {
    pub source_hostname: String,
    pub source_os: String,
    pub destination_hostname: String,
    pub destination_os: String,
    #[serde(default = "default_transport")]
    pub transport: TransportKind,
    #[serde(default)]
    pub profile_name: Option<String>,
    #[serde(default)]
    pub user_mappings: Vec<UserMapping>,
    pub items: Vec<MigrationItem>,
}

fn default_transport() -> TransportKind {
    TransportKind::LocalRemovable
}

impl CapturePlan {
    pub fn into_job(self) -> MigrationJob {
        MigrationJob {
            id: uuid::Uuid::new_v4().to_string(),
            created_utc: chrono::Utc::now(),
            started_utc: None,
            completed_utc: None,
            status: JobStatus::Pending,
            source_hostname: self.source_hostname,
            source_os: self.source_os,
            destination_hostname: self.destination_hostname,
            destination_os: self.destination_os,
            transport: self.transport,
            profile_name: self.profile_name,
            user_mappings: self.user_mappings,
            items: self.items,
        }
    }
}
