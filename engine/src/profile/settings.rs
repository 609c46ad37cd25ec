//! System-setting replay: applies each discovered system setting to
//! the destination using its category-specific replay strategy.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// Per-setting replay state machine: Queued → Replaying →
/// {Applied, Failed, Skipped (already present and content-equal)}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettingStatus {
    Queued,
    Replaying,
    Applied,
    Failed,
    Skipped,
}

/// The category of a discovered system setting, each replayed through
/// a different mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettingCategory {
    WifiProfile,
    Printer,
    MappedDrive,
    EnvironmentVariable,
    ScheduledTask,
    Credential,
    Certificate,
    DefaultAppAssociation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSetting {
    pub category: SettingCategory,
    pub name: String,
    pub payload: String,
    pub status: SettingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

/// Returns `true` if `existing` already matches `setting`'s payload —
/// the setting should be marked `Skipped` rather than replayed again.
pub fn already_present_and_equal(setting: &SystemSetting, existing: Option<&str>) -> bool {
    existing.map(|e| e == setting.payload).unwrap_or(false)
}

/// Apply one setting's category-specific replay. `apply_fn` is the
/// platform hook that actually performs the OS-level action; this
/// function owns only the state-machine transition around it.
pub fn replay_setting(
    setting: &mut SystemSetting,
    existing: Option<&str>,
    apply_fn: impl FnOnce(&SystemSetting) -> Result<(), EngineError>,
) {
    if already_present_and_equal(setting, existing) {
        setting.status = SettingStatus::Skipped;
        return;
    }

    setting.status = SettingStatus::Replaying;
    match apply_fn(setting) {
        Ok(()) => setting.status = SettingStatus::Applied,
        Err(e) => {
            setting.status = SettingStatus::Failed;
            setting.status_message = Some(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_setting() -> SystemSetting {
        SystemSetting {
            category: SettingCategory::EnvironmentVariable,
            name: "JAVA_HOME".to_string(),
            payload: "C:\\Program Files\\Java\\jdk-17".to_string(),
            status: SettingStatus::Queued,
            status_message: None,
        }
    }

    #[test]
    fn replay_skips_when_already_equal() {
        let mut setting = sample_setting();
        replay_setting(&mut setting, Some("C:\\Program Files\\Java\\jdk-17"), |_| Ok(()));
        assert_eq!(setting.status, SettingStatus::Skipped);
    }

    #[test]
    fn replay_applies_when_absent_or_different() {
        let mut setting = sample_setting();
        replay_setting(&mut setting, None, |_| Ok(()));
        assert_eq!(setting.status, SettingStatus::Applied);
    }

    #[test]
    fn replay_records_failure_message() {
        let mut setting = sample_setting();
        replay_setting(&mut setting, None, |_| Err(EngineError::UserError { message: "denied".to_string() }));
        assert_eq!(setting.status, SettingStatus::Failed);
        assert_eq!(setting.status_message.as_deref(), Some("denied"));
    }
}
