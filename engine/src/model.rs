//! Core data model for the migration engine.
//!
//! This module defines the entities described by the data model: the
//! migration job and its items, discovery records, user mappings, the
//! transfer manifest and its wire-level metadata, disk image metadata,
//! and progress snapshots. Every persisted or wire-transmitted record
//! derives `Serialize`/`Deserialize` with camelCase field names so that
//! JSON shapes match across the whole engine without each module
//! hand-rolling its own encoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Overall status of a migration job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    PartialSuccess,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::PartialSuccess
        )
    }
}

/// One of the three capture/restore strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tier {
    Package,
    RegistryFile,
    FullClone,
}

/// The kind of thing a migration item represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemType {
    Application,
    UserProfile,
    SystemSetting,
    BrowserData,
    FileGroup,
}

/// Per-item lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed | ItemStatus::Skipped)
    }
}

/// A single unit of work inside a migration job.
///
/// `effective_tier` is derived, never stored independently: it is
/// `override_tier` when present, otherwise `recommended_tier`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationItem {
    pub id: Uuid,
    pub display_name: String,
    pub item_type: ItemType,
    pub recommended_tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_tier: Option<Tier>,
    pub is_selected: bool,
    pub estimated_size_bytes: u64,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Opaque back-reference into the discovery result that produced this
    /// item (e.g. an index or id into a `Vec<DiscoveredApplication>`).
    /// Never dereferenced by the coordinator itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
}

impl MigrationItem {
    pub fn effective_tier(&self) -> Tier {
        self.override_tier.unwrap_or(self.recommended_tier)
    }
}

/// Identifiers for a package manager that can install an application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageIdentifiers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winget: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chocolatey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brew_cask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snap: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flatpak: Option<String>,
}

impl PackageIdentifiers {
    pub fn has_any(&self) -> bool {
        self.winget.is_some()
            || self.chocolatey.is_some()
            || self.brew_cask.is_some()
            || self.apt.is_some()
            || self.snap.is_some()
            || self.flatpak.is_some()
    }
}

/// A discovered application on the source machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredApplication {
    pub name: String,
    pub version: String,
    pub publisher: String,
    pub install_path: PathBuf,
    pub uninstall_command: String,
    pub registry_origin_key: String,
    pub is_32_bit: bool,
    pub is_per_user: bool,
    pub package_ids: PackageIdentifiers,
    pub estimated_size_bytes: u64,
    pub app_data_paths: Vec<PathBuf>,
    pub extra_registry_paths: Vec<String>,
}

impl DiscoveredApplication {
    /// `recommended_tier == Package` iff at least one package identifier
    /// is present; otherwise `RegistryFile`.
    pub fn recommended_tier(&self) -> Tier {
        if self.package_ids.has_any() {
            Tier::Package
        } else {
            Tier::RegistryFile
        }
    }
}

/// The kind of Windows account a profile belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountType {
    Local,
    ActiveDirectory,
    AzureAd,
    MicrosoftAccount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserProfile {
    pub browser: String,
    pub profile_path: PathBuf,
    pub profile_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailClientData {
    pub client: String,
    pub data_path: PathBuf,
}

/// A discovered user profile on the source machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    pub sid: String,
    pub profile_path: PathBuf,
    pub is_domain: bool,
    pub account_type: AccountType,
    pub known_folders: std::collections::BTreeMap<String, PathBuf>,
    pub browser_profiles: Vec<BrowserProfile>,
    pub email_data: Vec<EmailClientData>,
    pub estimated_size_bytes: u64,
}

/// Mapping of a source user onto a destination account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMapping {
    pub source: UserProfile,
    pub destination_username: String,
    pub destination_profile_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_sid: Option<String>,
    pub create_if_missing: bool,
    /// Transient password used only to create a missing destination
    /// account; never persisted to disk by the core.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_account_password: Option<String>,
    /// Per-mapping consent gate for capturing a browser's saved-password
    /// store. Defaults to `false`; see the Open Question resolution in
    /// SPEC_FULL.md §3.
    pub allow_password_capture: bool,
}

impl UserMapping {
    /// Case-insensitive comparison of source and destination profile
    /// paths; `true` means path rewriting must run for this mapping.
    pub fn requires_path_remapping(&self) -> bool {
        let src = self.source.profile_path.to_string_lossy().to_lowercase();
        let dst = self.destination_profile_path.to_string_lossy().to_lowercase();
        src != dst
    }
}

/// Transport carrier kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransportKind {
    LocalRemovable,
    NetworkShare,
    DirectTcp,
}

/// A package the destination must install before overlaying captured
/// per-user state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInstallEntry {
    pub name: String,
    pub manager: String,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// The index record describing an entire transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferManifest {
    pub manifest_id: Uuid,
    pub created_utc: DateTime<Utc>,
    pub source_hostname: String,
    pub source_os_version: String,
    pub transport_method: TransportKind,
    pub user_mappings: Vec<UserMapping>,
    pub items: Vec<MigrationItem>,
    pub package_installs: Vec<PackageInstallEntry>,
    pub total_estimated_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_checksum: Option<String>,
}

impl TransferManifest {
    /// Recompute `total_estimated_bytes` from the selected items.
    pub fn recompute_total(&mut self) {
        self.total_estimated_bytes = self
            .items
            .iter()
            .filter(|i| i.is_selected)
            .map(|i| i.estimated_size_bytes)
            .sum();
    }
}

/// Per-file metadata accompanying a single frame on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMetadata {
    pub relative_path: String,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub is_compressed: bool,
    pub is_encrypted: bool,
}

impl TransferMetadata {
    /// The sentinel relative path used for the manifest frame itself.
    pub const MANIFEST_SENTINEL: &'static str = "MANIFEST";

    pub fn for_manifest(size_bytes: u64) -> Self {
        TransferMetadata {
            relative_path: Self::MANIFEST_SENTINEL.to_string(),
            size_bytes,
            content_hash: None,
            chunk_index: 0,
            total_chunks: 1,
            is_compressed: false,
            is_encrypted: false,
        }
    }
}

/// On-disk image container shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Img,
    Raw,
    Vhdx,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Img => "img",
            ImageFormat::Raw => "raw",
            ImageFormat::Vhdx => "vhdx",
        }
    }
}

/// BitLocker protection status as observed by the cloner's gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BitLockerStatus {
    Locked,
    Unlocked,
    Suspended,
    NotProtected,
}

/// Sidecar metadata for a captured disk image, persisted as
/// `<stem>.zim-meta.json` next to the image file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskImageMetadata {
    pub source_hostname: String,
    pub source_os_version: String,
    pub source_volume: String,
    pub source_volume_size_bytes: u64,
    pub source_volume_used_bytes: u64,
    pub image_size_bytes: u64,
    pub format: ImageFormat,
    pub is_compressed: bool,
    pub checksum: String,
    pub is_split: bool,
    pub chunk_count: u32,
    pub chunk_size_bytes: u64,
    pub chunk_checksums: Vec<String>,
    pub file_system_type: String,
    pub used_vss: bool,
    pub source_was_bit_locker_encrypted: bool,
    pub source_bit_locker_status: BitLockerStatus,
    pub bit_locker_was_suspended: bool,
}

impl DiskImageMetadata {
    /// Invariant 2 (spec §8): `is_split == (chunk_count > 1) ==
    /// (chunk_checksums.len() == chunk_count)`.
    pub fn is_consistent(&self) -> bool {
        let split_matches_count = self.is_split == (self.chunk_count > 1);
        let checksums_match_count = self.chunk_checksums.len() as u32 == self.chunk_count;
        split_matches_count && checksums_match_count
    }
}

/// A point-in-time snapshot of transfer progress, recomputed by callers
/// from raw counters rather than stored as engine state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    pub current_item_name: String,
    pub current_item_index: usize,
    pub total_items: usize,
    pub current_item_bytes_transferred: u64,
    pub current_item_bytes_total: u64,
    pub overall_bytes_transferred: u64,
    pub overall_bytes_total: u64,
    pub bytes_per_second: f64,
    pub estimated_remaining_secs: Option<f64>,
}

impl TransferProgress {
    /// `overall_transferred / overall_total`, defined as 0 when the total
    /// is 0 (spec's `TransferProgress` derived fraction).
    pub fn overall_fraction(&self) -> f64 {
        if self.overall_bytes_total == 0 {
            0.0
        } else {
            self.overall_bytes_transferred as f64 / self.overall_bytes_total as f64
        }
    }
}

/// Role a peer plays during the agent handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentRole {
    Source,
    Destination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentHandshake {
    pub role: AgentRole,
    pub shared_key: String,
    pub advertised_hostname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentHandshakeResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub destination_hostname: String,
}

/// A migration job: the unit the coordinator creates, tracks, and
/// persists via `JobLogger`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationJob {
    pub id: String,
    pub created_utc: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_utc: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_utc: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub source_hostname: String,
    pub source_os: String,
    pub destination_hostname: String,
    pub destination_os: String,
    pub transport: TransportKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    pub user_mappings: Vec<UserMapping>,
    pub items: Vec<MigrationItem>,
}

impl MigrationJob {
    /// Invariant 6 (spec §8): on any exit path `status` is one of the
    /// terminal states and `completed_utc` is set.
    pub fn is_valid_terminal_state(&self) -> bool {
        self.status.is_terminal() == self.completed_utc.is_some()
    }

    /// Invariant: `started <= completed` whenever both are set.
    pub fn timestamps_ordered(&self) -> bool {
        match (self.started_utc, self.completed_utc) {
            (Some(s), Some(c)) => s <= c,
            _ => true,
        }
    }
}
