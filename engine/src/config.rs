//! Engine-wide configuration, loaded from a TOML file.
//!
//! Mirrors the config pattern of a simple `serde` + `toml` struct with a
//! default path resolved through `dirs`, falling back to built-in
//! defaults when no file is present — the technician never has to hand-
//! author a config before a first run.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default FAT32-safe split threshold: 4 GiB minus 4 KiB, leaving
/// headroom under the FAT32 4 GiB file-size ceiling.
pub const DEFAULT_SPLIT_THRESHOLD_BYTES: u64 = 4 * 1024 * 1024 * 1024 - 4 * 1024;

const DEFAULT_DISCOVERY_PORT: u16 = 47321;
const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 1;
const DEFAULT_DISCOVERY_ATTEMPTS: u32 = 3;
const DEFAULT_TCP_PORT: u16 = 47322;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationConfig {
    /// Image files larger than this are split into numbered parts.
    #[serde(default = "default_split_threshold")]
    pub split_threshold_bytes: u64,

    /// Bandwidth cap for throttled copies, in bytes/sec; `None` means
    /// unthrottled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_cap_bytes_per_sec: Option<u64>,

    /// UDP port the discovery responder listens on and the destination
    /// broadcasts to.
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,

    /// Seconds between discovery attempts on the destination side.
    #[serde(default = "default_discovery_timeout_secs")]
    pub discovery_timeout_secs: u64,

    /// Number of discovery attempts before falling back to explicit
    /// peer configuration.
    #[serde(default = "default_discovery_attempts")]
    pub discovery_attempts: u32,

    /// TCP port the direct-TCP carrier listens on / connects to.
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,

    /// Whether newly created transfers compress payloads by default.
    #[serde(default = "default_true")]
    pub compress_by_default: bool,

    /// Whether browser saved-password stores may be captured at all.
    /// Per-mapping `UserMapping.allow_password_capture` still gates each
    /// individual profile even when this is `true`.
    #[serde(default)]
    pub allow_password_capture: bool,
}

fn default_split_threshold() -> u64 {
    DEFAULT_SPLIT_THRESHOLD_BYTES
}

fn default_discovery_port() -> u16 {
    DEFAULT_DISCOVERY_PORT
}

fn default_discovery_timeout_secs() -> u64 {
    DEFAULT_DISCOVERY_TIMEOUT_SECS
}

fn default_discovery_attempts() -> u32 {
    DEFAULT_DISCOVERY_ATTEMPTS
}

fn default_tcp_port() -> u16 {
    DEFAULT_TCP_PORT
}

fn default_true() -> bool {
    true
}

impl Default for MigrationConfig {
    fn default() -> Self {
        MigrationConfig {
            split_threshold_bytes: default_split_threshold(),
            bandwidth_cap_bytes_per_sec: None,
            discovery_port: default_discovery_port(),
            discovery_timeout_secs: default_discovery_timeout_secs(),
            discovery_attempts: default_discovery_attempts(),
            tcp_port: default_tcp_port(),
            compress_by_default: true,
            allow_password_capture: false,
        }
    }
}

impl MigrationConfig {
    /// Default config file location: `<config dir>/zim/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|base| base.join("zim").join("config.toml"))
    }

    /// Load from `path` if it exists, else return built-in defaults.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            return Ok(MigrationConfig::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&text).map_err(|e| EngineError::UserError {
            message: format!("invalid config at {}: {}", path.display(), e),
        })
    }

    /// Load from [`Self::default_path`], or fall back to defaults when
    /// no config directory can be resolved or no file exists there.
    pub fn load_default() -> Result<Self, EngineError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(MigrationConfig::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| EngineError::UserError {
            message: format!("failed to serialize config: {}", e),
        })?;
        std::fs::write(path, text).map_err(|e| EngineError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = MigrationConfig::load(&path).unwrap();
        assert_eq!(config.split_threshold_bytes, DEFAULT_SPLIT_THRESHOLD_BYTES);
        assert!(!config.allow_password_capture);
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = MigrationConfig::default();
        config.bandwidth_cap_bytes_per_sec = Some(10_000_000);
        config.allow_password_capture = true;
        config.save(&path).unwrap();

        let loaded = MigrationConfig::load(&path).unwrap();
        assert_eq!(loaded.bandwidth_cap_bytes_per_sec, Some(10_000_000));
        assert!(loaded.allow_password_capture);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "discoveryPort = 9999\n").unwrap();
        let config = MigrationConfig::load(&path).unwrap();
        assert_eq!(config.discovery_port, 9999);
        assert_eq!(config.split_threshold_bytes, DEFAULT_SPLIT_THRESHOLD_BYTES);
    }
}
