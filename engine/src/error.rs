//! Error types for the migration engine.
//!
//! `EngineError` carries the job- and operation-level error kinds from the
//! design's error taxonomy (`UserError`, transport/integrity/snapshot
//! failures, cancellation, and invariant violations), plus the original
//! filesystem-error variants the tree-copy code relies on. File-level and
//! item-level errors are recorded on the `MigrationItem`/`FileItem`
//! themselves, not raised as `EngineError` — only job-aborting conditions
//! reach this type.

use std::error::Error;
use std::fmt::{self, Display};
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum EngineError {
    /// Bad configuration reachable before any side effect.
    UserError { message: String },

    /// Source directory does not exist
    SourceNotFound { path: PathBuf },

    /// Source directory is not accessible (permissions)
    SourceAccessDenied { path: PathBuf, source: io::Error },

    /// Destination is not accessible
    DestinationAccessDenied { path: PathBuf, source: io::Error },

    /// Failed to read from source file
    ReadError { path: PathBuf, source: io::Error },

    /// Failed to write to destination file
    WriteError { path: PathBuf, source: io::Error },

    /// Path exceeds Windows limits or is invalid
    PathTooLong { path: PathBuf },

    /// Path contains invalid characters
    InvalidPath { path: PathBuf, reason: String },

    /// Failed to enumerate source directory
    EnumerationFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// Failure of a single file send/receive over a transport carrier;
    /// the caller records this against the file and continues the
    /// manifest rather than aborting.
    TransportIo { relative_path: String, message: String },

    /// Handshake failure, protocol violation, or carrier-level loss of
    /// connection; aborts the whole session.
    TransportFatal { message: String },

    /// The agent handshake's shared key did not match, or the peer
    /// rejected the handshake outright.
    Unauthorized { reason: String },

    /// Checksum mismatch on reassemble or verify.
    IntegrityViolation { path: PathBuf, expected: String, actual: String },

    /// The OS refused to create a live snapshot.
    SnapshotRefused { volume: String, message: String },

    /// The source volume is BitLocker-locked; capture must fail fast.
    BitLockerLocked { volume: String },

    /// Cooperative cancellation; never retried.
    Cancelled,

    /// Invariant violation — should never happen in correct code.
    Bug { message: String },

    /// Catch-all for unexpected errors
    Unknown { message: String },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserError { message } => write!(f, "{}", message),
            Self::SourceNotFound { path } => {
                write!(f, "Source directory not found: {}", path.display())
            }
            Self::SourceAccessDenied { path, .. } => {
                write!(f, "Source directory access denied: {}", path.display())
            }
            Self::DestinationAccessDenied { path, .. } => {
                write!(f, "Destination directory access denied: {}", path.display())
            }
            Self::ReadError { path, .. } => {
                write!(f, "Failed to read file: {}", path.display())
            }
            Self::WriteError { path, .. } => {
                write!(f, "Failed to write file: {}", path.display())
            }
            Self::PathTooLong { path } => {
                write!(f, "Path exceeds maximum length: {}", path.display())
            }
            Self::InvalidPath { path, reason } => {
                write!(f, "Invalid path: {} ({})", path.display(), reason)
            }
            Self::EnumerationFailed { path, .. } => {
                write!(f, "Failed to enumerate directory: {}", path.display())
            }
            Self::DirectoryCreationFailed { path, .. } => {
                write!(f, "Failed to create directory: {}", path.display())
            }
            Self::TransportIo { relative_path, message } => {
                write!(f, "Transport I/O error on {}: {}", relative_path, message)
            }
            Self::TransportFatal { message } => write!(f, "Transport failure: {}", message),
            Self::Unauthorized { reason } => write!(f, "Unauthorized: {}", reason),
            Self::IntegrityViolation { path, expected, actual } => write!(
                f,
                "Checksum mismatch for {}: expected {}, got {}",
                path.display(),
                expected,
                actual
            ),
            Self::SnapshotRefused { volume, message } => {
                write!(f, "Snapshot refused for volume {}: {}", volume, message)
            }
            Self::BitLockerLocked { volume } => write!(
                f,
                "Volume {} is BitLocker-locked; unlock it before capture",
                volume
            ),
            Self::Cancelled => write!(f, "Operation cancelled"),
            Self::Bug { message } => write!(f, "Internal invariant violation: {}", message),
            Self::Unknown { message } => write!(f, "Engine error: {}", message),
        }
    }
}

impl Error for EngineError {}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<u32> {
        match self {
            Self::SourceAccessDenied { source, .. }
            | Self::DestinationAccessDenied { source, .. }
            | Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::EnumerationFailed { source, .. }
            | Self::DirectoryCreationFailed { source, .. } => {
                source.raw_os_error().map(|e| e as u32)
            }
            _ => None,
        }
    }

    /// `true` for errors that should abort the whole session/job rather
    /// than being recorded against a single item and continuing.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TransportFatal { .. }
                | Self::Unauthorized { .. }
                | Self::BitLockerLocked { .. }
                | Self::Bug { .. }
                | Self::Cancelled
        )
    }
}

impl From<io::Error> for EngineError {
    fn from(err: io::Error) -> Self {
        EngineError::Unknown {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Unknown {
            message: format!("JSON error: {}", err),
        }
    }
}
