//! Transport abstraction and the three concrete carriers.
//!
//! Every carrier implements the same [`Transport`] contract; the tier
//! migrators and the profile/settings migrator send and receive files
//! and manifests without knowing which carrier is underneath.

pub mod direct_tcp;
pub mod discovery;
pub mod local;
pub mod network_share;

use crate::model::{TransferMetadata, TransferManifest};
use crate::throttle::CancellationToken;
use std::io::{Cursor, Read};

/// Failure kind for a single transport operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    IoFailure,
    Cancelled,
    ProtocolViolation,
}

#[derive(Debug, Clone)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for crate::error::EngineError {
    fn from(err: TransportError) -> Self {
        match err.kind {
            TransportErrorKind::Cancelled => crate::error::EngineError::Cancelled,
            TransportErrorKind::ProtocolViolation => crate::error::EngineError::TransportFatal { message: err.message },
            TransportErrorKind::IoFailure => crate::error::EngineError::TransportIo {
                relative_path: String::new(),
                message: err.message,
            },
        }
    }
}

/// A payload received from a carrier: its authoritative metadata header
/// plus the bytes that followed it. Restartable from the start since
/// callers may need to re-read (e.g. to recompute a checksum).
pub struct ReceivedPayload {
    pub metadata: TransferMetadata,
    bytes: Vec<u8>,
}

impl ReceivedPayload {
    pub fn new(metadata: TransferMetadata, bytes: Vec<u8>) -> Self {
        ReceivedPayload { metadata, bytes }
    }

    pub fn reader(&self) -> impl Read + '_ {
        Cursor::new(&self.bytes)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Common contract every transport carrier implements (spec §4.2).
pub trait Transport {
    fn send(
        &mut self,
        stream: &mut dyn Read,
        metadata: &TransferMetadata,
        cancellation: &CancellationToken,
        progress: &dyn crate::progress::ProgressCallback,
    ) -> Result<(), TransportError>;

    fn receive(
        &mut self,
        metadata_hint: Option<&TransferMetadata>,
        cancellation: &CancellationToken,
        progress: &dyn crate::progress::ProgressCallback,
    ) -> Result<ReceivedPayload, TransportError>;

    fn send_manifest(&mut self, manifest: &TransferManifest, cancellation: &CancellationToken) -> Result<(), TransportError> {
        let json = serde_json::to_vec(manifest).map_err(|e| TransportError {
            kind: TransportErrorKind::ProtocolViolation,
            message: format!("failed to serialize manifest: {}", e),
        })?;
        let metadata = TransferMetadata::for_manifest(json.len() as u64);
        let mut cursor = Cursor::new(json);
        self.send(&mut cursor, &metadata, cancellation, &crate::progress::NullProgress)
    }

    fn receive_manifest(&mut self, cancellation: &CancellationToken) -> Result<TransferManifest, TransportError> {
        let payload = self.receive(None, cancellation, &crate::progress::NullProgress)?;
        if payload.metadata.relative_path != TransferMetadata::MANIFEST_SENTINEL {
            return Err(TransportError {
                kind: TransportErrorKind::ProtocolViolation,
                message: format!("expected manifest sentinel, got {}", payload.metadata.relative_path),
            });
        }
        serde_json::from_slice(&payload.into_bytes()).map_err(|e| TransportError {
            kind: TransportErrorKind::ProtocolViolation,
            message: format!("malformed manifest JSON: {}", e),
        })
    }

    /// Idempotent reachability probe. Returns `false` rather than
    /// raising when the peer is reachable but unhealthy.
    fn test_connection(&mut self) -> bool;
}
