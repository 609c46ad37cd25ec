//! Direct-TCP carrier: a client/server pair exchanging length-prefixed,
//! JSON-framed payloads. Synchronous (`std::net::TcpStream`) so it can
//! implement the blocking [`Transport`] contract directly; the async
//! UDP discovery side lives in [`super::discovery`] and async framing
//! is used only by the standalone agent binary's own event loop.
//!
//! Frame shape: 4-byte big-endian length, JSON metadata header, payload
//! bytes, 4-byte big-endian trailer length, trailing JSON ack frame.

use super::{ReceivedPayload, Transport, TransportError, TransportErrorKind};
use crate::model::TransferMetadata;
use crate::progress::ProgressCallback;
use crate::throttle::{self, CancellationToken};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AckFrame {
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

fn io_err(message: impl Into<String>) -> TransportError {
    TransportError { kind: TransportErrorKind::IoFailure, message: message.into() }
}

fn protocol_err(message: impl Into<String>) -> TransportError {
    TransportError { kind: TransportErrorKind::ProtocolViolation, message: message.into() }
}

/// Writes the metadata header and payload as two independent
/// length-prefixed frames: `u32 len | header bytes`, then
/// `u32 len | payload bytes`.
fn write_frame(stream: &mut TcpStream, header: &[u8], payload: &[u8]) -> Result<(), TransportError> {
    stream.write_all(&(header.len() as u32).to_be_bytes()).map_err(|e| io_err(e.to_string()))?;
    stream.write_all(header).map_err(|e| io_err(e.to_string()))?;
    stream.write_all(&(payload.len() as u32).to_be_bytes()).map_err(|e| io_err(e.to_string()))?;
    stream.write_all(payload).map_err(|e| io_err(e.to_string()))?;
    Ok(())
}

fn read_length_prefixed(stream: &mut TcpStream) -> Result<Vec<u8>, TransportError> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).map_err(|e| io_err(e.to_string()))?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > 1024 * 1024 * 1024 {
        return Err(protocol_err(format!("declared frame length {} exceeds sanity limit", len)));
    }
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).map_err(|e| io_err(e.to_string()))?;
    Ok(buf)
}

fn write_ack(stream: &mut TcpStream, ack: &AckFrame) -> Result<(), TransportError> {
    let json = serde_json::to_vec(ack).map_err(|e| protocol_err(e.to_string()))?;
    stream.write_all(&(json.len() as u32).to_be_bytes()).map_err(|e| io_err(e.to_string()))?;
    stream.write_all(&json).map_err(|e| io_err(e.to_string()))?;
    Ok(())
}

fn read_ack(stream: &mut TcpStream) -> Result<AckFrame, TransportError> {
    let bytes = read_length_prefixed(stream)?;
    serde_json::from_slice(&bytes).map_err(|e| protocol_err(format!("malformed ack frame: {}", e)))
}

/// A connected direct-TCP endpoint — either accepted by [`listen`] or
/// opened by [`connect`].
pub struct DirectTcpCarrier {
    stream: TcpStream,
}

impl DirectTcpCarrier {
    /// Source-side: accept exactly one connection on `port`.
    pub fn listen(port: u16) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(("0.0.0.0", port)).map_err(|e| io_err(e.to_string()))?;
        let (stream, _addr) = listener.accept().map_err(|e| io_err(e.to_string()))?;
        Ok(DirectTcpCarrier { stream })
    }

    /// Destination-side: connect to an explicit or discovered peer
    /// address.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).map_err(|e| io_err(e.to_string()))?;
        Ok(DirectTcpCarrier { stream })
    }

    /// Wrap an already-connected stream — used by the agent protocol,
    /// which needs the raw stream for its handshake frame before a
    /// carrier takes over for the manifest and file frames.
    pub fn from_stream(stream: TcpStream) -> Self {
        DirectTcpCarrier { stream }
    }
}

impl Transport for DirectTcpCarrier {
    fn send(
        &mut self,
        stream: &mut dyn Read,
        metadata: &TransferMetadata,
        cancellation: &CancellationToken,
        progress: &dyn ProgressCallback,
    ) -> Result<(), TransportError> {
        let mut buffer = Vec::new();
        throttle::throttled_copy(stream, &mut buffer, metadata.size_bytes, None, cancellation, progress).map_err(|e| {
            if matches!(e, crate::error::EngineError::Cancelled) {
                TransportError { kind: TransportErrorKind::Cancelled, message: "send cancelled".to_string() }
            } else {
                io_err(e.to_string())
            }
        })?;

        let header = serde_json::to_vec(metadata).map_err(|e| protocol_err(e.to_string()))?;
        write_frame(&mut self.stream, &header, &buffer)?;

        let ack = read_ack(&mut self.stream)?;
        if !ack.accepted {
            return Err(io_err(ack.reason.unwrap_or_else(|| "peer rejected frame".to_string())));
        }
        Ok(())
    }

    fn receive(
        &mut self,
        _metadata_hint: Option<&TransferMetadata>,
        cancellation: &CancellationToken,
        progress: &dyn ProgressCallback,
    ) -> Result<ReceivedPayload, TransportError> {
        let header_bytes = read_length_prefixed(&mut self.stream)?;
        let metadata: TransferMetadata =
            serde_json::from_slice(&header_bytes).map_err(|e| protocol_err(format!("malformed metadata header: {}", e)))?;

        let payload_bytes = read_length_prefixed(&mut self.stream)?;
        if payload_bytes.len() as u64 != metadata.size_bytes {
            write_ack(&mut self.stream, &AckFrame { accepted: false, reason: Some("size mismatch".to_string()) })?;
            return Err(protocol_err("payload length did not match declared metadata size"));
        }

        let mut sink = Vec::new();
        throttle::throttled_copy(payload_bytes.as_slice(), &mut sink, metadata.size_bytes, None, cancellation, progress)
            .map_err(|e| io_err(e.to_string()))?;

        write_ack(&mut self.stream, &AckFrame { accepted: true, reason: None })?;
        Ok(ReceivedPayload::new(metadata, sink))
    }

    fn test_connection(&mut self) -> bool {
        self.stream.peer_addr().is_ok()
    }
}
