//! Length-prefixed JSON framing for the agent protocol's control
//! messages (handshake request/response). File payloads themselves
//! travel over [`crate::transport::direct_tcp::DirectTcpCarrier`],
//! which frames them the same way; this module exists because the
//! handshake happens before a carrier is constructed.

use crate::error::EngineError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use std::net::TcpStream;

const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

pub fn write_json<T: Serialize>(stream: &mut TcpStream, value: &T) -> Result<(), EngineError> {
    let bytes = serde_json::to_vec(value)?;
    stream
        .write_all(&(bytes.len() as u32).to_be_bytes())
        .and_then(|_| stream.write_all(&bytes))
        .map_err(|e| EngineError::TransportFatal { message: e.to_string() })
}

pub fn read_json<T: DeserializeOwned>(stream: &mut TcpStream) -> Result<T, EngineError> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).map_err(|e| EngineError::TransportFatal { message: e.to_string() })?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(EngineError::TransportFatal { message: format!("declared frame length {} exceeds sanity limit", len) });
    }
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).map_err(|e| EngineError::TransportFatal { message: e.to_string() })?;
    serde_json::from_slice(&buf).map_err(|e| EngineError::TransportFatal { message: format!("malformed frame: {}", e) })
}
