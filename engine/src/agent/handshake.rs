//! Shared-key handshake exchanged once per agent session, before any
//! manifest or file frame crosses the wire.

use super::wire;
use crate::error::EngineError;
use crate::model::{AgentHandshake, AgentHandshakeResponse, AgentRole};
use std::net::TcpStream;

/// Source side: receive the destination's handshake and accept or
/// reject it against `expected_shared_key`. Always writes a response,
/// even on rejection, so the destination gets a reason. A rejection
/// here ends this connection's session with `TransportFatal` rather
/// than `Unauthorized` — `Unauthorized` is what the *rejected* side
/// observes; the source just failed to establish this connection and,
/// in service mode, moves on to accept the next one.
pub fn authenticate_incoming(stream: &mut TcpStream, expected_shared_key: &str, our_hostname: &str) -> Result<AgentHandshake, EngineError> {
    let handshake: AgentHandshake = wire::read_json(stream)?;

    if handshake.shared_key != expected_shared_key {
        let response = AgentHandshakeResponse {
            accepted: false,
            rejection_reason: Some("shared key mismatch".to_string()),
            destination_hostname: our_hostname.to_string(),
        };
        wire::write_json(stream, &response)?;
        return Err(EngineError::TransportFatal { message: "rejected peer handshake: shared key mismatch".to_string() });
    }

    let response = AgentHandshakeResponse { accepted: true, rejection_reason: None, destination_hostname: our_hostname.to_string() };
    wire::write_json(stream, &response)?;
    Ok(handshake)
}

/// Destination side: send our handshake and wait for the source's
/// response. Raises `Unauthorized` on rejection.
pub fn authenticate_outgoing(stream: &mut TcpStream, shared_key: &str, our_hostname: &str) -> Result<AgentHandshakeResponse, EngineError> {
    let handshake = AgentHandshake { role: AgentRole::Destination, shared_key: shared_key.to_string(), advertised_hostname: our_hostname.to_string() };
    wire::write_json(stream, &handshake)?;

    let response: AgentHandshakeResponse = wire::read_json(stream)?;
    if !response.accepted {
        return Err(EngineError::Unauthorized { reason: response.rejection_reason.unwrap_or_else(|| "rejected".to_string()) });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn matching_shared_key_is_accepted() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            authenticate_incoming(&mut stream, "alpha", "SOURCE-HOST")
        });

        let mut client = TcpStream::connect(addr).unwrap();
        let response = authenticate_outgoing(&mut client, "alpha", "DEST-HOST").unwrap();
        assert!(response.accepted);
        assert_eq!(response.destination_hostname, "SOURCE-HOST");

        let handshake = server.join().unwrap().unwrap();
        assert_eq!(handshake.advertised_hostname, "DEST-HOST");
    }

    #[test]
    fn mismatched_shared_key_is_rejected_on_both_sides() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            authenticate_incoming(&mut stream, "alpha", "SOURCE-HOST")
        });

        let mut client = TcpStream::connect(addr).unwrap();
        let client_result = authenticate_outgoing(&mut client, "beta", "DEST-HOST");
        assert!(matches!(client_result, Err(EngineError::Unauthorized { .. })));

        let server_result = server.join().unwrap();
        assert!(matches!(server_result, Err(EngineError::TransportFatal { .. })));
    }
}
