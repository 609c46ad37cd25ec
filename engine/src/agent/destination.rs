//! Destination-side agent session: locates the source agent (either an
//! explicit address or UDP discovery), authenticates, receives the
//! manifest, then receives each file by count.

use super::handshake;
use crate::error::EngineError;
use crate::fs_ops::ensure_parent_dir_exists;
use crate::progress::{NullProgress, ProgressCallback, StatusCallback};
use crate::throttle::CancellationToken;
use crate::transport::direct_tcp::DirectTcpCarrier;
use crate::transport::discovery::discover_peers;
use crate::transport::Transport;
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one destination-side session.
pub struct DestinationConfig {
    pub peer_addr: Option<SocketAddr>,
    pub discovery_port: u16,
    pub shared_key: String,
    pub hostname: String,
    pub out_dir: PathBuf,
}

/// Resolve the peer to connect to: the explicit address if configured,
/// otherwise up to three UDP discovery attempts at one-second
/// intervals (spec §4.7).
fn resolve_peer(config: &DestinationConfig) -> Result<SocketAddr, EngineError> {
    if let Some(addr) = config.peer_addr {
        return Ok(addr);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| EngineError::TransportFatal { message: e.to_string() })?;

    runtime.block_on(async {
        for attempt in 0..3 {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            if let Ok(peers) = discover_peers(config.discovery_port, Duration::from_secs(1)).await {
                if let Some(peer) = peers.into_iter().next() {
                    return Ok(peer.addr);
                }
            }
        }
        Err(EngineError::TransportFatal { message: "no source agent discovered after 3 attempts".to_string() })
    })
}

/// Run exactly one destination session: connect, authenticate, receive
/// the manifest, then receive `manifest.items.len()` files by count,
/// writing each into `<out_dir>/<frame's own relative_path>` (the
/// authoritative path comes from each file's `TransferMetadata`, the
/// same way every other carrier reports it — the manifest count only
/// tells this loop how many frames to expect).
pub fn run_session(
    config: &DestinationConfig,
    cancellation: &CancellationToken,
    progress: &dyn ProgressCallback,
    status: &dyn StatusCallback,
) -> Result<(), EngineError> {
    let peer_addr = resolve_peer(config)?;
    let mut stream = TcpStream::connect(peer_addr).map_err(|e| EngineError::TransportFatal { message: e.to_string() })?;

    handshake::authenticate_outgoing(&mut stream, &config.shared_key, &config.hostname)?;

    let mut carrier = DirectTcpCarrier::from_stream(stream);
    let manifest = carrier.receive_manifest(cancellation)?;

    let mut bytes_so_far = 0u64;
    let total_bytes = manifest.total_estimated_bytes;

    for mut item in manifest.items.iter().cloned() {
        if cancellation.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        item.status = crate::model::ItemStatus::InProgress;
        status.on_item_started(&item);

        let receive_result = carrier.receive(None, cancellation, &NullProgress);
        match receive_result {
            Ok(payload) => {
                let destination_path = config.out_dir.join(&payload.metadata.relative_path);
                ensure_parent_dir_exists(&destination_path)?;
                let write_result = std::fs::write(&destination_path, payload.into_bytes())
                    .map_err(|e| EngineError::WriteError { path: destination_path.clone(), source: e });

                match write_result {
                    Ok(()) => {
                        bytes_so_far += item.estimated_size_bytes;
                        progress.on_progress(bytes_so_far, total_bytes);
                        item.status = crate::model::ItemStatus::Completed;
                        status.on_item_completed(&item);
                    }
                    Err(e) => {
                        item.status = crate::model::ItemStatus::Failed;
                        item.status_message = Some(e.to_string());
                        status.on_item_completed(&item);
                        tracing::warn!(file = %item.display_name, error = %e, "failed to write received file; continuing");
                    }
                }
            }
            Err(e) => {
                let engine_err: EngineError = e.into();
                if engine_err.is_fatal() {
                    return Err(engine_err);
                }
                item.status = crate::model::ItemStatus::Failed;
                item.status_message = Some(engine_err.to_string());
                status.on_item_completed(&item);
                tracing::warn!(file = %item.display_name, error = %engine_err, "file-level receive failure; continuing to next file");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::source::SourceConfig;
    use crate::progress::{NullProgress, NullStatus};
    use std::fs;
    use std::thread;

    #[test]
    fn full_session_transfers_files_with_matching_shared_key() {
        let src_dir = tempfile::tempdir().unwrap();
        fs::write(src_dir.path().join("a.txt"), b"hello").unwrap();
        fs::create_dir(src_dir.path().join("sub")).unwrap();
        fs::write(src_dir.path().join("sub/b.txt"), b"world").unwrap();

        let dst_dir = tempfile::tempdir().unwrap();

        let source_config = SourceConfig {
            tcp_port: 58401,
            discovery_port: 58402,
            shared_key: "alpha".to_string(),
            hostname: "SRC".to_string(),
            root_dir: src_dir.path().to_path_buf(),
        };
        let source_handle = thread::spawn(move || {
            let token = CancellationToken::new();
            crate::agent::source::run_session(&source_config, &token, &NullProgress, &NullStatus)
        });

        thread::sleep(std::time::Duration::from_millis(100));

        let destination_config = DestinationConfig {
            peer_addr: Some("127.0.0.1:58401".parse().unwrap()),
            discovery_port: 58402,
            shared_key: "alpha".to_string(),
            hostname: "DST".to_string(),
            out_dir: dst_dir.path().to_path_buf(),
        };
        let token = CancellationToken::new();
        run_session(&destination_config, &token, &NullProgress, &NullStatus).unwrap();

        source_handle.join().unwrap().unwrap();

        assert_eq!(fs::read_to_string(dst_dir.path().join("a.txt")).unwrap(), "hello");
        assert_eq!(fs::read_to_string(dst_dir.path().join("sub/b.txt")).unwrap(), "world");
    }

    #[test]
    fn mismatched_shared_key_aborts_destination_with_unauthorized() {
        let src_dir = tempfile::tempdir().unwrap();
        fs::write(src_dir.path().join("a.txt"), b"hello").unwrap();
        let dst_dir = tempfile::tempdir().unwrap();

        let source_config = SourceConfig {
            tcp_port: 58403,
            discovery_port: 58404,
            shared_key: "alpha".to_string(),
            hostname: "SRC".to_string(),
            root_dir: src_dir.path().to_path_buf(),
        };
        let source_handle = thread::spawn(move || {
            let token = CancellationToken::new();
            crate::agent::source::run_session(&source_config, &token, &NullProgress, &NullStatus)
        });

        thread::sleep(std::time::Duration::from_millis(100));

        let destination_config = DestinationConfig {
            peer_addr: Some("127.0.0.1:58403".parse().unwrap()),
            discovery_port: 58404,
            shared_key: "beta".to_string(),
            hostname: "DST".to_string(),
            out_dir: dst_dir.path().to_path_buf(),
        };
        let token = CancellationToken::new();
        let result = run_session(&destination_config, &token, &NullProgress, &NullStatus);
        assert!(matches!(result, Err(EngineError::Unauthorized { .. })));

        let source_result = source_handle.join().unwrap();
        assert!(source_result.is_err());
    }
}
