//! Source-side agent session: advertises itself over UDP discovery,
//! accepts one TCP connection, authenticates it, then streams every
//! file under a configured root directory to the peer.

use super::handshake;
use crate::checksums::{compute_file_checksum, ChecksumAlgorithm};
use crate::error::EngineError;
use crate::fs_ops::enumerate_tree;
use crate::model::{ItemStatus, ItemType, MigrationItem, Tier, TransferManifest, TransferMetadata, TransportKind};
use crate::progress::{NullProgress, ProgressCallback, StatusCallback};
use crate::throttle::CancellationToken;
use crate::transport::direct_tcp::DirectTcpCarrier;
use crate::transport::Transport;
use std::fs::File;
use std::net::TcpListener;
use std::path::{Path, PathBuf};

/// Configuration for one source-side session.
pub struct SourceConfig {
    pub tcp_port: u16,
    pub discovery_port: u16,
    pub shared_key: String,
    pub hostname: String,
    pub root_dir: PathBuf,
}

/// Best-effort UDP discovery responder running alongside the TCP
/// accept loop. Bind failure is logged and swallowed — discovery is a
/// convenience, not a requirement (spec §4.7: "best-effort; failure
/// non-fatal").
fn spawn_discovery_responder(config: &SourceConfig) -> (std::thread::JoinHandle<()>, tokio::sync::watch::Sender<bool>) {
    let (tx, rx) = tokio::sync::watch::channel(false);
    let discovery_port = config.discovery_port;
    let hostname = config.hostname.clone();
    let tcp_port = config.tcp_port;

    let handle = std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::warn!(error = %e, "failed to start discovery responder runtime");
                return;
            }
        };
        runtime.block_on(async move {
            if let Err(e) = crate::transport::discovery::run_responder(discovery_port, hostname, tcp_port, rx).await {
                tracing::warn!(error = %e, "discovery responder failed to bind; continuing without it");
            }
        });
    });

    (handle, tx)
}

fn relative_paths_sorted(root_dir: &Path) -> Result<Vec<(PathBuf, u64)>, EngineError> {
    let entries = enumerate_tree(root_dir, Path::new(""))?;
    let mut files: Vec<(PathBuf, u64)> =
        entries.into_iter().filter(|e| !e.is_dir).map(|e| (e.destination_path, e.size_bytes)).collect();
    files.sort_by_key(|(path, _)| path.to_string_lossy().to_lowercase());
    Ok(files)
}

fn build_manifest(hostname: &str, files: &[(PathBuf, u64)]) -> TransferManifest {
    let items: Vec<MigrationItem> = files
        .iter()
        .map(|(path, size)| MigrationItem {
            id: uuid::Uuid::new_v4(),
            display_name: path.to_string_lossy().into_owned(),
            item_type: ItemType::FileGroup,
            recommended_tier: Tier::RegistryFile,
            override_tier: None,
            is_selected: true,
            estimated_size_bytes: *size,
            status: ItemStatus::Queued,
            status_message: None,
            source_ref: None,
        })
        .collect();

    let mut manifest = TransferManifest {
        manifest_id: uuid::Uuid::new_v4(),
        created_utc: chrono::Utc::now(),
        source_hostname: hostname.to_string(),
        source_os_version: std::env::consts::OS.to_string(),
        transport_method: TransportKind::DirectTcp,
        user_mappings: Vec::new(),
        items,
        package_installs: Vec::new(),
        total_estimated_bytes: 0,
        manifest_checksum: None,
    };
    manifest.recompute_total();
    manifest
}

/// Run exactly one source session: accept one peer, authenticate,
/// transfer every file under `config.root_dir`. Per spec §4.7, a
/// transport failure on one file marks that item failed and the
/// session continues to the next file; handshake failure or a
/// corrupted frame aborts the whole session.
pub fn run_session(
    config: &SourceConfig,
    cancellation: &CancellationToken,
    progress: &dyn ProgressCallback,
    status: &dyn StatusCallback,
) -> Result<(), EngineError> {
    let (responder_handle, responder_stop) = spawn_discovery_responder(config);

    let result = run_session_inner(config, cancellation, progress, status);

    let _ = responder_stop.send(true);
    let _ = responder_handle.join();
    result
}

fn run_session_inner(
    config: &SourceConfig,
    cancellation: &CancellationToken,
    progress: &dyn ProgressCallback,
    status: &dyn StatusCallback,
) -> Result<(), EngineError> {
    let listener = TcpListener::bind(("0.0.0.0", config.tcp_port)).map_err(|e| EngineError::TransportFatal { message: e.to_string() })?;
    let (mut stream, _addr) = listener.accept().map_err(|e| EngineError::TransportFatal { message: e.to_string() })?;

    handshake::authenticate_incoming(&mut stream, &config.shared_key, &config.hostname)?;

    let files = relative_paths_sorted(&config.root_dir)?;
    let manifest = build_manifest(&config.hostname, &files);

    let mut carrier = DirectTcpCarrier::from_stream(stream);
    carrier.send_manifest(&manifest, cancellation)?;

    let mut bytes_so_far = 0u64;
    let total_bytes = manifest.total_estimated_bytes;

    for (mut item, (relative_path, size_bytes)) in manifest.items.iter().cloned().zip(files.iter()) {
        if cancellation.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let display = relative_path.to_string_lossy().into_owned();
        let absolute = config.root_dir.join(relative_path);

        item.status = ItemStatus::InProgress;
        status.on_item_started(&item);

        let checksum = compute_file_checksum(&absolute, ChecksumAlgorithm::Sha256).ok().map(|c| c.hex().to_string());
        let metadata = TransferMetadata {
            relative_path: display.clone(),
            size_bytes: *size_bytes,
            content_hash: checksum,
            chunk_index: 0,
            total_chunks: 1,
            is_compressed: false,
            is_encrypted: false,
        };

        let send_result = File::open(&absolute)
            .map_err(|e| EngineError::ReadError { path: absolute.clone(), source: e })
            .and_then(|mut file| carrier.send(&mut file, &metadata, cancellation, &NullProgress).map_err(EngineError::from));

        match send_result {
            Ok(()) => {
                bytes_so_far += size_bytes;
                progress.on_progress(bytes_so_far, total_bytes);
                item.status = ItemStatus::Completed;
                status.on_item_completed(&item);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                item.status = ItemStatus::Failed;
                item.status_message = Some(e.to_string());
                status.on_item_completed(&item);
                tracing::warn!(file = %display, error = %e, "file-level send failure; continuing to next file");
            }
        }
    }

    Ok(())
}
