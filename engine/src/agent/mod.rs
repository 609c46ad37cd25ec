//! The Agent Transfer Protocol (spec §4.7): a sentinel-framed handshake
//! plus manifest plus ordered file stream over the direct-TCP carrier,
//! running as either a one-shot "portable" session or a looping
//! "service" daemon.
//!
//! `wire` supplies the length-prefixed JSON framing the handshake uses
//! before a [`crate::transport::direct_tcp::DirectTcpCarrier`] exists;
//! `handshake` authenticates a session against a shared key; `source`
//! and `destination` run the two mirror-image session flows.

pub mod destination;
pub mod handshake;
pub mod source;
pub mod wire;

use crate::collaborators::ProcessRunner;
use crate::error::EngineError;
use crate::progress::{ProgressCallback, StatusCallback};
use crate::throttle::CancellationToken;
use destination::DestinationConfig;
use source::SourceConfig;

/// Which side of the protocol a running agent plays.
pub enum AgentMode {
    Source(SourceConfig),
    Destination(DestinationConfig),
}

/// Portable mode performs exactly one session and returns; the caller
/// (the `agent` binary's `main`) exits after this returns.
pub fn run_portable(mode: &AgentMode, cancellation: &CancellationToken, progress: &dyn ProgressCallback, status: &dyn StatusCallback) -> Result<(), EngineError> {
    match mode {
        AgentMode::Source(config) => source::run_session(config, cancellation, progress, status),
        AgentMode::Destination(config) => destination::run_session(config, cancellation, progress, status),
    }
}

/// Service mode loops `listen → authenticate → transfer → repeat`
/// forever, one session in flight at a time. Each session's failure is
/// logged and the loop continues rather than exiting (spec §4.7).
/// Runs until `cancellation` is set.
pub fn run_service(mode: &AgentMode, cancellation: &CancellationToken, progress: &dyn ProgressCallback, status: &dyn StatusCallback) {
    loop {
        if cancellation.is_cancelled() {
            return;
        }
        match run_portable(mode, cancellation, progress, status) {
            Ok(()) => tracing::info!("agent session completed"),
            Err(e) => tracing::warn!(error = %e, "agent session failed; service loop continues"),
        }
    }
}

/// Install this binary as an OS service via the platform's service
/// manager, invoked through `ProcessRunner` rather than a dedicated
/// service-management crate (out of scope per spec §1 — host-OS
/// integration plumbing stays behind the collaborator interfaces).
pub fn install_service(process_runner: &dyn ProcessRunner, binary_path: &str, service_name: &str, cancellation: &CancellationToken) -> Result<(), EngineError> {
    if cfg!(windows) {
        let args = vec![
            "create".to_string(),
            service_name.to_string(),
            format!("binPath= \"{} --mode service\"", binary_path),
            "start= auto".to_string(),
        ];
        let output = process_runner.run("sc", &args, cancellation)?;
        if output.exit_code != 0 {
            return Err(EngineError::UserError { message: format!("service install failed: {}", output.stderr) });
        }
    } else {
        let output = process_runner.run("systemctl", &["enable".to_string(), "--now".to_string(), service_name.to_string()], cancellation)?;
        if output.exit_code != 0 {
            return Err(EngineError::UserError { message: format!("service install failed: {}", output.stderr) });
        }
    }
    Ok(())
}

/// Uninstall the service previously registered by [`install_service`].
pub fn uninstall_service(process_runner: &dyn ProcessRunner, service_name: &str, cancellation: &CancellationToken) -> Result<(), EngineError> {
    if cfg!(windows) {
        let output = process_runner.run("sc", &["delete".to_string(), service_name.to_string()], cancellation)?;
        if output.exit_code != 0 {
            return Err(EngineError::UserError { message: format!("service uninstall failed: {}", output.stderr) });
        }
    } else {
        let output = process_runner.run("systemctl", &["disable".to_string(), "--now".to_string(), service_name.to_string()], cancellation)?;
        if output.exit_code != 0 {
            return Err(EngineError::UserError { message: format!("service uninstall failed: {}", output.stderr) });
        }
    }
    Ok(())
}
