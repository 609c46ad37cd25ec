//! Live-snapshot creation/deletion via the OS snapshot facility,
//! reached through `ProcessRunner` rather than a direct VSS binding —
//! the core stays host-API-agnostic.

use crate::collaborators::ProcessRunner;
use crate::error::EngineError;
use crate::throttle::CancellationToken;

/// An opaque handle to a live snapshot, carrying just enough to delete
/// it later.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    pub volume: String,
    pub shadow_id: String,
}

fn run_once_then_retry(
    process_runner: &dyn ProcessRunner,
    program: &str,
    args: &[String],
    cancellation: &CancellationToken,
) -> Result<String, EngineError> {
    for attempt in 0..2 {
        match process_runner.run(program, args, cancellation) {
            Ok(output) if output.exit_code == 0 => return Ok(output.stdout),
            Ok(output) if attempt == 1 => {
                return Err(EngineError::SnapshotRefused {
                    volume: args.join(" "),
                    message: output.stderr,
                })
            }
            Err(e) if attempt == 1 => return Err(e),
            _ => continue,
        }
    }
    unreachable!("loop always returns on its second iteration")
}

/// Create a live snapshot of `volume`. Idempotent under retry once: a
/// single transient failure is retried before the error is surfaced.
pub fn create_snapshot(
    process_runner: &dyn ProcessRunner,
    volume: &str,
    cancellation: &CancellationToken,
) -> Result<SnapshotHandle, EngineError> {
    let args = vec!["shadowcopy".to_string(), "create".to_string(), volume.to_string()];
    let shadow_id = run_once_then_retry(process_runner, "vssadmin", &args, cancellation)?
        .trim()
        .to_string();
    Ok(SnapshotHandle { volume: volume.to_string(), shadow_id })
}

/// Release a snapshot created by [`create_snapshot`]. Idempotent under
/// retry once, same as creation.
pub fn delete_snapshot(
    process_runner: &dyn ProcessRunner,
    handle: &SnapshotHandle,
    cancellation: &CancellationToken,
) -> Result<(), EngineError> {
    let args = vec!["shadowcopy".to_string(), "delete".to_string(), handle.shadow_id.clone()];
    run_once_then_retry(process_runner, "vssadmin", &args, cancellation)?;
    Ok(())
}
