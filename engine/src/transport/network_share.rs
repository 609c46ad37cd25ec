//! Network share (SMB/UNC) carrier. Identified by a UNC base path and
//! optional credentials; credentials are mounted for the lifetime of
//! the carrier (scoped acquisition, released on drop) through the
//! `ProcessRunner` abstraction rather than a direct SMB implementation —
//! wiring the real OS mount call is a platform-layer concern.

use super::local::LocalCarrier;
use super::{ReceivedPayload, Transport, TransportError, TransportErrorKind};
use crate::collaborators::ProcessRunner;
use crate::model::TransferMetadata;
use crate::progress::ProgressCallback;
use crate::throttle::CancellationToken;
use std::io::Read;
use std::path::PathBuf;

pub struct ShareCredentials {
    pub username: String,
    pub password: String,
}

/// A mounted network share, reusing `LocalCarrier`'s resume-log and
/// free-space semantics once the UNC path is bound.
pub struct NetworkShareCarrier<'a> {
    unc_path: String,
    inner: LocalCarrier,
    process_runner: &'a dyn ProcessRunner,
    mounted: bool,
}

impl<'a> NetworkShareCarrier<'a> {
    pub fn connect(
        unc_path: &str,
        local_mount_point: PathBuf,
        credentials: Option<&ShareCredentials>,
        process_runner: &'a dyn ProcessRunner,
        cancellation: &CancellationToken,
    ) -> Result<Self, TransportError> {
        let mut args = vec!["use".to_string(), local_mount_point.display().to_string(), unc_path.to_string()];
        if let Some(creds) = credentials {
            args.push(format!("/user:{}", creds.username));
            args.push(creds.password.clone());
        }

        let output = process_runner
            .run("net", &args, cancellation)
            .map_err(|e| TransportError { kind: TransportErrorKind::IoFailure, message: e.to_string() })?;

        if output.exit_code != 0 {
            return Err(TransportError {
                kind: TransportErrorKind::IoFailure,
                message: format!("share mount failed: {}", output.stderr),
            });
        }

        let inner = LocalCarrier::new(local_mount_point).map_err(|e| TransportError {
            kind: TransportErrorKind::IoFailure,
            message: e.to_string(),
        })?;

        Ok(NetworkShareCarrier { unc_path: unc_path.to_string(), inner, process_runner, mounted: true })
    }

    fn unmount(&mut self, cancellation: &CancellationToken) {
        if !self.mounted {
            return;
        }
        let _ = self.process_runner.run("net", &["use".to_string(), "/delete".to_string(), self.unc_path.clone()], cancellation);
        self.mounted = false;
    }
}

impl<'a> Drop for NetworkShareCarrier<'a> {
    fn drop(&mut self) {
        self.unmount(&CancellationToken::new());
    }
}

impl<'a> Transport for NetworkShareCarrier<'a> {
    fn send(
        &mut self,
        stream: &mut dyn Read,
        metadata: &TransferMetadata,
        cancellation: &CancellationToken,
        progress: &dyn ProgressCallback,
    ) -> Result<(), TransportError> {
        self.inner.send(stream, metadata, cancellation, progress)
    }

    fn receive(
        &mut self,
        metadata_hint: Option<&TransferMetadata>,
        cancellation: &CancellationToken,
        progress: &dyn ProgressCallback,
    ) -> Result<ReceivedPayload, TransportError> {
        self.inner.receive(metadata_hint, cancellation, progress)
    }

    fn test_connection(&mut self) -> bool {
        self.inner.test_connection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeProcessRunner;

    #[test]
    fn connect_fails_when_mount_command_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = FakeProcessRunner::succeeding("");
        runner.output.exit_code = 1;
        runner.output.stderr = "access denied".to_string();
        let token = CancellationToken::new();

        let result = NetworkShareCarrier::connect(
            "\\\\nas\\share",
            dir.path().join("mount"),
            None,
            &runner,
            &token,
        );
        assert!(result.is_err());
    }

    #[test]
    fn connect_succeeds_and_round_trips_through_inner_carrier() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeProcessRunner::succeeding("");
        let token = CancellationToken::new();

        let mut carrier = NetworkShareCarrier::connect(
            "\\\\nas\\share",
            dir.path().join("mount"),
            Some(&ShareCredentials { username: "tech".into(), password: "hunter2".into() }),
            &runner,
            &token,
        )
        .unwrap();

        assert!(carrier.test_connection());
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }
}
