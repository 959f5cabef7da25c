//! One verification run: probe, then publish the verdict if there is one

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::probe::{ClusterClient, ConnectivityProbe, ProbeError, RetryPolicy};
use crate::status::StatusLog;
use crate::topology::Topology;
use crate::verdict::{Verdict, VerdictError, VerdictSink};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Connected(Verdict),
    Exhausted(Verdict),
    /// Shut down before a verdict was reached; nothing was published
    Cancelled,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Verdict(#[from] VerdictError),
}

pub async fn run<C, L, S>(
    topology: &Topology,
    client: C,
    log: L,
    sink: &S,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<RunOutcome, VerifyError>
where
    C: ClusterClient,
    L: StatusLog,
    S: VerdictSink + ?Sized,
{
    let probe = ConnectivityProbe::new(client, log, policy);

    match probe.run(topology, cancel).await {
        Ok(verdict) => {
            if let Err(e) = sink.publish(&verdict) {
                error!(error = %e, "Failed to publish verdict");
                return Err(e.into());
            }
            info!(
                success = verdict.success,
                attempts = verdict.attempts,
                replica_set = %verdict.replica_set,
                "Verdict published"
            );
            if verdict.success {
                Ok(RunOutcome::Connected(verdict))
            } else {
                Ok(RunOutcome::Exhausted(verdict))
            }
        }
        Err(ProbeError::Cancelled { attempts }) => {
            info!(attempts, "Probe cancelled, no verdict written");
            Ok(RunOutcome::Cancelled)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::probe::ConnectError;
    use crate::status::MemoryStatusLog;
    use crate::topology::Member;
    use crate::verdict::{read_verdict, FileVerdictSink};

    struct FixedClient(Result<(), ConnectError>);

    #[async_trait]
    impl ClusterClient for FixedClient {
        async fn connect(&self, _topology: &Topology) -> Result<(), ConnectError> {
            self.0.clone()
        }
    }

    fn topology() -> Topology {
        Topology::new("rs", vec![Member::new("localhost", 27017)])
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(3),
            max_attempts: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_publishes_verdict() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rs_verifier.verdict");
        let sink = FileVerdictSink::new(&path);
        let mut log = MemoryStatusLog::default();

        let outcome = run(
            &topology(),
            FixedClient(Ok(())),
            &mut log,
            &sink,
            policy(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let RunOutcome::Connected(verdict) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(read_verdict(&path).unwrap(), verdict);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_publishes_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rs_verifier.verdict");
        let sink = FileVerdictSink::new(&path);
        let mut log = MemoryStatusLog::default();

        let outcome = run(
            &topology(),
            FixedClient(Err(ConnectError::NoPrimaryFound("secondary".into()))),
            &mut log,
            &sink,
            policy().with_max_attempts(10),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, RunOutcome::Exhausted(ref v) if v.attempts == 10));
        let published = read_verdict(&path).unwrap();
        assert!(!published.success);
        assert_eq!(published.attempts, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_writes_no_verdict() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rs_verifier.verdict");
        let sink = FileVerdictSink::new(&path);
        let mut log = MemoryStatusLog::default();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            trigger.cancel();
        });

        let outcome = run(
            &topology(),
            FixedClient(Err(ConnectError::ConnectionFailed("refused".into()))),
            &mut log,
            &sink,
            policy(),
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(outcome, RunOutcome::Cancelled);
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_is_surfaced() {
        let dir = TempDir::new().unwrap();
        // Parent "directory" is a regular file, so the token cannot be created
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let sink = FileVerdictSink::new(blocker.join("rs_verifier.verdict"));
        let mut log = MemoryStatusLog::default();

        let err = run(
            &topology(),
            FixedClient(Ok(())),
            &mut log,
            &sink,
            policy(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, VerifyError::Verdict(_)));
    }
}
