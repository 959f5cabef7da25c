//! Connectivity probe loop
//!
//! One attempt at a time. Between failures the loop sleeps for the fixed
//! interval; the sleep and the attempt itself both race the cancellation
//! token so a shutdown never leaves a verdict behind.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::status::{LogEntry, StatusLog};
use crate::topology::Topology;
use crate::verdict::Verdict;

use super::client::{ClusterClient, ConnectError};
use super::policy::RetryPolicy;
use super::state::{OutcomeKind, ProbeAttempt, ProbeState};
use super::ProbeError;

/// Drives the retry state machine against a cluster client
pub struct ConnectivityProbe<C, L> {
    client: C,
    log: L,
    policy: RetryPolicy,
    state: ProbeState,
}

impl<C, L> ConnectivityProbe<C, L>
where
    C: ClusterClient,
    L: StatusLog,
{
    pub fn new(client: C, log: L, policy: RetryPolicy) -> Self {
        Self {
            client,
            log,
            policy,
            state: ProbeState::Idle,
        }
    }

    /// Current state of the machine
    pub fn state(&self) -> ProbeState {
        self.state
    }

    /// Run until connected, exhausted, or cancelled.
    ///
    /// Consumes the probe: a verdict is produced at most once.
    pub async fn run(
        mut self,
        topology: &Topology,
        cancel: &CancellationToken,
    ) -> Result<Verdict, ProbeError> {
        if topology.is_empty() {
            return Err(ProbeError::EmptyTopology(topology.name().to_string()));
        }

        info!(
            replica_set = %topology.name(),
            seeds = %topology.seed_list(),
            members = topology.len(),
            interval_ms = self.policy.interval.as_millis() as u64,
            timeout_ms = self.policy.attempt_timeout.as_millis() as u64,
            max_attempts = ?self.policy.max_attempts,
            "Starting connectivity probe"
        );
        self.record(LogEntry::Started {
            replica_set: topology.name().to_string(),
            seeds: topology.seed_list(),
        })?;

        let mut attempts: u32 = 0;
        loop {
            self.transition(ProbeState::Connecting)?;
            attempts += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = attempt_once(&self.client, topology, self.policy.attempt_timeout) => Some(result),
            };
            let Some(result) = result else {
                return Err(self.abort(attempts));
            };

            let attempt = match &result {
                Ok(()) => ProbeAttempt::new(attempts, OutcomeKind::Ok, ""),
                Err(e) => ProbeAttempt::new(attempts, e.kind(), e.detail()),
            };
            let outcome = attempt.outcome;
            if outcome.is_ok() {
                info!(attempt = attempts, "Replica set primary reachable");
            } else {
                warn!(
                    attempt = attempts,
                    outcome = ?outcome,
                    detail = %attempt.raw_detail,
                    "Connection attempt failed"
                );
            }
            self.record(LogEntry::Attempt(attempt))?;

            if outcome.is_ok() {
                self.transition(ProbeState::Connected)?;
                return self.finish(topology, true, attempts);
            }

            self.transition(ProbeState::Failed(outcome))?;
            if !self.policy.allows_retry(attempts) {
                self.transition(ProbeState::Exhausted)?;
                return self.finish(topology, false, attempts);
            }

            self.transition(ProbeState::Backoff)?;
            let cancelled = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(self.policy.interval) => false,
            };
            if cancelled {
                return Err(self.abort(attempts));
            }
        }
    }

    fn transition(&mut self, to: ProbeState) -> Result<(), ProbeError> {
        let from = self.state;
        debug!(from = %from, to = %to, "Probe state transition");
        self.state = to;
        self.record(LogEntry::Transition { from, to })
    }

    fn record(&mut self, entry: LogEntry) -> Result<(), ProbeError> {
        self.log.record(&entry).map_err(ProbeError::StatusLog)
    }

    fn finish(
        &mut self,
        topology: &Topology,
        success: bool,
        attempts: u32,
    ) -> Result<Verdict, ProbeError> {
        debug_assert!(self.state.is_terminal());
        self.record(LogEntry::Finished { success, attempts })?;
        if success {
            info!(attempts, "Probe finished: replica set is ready");
        } else {
            warn!(attempts, "Probe finished: retry limit exhausted");
        }
        Ok(Verdict::new(success, topology.name(), attempts))
    }

    fn abort(&mut self, attempts: u32) -> ProbeError {
        info!(attempts, state = %self.state(), "Probe cancelled");
        match self.record(LogEntry::Cancelled { attempts }) {
            Ok(()) => ProbeError::Cancelled { attempts },
            Err(e) => e,
        }
    }
}

/// One bounded attempt. A hung handshake counts as a failed connection.
async fn attempt_once<C: ClusterClient>(
    client: &C,
    topology: &Topology,
    timeout: Duration,
) -> Result<(), ConnectError> {
    match tokio::time::timeout(timeout, client.connect(topology)).await {
        Ok(result) => result,
        Err(_) => Err(ConnectError::ConnectionFailed(format!(
            "attempt timed out after {} ms",
            timeout.as_millis()
        ))),
    }
}
