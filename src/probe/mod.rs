//! Replica set connectivity probe
//!
//! This module provides:
//! - The outcome taxonomy and probe state machine
//! - A fixed-interval retry policy with an optional attempt bound
//! - The `ClusterClient` capability and its MongoDB driver implementation

mod client;
mod mongo;
mod policy;
mod runner;
mod state;

pub use client::ClusterClient;
#[cfg(test)]
pub use client::ConnectError;
pub use mongo::MongoClusterClient;
pub use policy::RetryPolicy;
pub use runner::ConnectivityProbe;
pub use state::{ProbeAttempt, ProbeState};
#[cfg(test)]
pub use state::OutcomeKind;

/// Probe run ended without a verdict
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Probe cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
    #[error("No members configured for replica set '{0}'")]
    EmptyTopology(String),
    #[error("Failed to write status log: {0}")]
    StatusLog(std::io::Error),
}
