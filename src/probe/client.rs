//! Cluster client capability
//!
//! The probe only orchestrates. Anything that can attempt a
//! replica-set-aware handshake and name why it failed can drive it.

use async_trait::async_trait;

use crate::topology::Topology;

use super::state::OutcomeKind;

/// Why a connection attempt did not reach a primary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("No socket: {0}")]
    NoSocket(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Address resolution failed: {0}")]
    AddressResolutionFailed(String),
    #[error("Replica set name mismatch: {0}")]
    NameMismatch(String),
    #[error("No primary found: {0}")]
    NoPrimaryFound(String),
    #[error("Not master: {0}")]
    NotMaster(String),
}

impl ConnectError {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::NoSocket(_) => OutcomeKind::NoSocket,
            Self::ConnectionFailed(_) => OutcomeKind::ConnectionFailed,
            Self::AddressResolutionFailed(_) => OutcomeKind::AddressResolutionFailed,
            Self::NameMismatch(_) => OutcomeKind::NameMismatch,
            Self::NoPrimaryFound(_) => OutcomeKind::NoPrimaryFound,
            Self::NotMaster(_) => OutcomeKind::NotMaster,
        }
    }

    /// Raw detail as reported by the client layer
    pub fn detail(&self) -> &str {
        match self {
            Self::NoSocket(d)
            | Self::ConnectionFailed(d)
            | Self::AddressResolutionFailed(d)
            | Self::NameMismatch(d)
            | Self::NoPrimaryFound(d)
            | Self::NotMaster(d) => d,
        }
    }

    /// Same kind, different detail
    pub fn with_detail(&self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match self {
            Self::NoSocket(_) => Self::NoSocket(detail),
            Self::ConnectionFailed(_) => Self::ConnectionFailed(detail),
            Self::AddressResolutionFailed(_) => Self::AddressResolutionFailed(detail),
            Self::NameMismatch(_) => Self::NameMismatch(detail),
            Self::NoPrimaryFound(_) => Self::NoPrimaryFound(detail),
            Self::NotMaster(_) => Self::NotMaster(detail),
        }
    }
}

/// A replica-set-aware client that resolves the primary itself
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Attempt one handshake against the topology.
    ///
    /// `Ok(())` means a writable primary answered for the configured set.
    async fn connect(&self, topology: &Topology) -> Result<(), ConnectError>;
}

#[async_trait]
impl<T: ClusterClient + ?Sized> ClusterClient for &T {
    async fn connect(&self, topology: &Topology) -> Result<(), ConnectError> {
        (**self).connect(topology).await
    }
}
