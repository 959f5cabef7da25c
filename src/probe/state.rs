//! Probe state machine and outcome taxonomy

use std::fmt;

use chrono::{DateTime, Utc};

/// Classified result of one connection attempt
///
/// Variant order is the reporting priority: when members fail in
/// different ways, the smallest kind wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutcomeKind {
    NoSocket,
    ConnectionFailed,
    AddressResolutionFailed,
    /// Configured replica set name differs from what the member reports
    NameMismatch,
    NoPrimaryFound,
    /// Reached a member that is not primary; not ready yet, not fatal
    NotMaster,
    Ok,
}

impl OutcomeKind {
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Operator-facing line for the status trail
    pub fn message(self) -> &'static str {
        match self {
            Self::NoSocket => "no socket",
            Self::ConnectionFailed => "connection failed",
            Self::AddressResolutionFailed => "error occured while calling getaddrinfo().",
            Self::NameMismatch => "Given rs name doesn't match this replica set.",
            Self::NoPrimaryFound => "Can't find primary in replica set.",
            Self::NotMaster => "not master",
            Self::Ok => "connection OK!.",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Probe lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeState {
    #[default]
    Idle,
    Connecting,
    /// Terminal success
    Connected,
    Failed(OutcomeKind),
    Backoff,
    /// Terminal failure, only reachable with a bounded policy
    Exhausted,
}

impl ProbeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Connected | Self::Exhausted)
    }
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Connecting => f.write_str("Connecting"),
            Self::Connected => f.write_str("Connected"),
            Self::Failed(kind) => write!(f, "Failed({})", kind),
            Self::Backoff => f.write_str("Backoff"),
            Self::Exhausted => f.write_str("Exhausted"),
        }
    }
}

/// One iteration of the probe loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeAttempt {
    pub timestamp: DateTime<Utc>,
    /// 1-based attempt counter
    pub number: u32,
    pub outcome: OutcomeKind,
    pub raw_detail: String,
}

impl ProbeAttempt {
    pub fn new(number: u32, outcome: OutcomeKind, raw_detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            number,
            outcome,
            raw_detail: raw_detail.into(),
        }
    }
}
