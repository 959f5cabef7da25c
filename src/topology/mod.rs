//! Replica set topology
//!
//! A `Topology` is built once at startup and then only read. The probe
//! borrows it for every attempt.

use std::fmt;

/// Port used when a member entry has no usable port
pub const DEFAULT_PORT: u16 = 27017;

/// Replica set name used when the config source names none
pub const DEFAULT_SET_NAME: &str = "rs";

/// Host used by the fallback topology
pub const FALLBACK_HOST: &str = "localhost";

/// A single replica set member endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    address: String,
    port: u16,
}

impl Member {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Hostname or IP, without brackets for IPv6
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.contains(':') {
            write!(f, "[{}]:{}", self.address, self.port)
        } else {
            write!(f, "{}:{}", self.address, self.port)
        }
    }
}

/// Replica set name plus members in configuration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    name: String,
    members: Vec<Member>,
}

impl Topology {
    /// Build a topology, substituting the default set name for an empty one.
    ///
    /// An empty member list is accepted here; the loader rejects it before
    /// a probe ever sees it.
    pub fn new(name: impl Into<String>, members: Vec<Member>) -> Self {
        let name = name.into();
        let name = if name.trim().is_empty() {
            DEFAULT_SET_NAME.to_string()
        } else {
            name
        };
        Self { name, members }
    }

    /// Single localhost member on the default port
    ///
    /// Used when no config source can be opened, so the probe still has
    /// something to try.
    pub fn fallback() -> Self {
        Self::new(
            DEFAULT_SET_NAME,
            vec![Member::new(FALLBACK_HOST, DEFAULT_PORT)],
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Comma separated seed list, used in log lines
    pub fn seed_list(&self) -> String {
        self.members
            .iter()
            .map(Member::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}
