//! MongoDB implementation of the cluster client capability
//!
//! The driver does the replica-set work: it discovers members from the
//! seed list, enforces the set name and selects the primary. When it
//! cannot, each seed is checked on its own (resolve, TCP connect, direct
//! `hello`) so the failure can be attributed to a cause.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use mongodb::bson::{doc, Document};
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::{ClientOptions, ReadPreference, SelectionCriteria, ServerAddress};
use mongodb::Client;
use nix::errno::Errno;
use tokio::net::{lookup_host, TcpStream};
use tracing::debug;

use crate::topology::{Member, Topology};

use super::client::{ClusterClient, ConnectError};
use super::state::OutcomeKind;

const APP_NAME: &str = "rs-verifier";

// Server error codes meaning "reached a member, but it cannot take writes"
const NOT_WRITABLE_PRIMARY: i32 = 10107;
const NOT_PRIMARY_NO_SECONDARY_OK: i32 = 13435;
const NOT_PRIMARY_OR_SECONDARY: i32 = 13436;

/// Replica-set-aware client built on the official driver
#[derive(Debug, Clone)]
pub struct MongoClusterClient {
    selection_timeout: Duration,
    diagnosis_timeout: Duration,
}

impl MongoClusterClient {
    /// Split an attempt budget between primary selection and diagnosis,
    /// leaving headroom so the probe's own timeout is not hit first.
    pub fn new(attempt_timeout: Duration) -> Self {
        Self {
            selection_timeout: attempt_timeout / 2,
            diagnosis_timeout: attempt_timeout / 4,
        }
    }

    fn options(&self, hosts: Vec<ServerAddress>, timeout: Duration) -> ClientOptions {
        let mut options = ClientOptions::default();
        options.hosts = hosts;
        options.app_name = Some(APP_NAME.to_string());
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        options
    }

    /// `hello` routed to the primary through a replica set connection
    async fn replica_set_hello(&self, topology: &Topology) -> Result<Document, MongoError> {
        let hosts = topology.members().iter().map(server_address).collect();
        let mut options = self.options(hosts, self.selection_timeout);
        options.repl_set_name = Some(topology.name().to_string());

        let client = Client::with_options(options)?;
        client
            .database("admin")
            .run_command(
                doc! { "hello": 1 },
                SelectionCriteria::ReadPreference(ReadPreference::Primary),
            )
            .await
    }

    /// `hello` against one member regardless of its role
    async fn direct_hello(&self, member: &Member) -> Result<Document, MongoError> {
        let mut options = self.options(vec![server_address(member)], self.diagnosis_timeout);
        options.direct_connection = Some(true);

        let client = Client::with_options(options)?;
        client
            .database("admin")
            .run_command(doc! { "hello": 1 }, None::<SelectionCriteria>)
            .await
    }

    async fn diagnose(&self, topology: &Topology) -> ConnectError {
        let checks = topology.members().iter().map(|member| {
            bounded_check(
                self.diagnosis_timeout,
                member,
                self.check_member(member, topology.name()),
            )
        });
        summarize(&join_all(checks).await)
    }

    /// Work out why one member cannot serve as primary
    async fn check_member(&self, member: &Member, expected: &str) -> ConnectError {
        let addrs: Vec<SocketAddr> = match lookup_host((member.address(), member.port())).await {
            Ok(addrs) => addrs.collect(),
            Err(e) => return ConnectError::AddressResolutionFailed(e.to_string()),
        };
        if addrs.is_empty() {
            return ConnectError::AddressResolutionFailed("no addresses returned".into());
        }

        if let Err(e) = TcpStream::connect(addrs.as_slice()).await {
            return classify_io(&e);
        }

        match self.direct_hello(member).await {
            Ok(reply) => match hello_outcome(&reply, expected) {
                Ok(()) => ConnectError::NoPrimaryFound(
                    "member claims primary but is not reachable through the replica set".into(),
                ),
                // A reachable secondary means the set has no primary right now
                Err(ConnectError::NotMaster(detail)) => ConnectError::NoPrimaryFound(detail),
                Err(e) => e,
            },
            Err(e) => classify_driver_error(&e)
                .unwrap_or_else(|| ConnectError::ConnectionFailed(e.to_string())),
        }
    }
}

#[async_trait]
impl ClusterClient for MongoClusterClient {
    async fn connect(&self, topology: &Topology) -> Result<(), ConnectError> {
        match self.replica_set_hello(topology).await {
            Ok(reply) => hello_outcome(&reply, topology.name()),
            Err(e) => {
                if let Some(err) = classify_driver_error(&e) {
                    return Err(err);
                }
                debug!(error = %e, "Primary selection failed, checking members individually");
                Err(self.diagnose(topology).await)
            }
        }
    }
}

fn server_address(member: &Member) -> ServerAddress {
    ServerAddress::Tcp {
        host: member.address().to_string(),
        port: Some(member.port()),
    }
}

/// Run one member's check under its own deadline
async fn bounded_check(
    limit: Duration,
    member: &Member,
    check: impl Future<Output = ConnectError>,
) -> MemberFinding {
    let error = match tokio::time::timeout(limit, check).await {
        Ok(error) => error,
        Err(_) => ConnectError::ConnectionFailed(format!(
            "no answer within {} ms",
            limit.as_millis()
        )),
    };
    MemberFinding {
        addr: member.to_string(),
        error,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MemberFinding {
    addr: String,
    error: ConnectError,
}

/// Fold per-member findings into one error.
///
/// Members that answered as MongoDB servers take precedence over socket
/// level failures of the others; within a group the priority order of
/// `OutcomeKind` decides.
fn summarize(findings: &[MemberFinding]) -> ConnectError {
    let answered = |f: &&MemberFinding| {
        matches!(
            f.error.kind(),
            OutcomeKind::NameMismatch | OutcomeKind::NoPrimaryFound | OutcomeKind::NotMaster
        )
    };

    let worst = if findings.iter().any(|f| answered(&f)) {
        findings.iter().filter(answered).min_by_key(|f| f.error.kind())
    } else {
        findings.iter().min_by_key(|f| f.error.kind())
    };

    let detail = findings
        .iter()
        .map(|f| format!("{}: {}", f.addr, f.error.detail()))
        .collect::<Vec<_>>()
        .join("; ");

    match worst {
        Some(f) => f.error.with_detail(detail),
        None => ConnectError::NoPrimaryFound("no members to check".into()),
    }
}

/// Interpret a `hello` reply against the configured set name
fn hello_outcome(reply: &Document, expected: &str) -> Result<(), ConnectError> {
    match reply.get_str("setName").ok() {
        None => Err(ConnectError::NameMismatch(format!(
            "member is not running as a replica set, expected '{}'",
            expected
        ))),
        Some(name) if name != expected => Err(ConnectError::NameMismatch(format!(
            "member reports replica set '{}', expected '{}'",
            name, expected
        ))),
        Some(_) => {
            let writable = reply
                .get_bool("isWritablePrimary")
                .or_else(|_| reply.get_bool("ismaster"))
                .unwrap_or(false);
            if writable {
                Ok(())
            } else {
                let role = if reply.get_bool("secondary").unwrap_or(false) {
                    "secondary"
                } else {
                    "not primary or secondary"
                };
                Err(ConnectError::NotMaster(format!("member is {}", role)))
            }
        }
    }
}

/// Map driver errors that already name their cause; `None` means the
/// members need to be checked individually.
fn classify_driver_error(error: &MongoError) -> Option<ConnectError> {
    match error.kind.as_ref() {
        ErrorKind::Io(e) => Some(classify_io(e)),
        ErrorKind::DnsResolve { message, .. } => {
            Some(ConnectError::AddressResolutionFailed(message.clone()))
        }
        ErrorKind::Command(cmd)
            if matches!(
                cmd.code,
                NOT_WRITABLE_PRIMARY | NOT_PRIMARY_NO_SECONDARY_OK | NOT_PRIMARY_OR_SECONDARY
            ) =>
        {
            Some(ConnectError::NotMaster(format!(
                "{} ({})",
                cmd.message, cmd.code_name
            )))
        }
        _ => None,
    }
}

/// Socket-creation failures vs. failures to reach the peer
fn classify_io(error: &io::Error) -> ConnectError {
    let no_socket = error.raw_os_error().map(Errno::from_i32).is_some_and(|errno| {
        matches!(
            errno,
            Errno::EMFILE
                | Errno::ENFILE
                | Errno::ENOBUFS
                | Errno::ENOMEM
                | Errno::EACCES
                | Errno::EAFNOSUPPORT
                | Errno::EPROTONOSUPPORT
        )
    });
    if no_socket {
        ConnectError::NoSocket(error.to_string())
    } else {
        ConnectError::ConnectionFailed(error.to_string())
    }
}
