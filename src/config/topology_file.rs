//! Line-oriented member list loader
//!
//! The file is hand-edited on the cluster hosts, so anything that does not
//! parse is reported and skipped instead of failing the whole load:
//!
//! ```text
//! # replica set
//! name=rs
//! number_of_servers=3
//! path=192.168.0.108:27017
//! path=192.168.0.109:27017
//! path=192.168.0.110:27017
//! ```

use std::path::Path;

use crate::topology::{Member, Topology, DEFAULT_PORT, DEFAULT_SET_NAME};

use super::ConfigError;

/// Result of a successful load, with every entry that was skipped or
/// adjusted along the way
#[derive(Debug)]
pub struct ParsedTopology {
    pub topology: Topology,
    pub warnings: Vec<ConfigError>,
}

/// Read and parse a member list
///
/// Fails with `SourceUnavailable` only when the file cannot be read at all.
pub fn load_topology<P: AsRef<Path>>(path: P) -> Result<ParsedTopology, ConfigError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| ConfigError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_topology(&String::from_utf8_lossy(&bytes))
}

/// Like `load_topology`, but a missing source yields the single-member
/// localhost topology. The open failure is kept as the first warning.
pub fn load_topology_or_fallback<P: AsRef<Path>>(path: P) -> Result<ParsedTopology, ConfigError> {
    match load_topology(path) {
        Err(e @ ConfigError::SourceUnavailable { .. }) => Ok(ParsedTopology {
            topology: Topology::fallback(),
            warnings: vec![e],
        }),
        other => other,
    }
}

pub fn parse_topology(content: &str) -> Result<ParsedTopology, ConfigError> {
    let mut name: Option<String> = None;
    let mut limit: Option<usize> = None;
    let mut members = Vec::new();
    let mut warnings = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            warnings.push(malformed(line_no, format!("missing '=' in '{}'", line)));
            continue;
        };
        let value = value.trim();

        match key.trim() {
            "name" => {
                if value.is_empty() {
                    warnings.push(malformed(line_no, "empty replica set name"));
                } else {
                    name = Some(value.to_string());
                }
            }
            "number_of_servers" => match value.parse::<usize>() {
                Ok(n) => limit = Some(n),
                Err(_) => warnings.push(malformed(
                    line_no,
                    format!("number_of_servers '{}' is not a count", value),
                )),
            },
            "path" => match parse_member(value) {
                Ok((member, adjusted)) => {
                    if let Some(reason) = adjusted {
                        warnings.push(malformed(line_no, reason));
                    }
                    members.push(member);
                }
                Err(reason) => warnings.push(malformed(line_no, reason)),
            },
            other => warnings.push(malformed(line_no, format!("unknown key '{}'", other))),
        }
    }

    if let Some(limit) = limit {
        if members.len() > limit {
            let ignored = members.len() - limit;
            members.truncate(limit);
            warnings.push(ConfigError::MemberLimitExceeded { limit, ignored });
        }
    }

    let topology = Topology::new(name.unwrap_or_else(|| DEFAULT_SET_NAME.to_string()), members);
    if topology.is_empty() {
        return Err(ConfigError::EmptyTopology(topology.name().to_string()));
    }

    Ok(ParsedTopology { topology, warnings })
}

fn malformed(line: usize, reason: impl Into<String>) -> ConfigError {
    ConfigError::MalformedEntry {
        line,
        reason: reason.into(),
    }
}

/// Parse `address:port`, splitting on the last colon.
///
/// IPv6 literals must be bracketed. A missing or out-of-range port is
/// replaced with the default and reported through the second tuple field.
fn parse_member(value: &str) -> Result<(Member, Option<String>), String> {
    let (host, port) = match value.strip_prefix('[') {
        Some(rest) => {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| format!("unterminated '[' in path '{}'", value))?;
            let port = match tail.trim() {
                "" => None,
                tail => Some(
                    tail.strip_prefix(':')
                        .ok_or_else(|| format!("unexpected '{}' after ']' in path '{}'", tail, value))?,
                ),
            };
            (host.trim(), port)
        }
        None => {
            let (host, port) = value
                .rsplit_once(':')
                .ok_or_else(|| format!("missing ':' in path '{}'", value))?;
            let host = host.trim();
            if host.contains(':') {
                return Err(format!("IPv6 address must be bracketed in path '{}'", value));
            }
            (host, Some(port))
        }
    };

    if host.is_empty() {
        return Err(format!("empty address in path '{}'", value));
    }

    let port = port.map(str::trim).unwrap_or_default();
    match port.parse::<u16>() {
        Ok(p) if p != 0 => Ok((Member::new(host, p), None)),
        _ => Ok((
            Member::new(host, DEFAULT_PORT),
            Some(format!(
                "invalid port '{}' for {}, using {}",
                port, host, DEFAULT_PORT
            )),
        )),
    }
}
