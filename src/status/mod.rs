//! Append-only status trail
//!
//! Operators read this file to find out why a replica set was unreachable
//! during the boot window. Only the ordering of lines is meaningful; the
//! wording is not a stable format.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};

use crate::probe::{ProbeAttempt, ProbeState};

/// A single line in the status trail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// A topology entry was skipped or adjusted while loading
    ConfigWarning(String),
    Started { replica_set: String, seeds: String },
    Transition { from: ProbeState, to: ProbeState },
    Attempt(ProbeAttempt),
    Finished { success: bool, attempts: u32 },
    Cancelled { attempts: u32 },
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigWarning(warning) => write!(f, "config: {}", warning),
            Self::Started { replica_set, seeds } => {
                write!(f, "verifying replica set '{}' (seeds: {})", replica_set, seeds)
            }
            Self::Transition {
                from,
                to: ProbeState::Connecting,
            } => write!(f, "Checking the connection... ({} -> Connecting)", from),
            Self::Transition { from, to } => write!(f, "state {} -> {}", from, to),
            Self::Attempt(attempt) if attempt.raw_detail.is_empty() => {
                write!(f, "attempt {}: {}", attempt.number, attempt.outcome.message())
            }
            Self::Attempt(attempt) => write!(
                f,
                "attempt {}: {} [{}]",
                attempt.number,
                attempt.outcome.message(),
                attempt.raw_detail
            ),
            Self::Finished {
                success: true,
                attempts,
            } => write!(f, "connection OK!. verdict=success attempts={}", attempts),
            Self::Finished {
                success: false,
                attempts,
            } => write!(f, "giving up. verdict=failure attempts={}", attempts),
            Self::Cancelled { attempts } => {
                write!(f, "cancelled after {} attempt(s), no verdict written", attempts)
            }
        }
    }
}

/// Sink for status trail entries
///
/// Write failures are surfaced to the caller; losing the trail is treated
/// as fatal.
pub trait StatusLog {
    fn record(&mut self, entry: &LogEntry) -> io::Result<()>;
}

impl<L: StatusLog + ?Sized> StatusLog for &mut L {
    fn record(&mut self, entry: &LogEntry) -> io::Result<()> {
        (**self).record(entry)
    }
}

/// Status trail backed by a file opened in append mode
#[derive(Debug)]
pub struct FileStatusLog {
    path: PathBuf,
    file: File,
}

impl FileStatusLog {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatusLog for FileStatusLog {
    fn record(&mut self, entry: &LogEntry) -> io::Result<()> {
        // One write per line so concurrent appenders never interleave mid-line
        let line = format!(
            "{} {}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            entry
        );
        self.file.write_all(line.as_bytes())?;
        self.file.flush()
    }
}

/// In-memory trail for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStatusLog {
    pub entries: Vec<LogEntry>,
    /// Fail every write after this many entries
    pub fail_after: Option<usize>,
}

#[cfg(test)]
impl MemoryStatusLog {
    pub fn attempts(&self) -> Vec<&ProbeAttempt> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                LogEntry::Attempt(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    pub fn transitions(&self) -> Vec<(ProbeState, ProbeState)> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                LogEntry::Transition { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
impl StatusLog for MemoryStatusLog {
    fn record(&mut self, entry: &LogEntry) -> io::Result<()> {
        if self.fail_after.is_some_and(|n| self.entries.len() >= n) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.entries.push(entry.clone());
        Ok(())
    }
}
