//! Verdict token
//!
//! Deployment tooling polls this file instead of embedding a MongoDB
//! client. It is replaced atomically so a reader sees either the previous
//! token or the new one in full.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Terminal result of a probe run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub replica_set: String,
    pub attempts: u32,
}

impl Verdict {
    pub fn new(success: bool, replica_set: impl Into<String>, attempts: u32) -> Self {
        Self {
            success,
            timestamp: Utc::now(),
            replica_set: replica_set.into(),
            attempts,
        }
    }
}

#[derive(Debug, Error)]
pub enum VerdictError {
    #[error("Failed to write verdict: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode verdict: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait VerdictSink {
    fn publish(&self, verdict: &Verdict) -> Result<(), VerdictError>;
}

/// Verdict persisted as a single JSON line at a fixed path
#[derive(Debug, Clone)]
pub struct FileVerdictSink {
    path: PathBuf,
}

impl FileVerdictSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl VerdictSink for FileVerdictSink {
    fn publish(&self, verdict: &Verdict) -> Result<(), VerdictError> {
        let dir = self.dir();
        std::fs::create_dir_all(dir)?;

        // Temp file must live on the same filesystem for rename to be atomic
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, verdict)?;
        tmp.write_all(b"\n")?;
        tmp.flush()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644))?;
        }
        tmp.as_file().sync_all()?;

        tmp.persist(&self.path).map_err(|e| VerdictError::Io(e.error))?;
        // The rename is only durable once the directory entry is flushed
        #[cfg(unix)]
        std::fs::File::open(dir)?.sync_all()?;
        debug!(path = %self.path.display(), success = verdict.success, "Verdict published");
        Ok(())
    }
}

/// Read a published token back
pub fn read_verdict<P: AsRef<Path>>(path: P) -> Result<Verdict, VerdictError> {
    let content = std::fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}
