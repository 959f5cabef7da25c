mod schema;
mod topology_file;

pub use schema::*;
pub use topology_file::load_topology_or_fallback;

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to open config source {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Skipping line {line}: {reason}")]
    MalformedEntry { line: usize, reason: String },
    #[error("Ignoring {ignored} member(s) beyond number_of_servers={limit}")]
    MemberLimitExceeded { limit: usize, ignored: usize },
    #[error("No members configured for replica set '{0}'")]
    EmptyTopology(String),
    #[error("Failed to read settings file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid settings: {0}")]
    Invalid(String),
}

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let settings: Settings = toml::from_str(&content)?;
    Ok(settings)
}
