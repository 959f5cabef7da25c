use std::path::PathBuf;

use serde::Deserialize;

use super::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Retry policy for the connectivity probe
    #[serde(default)]
    pub probe: ProbeConfig,
    /// Where the probe reads its topology and writes its artifacts
    #[serde(default)]
    pub output: OutputConfig,
}

// ============================================================================
// Probe Configuration
// ============================================================================

/// Retry and timeout settings for the probe loop
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Sleep between failed attempts (milliseconds)
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    /// Upper bound for a single connection attempt (milliseconds)
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,
    /// Give up after this many attempts. Absent means retry until connected.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_check_interval_ms() -> u64 {
    5000
}

fn default_check_timeout_ms() -> u64 {
    3000
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_check_interval_ms(),
            check_timeout_ms: default_check_timeout_ms(),
            max_attempts: None,
        }
    }
}

// ============================================================================
// Output Locations
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// `key=value` member list
    #[serde(default = "default_topology_path")]
    pub topology: PathBuf,
    /// Verdict token polled by readiness checks
    #[serde(default = "default_verdict_path")]
    pub verdict_path: PathBuf,
    /// Append-only status trail
    #[serde(default = "default_status_log")]
    pub status_log: PathBuf,
    /// PID record written when running in the background
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,
    /// Diagnostic tracing output in daemon mode (discarded when unset)
    #[serde(default)]
    pub trace_log: Option<PathBuf>,
}

fn default_topology_path() -> PathBuf {
    PathBuf::from("replica_set_verifier.conf")
}

fn default_verdict_path() -> PathBuf {
    PathBuf::from("/var/run/rs_verifier.verdict")
}

fn default_status_log() -> PathBuf {
    PathBuf::from("/var/log/rs_verifier.log")
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("rs_verifier.pid")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            topology: default_topology_path(),
            verdict_path: default_verdict_path(),
            status_log: default_status_log(),
            pid_file: default_pid_file(),
            trace_log: None,
        }
    }
}

impl Settings {
    /// Reject combinations the probe loop cannot honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        let probe = &self.probe;
        if probe.check_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "check_interval_ms must be greater than 0".into(),
            ));
        }
        if probe.check_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "check_timeout_ms must be greater than 0".into(),
            ));
        }
        if probe.check_timeout_ms >= probe.check_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "check_timeout_ms ({}) must be shorter than check_interval_ms ({})",
                probe.check_timeout_ms, probe.check_interval_ms
            )));
        }
        if probe.max_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "max_attempts must be at least 1 (omit it to retry forever)".into(),
            ));
        }
        Ok(())
    }
}
