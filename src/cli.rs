use std::path::PathBuf;

use clap::Parser;

use crate::config::Settings;

/// Check whether a MongoDB replica set is reachable and has a primary
#[derive(Debug, Parser)]
#[command(name = "rs-verifier", version, about)]
pub struct Args {
    /// TOML settings file (default: rs_verifier.toml or config/rs_verifier.toml if present)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Member list in key=value format
    #[arg(long)]
    pub topology: Option<PathBuf>,

    /// Where to write the verdict token
    #[arg(long)]
    pub verdict: Option<PathBuf>,

    /// Append-only status trail
    #[arg(long)]
    pub status_log: Option<PathBuf>,

    /// PID record for the background process
    #[arg(long)]
    pub pid_file: Option<PathBuf>,

    /// Give up after this many attempts
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Sleep between attempts, in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Per-attempt timeout, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Stay attached to the terminal instead of daemonizing
    #[arg(long)]
    pub foreground: bool,

    /// Only read the verdict token and exit 0 if it reports success
    #[arg(long)]
    pub check: bool,
}

impl Args {
    /// Overlay command-line values on loaded settings
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(path) = &self.topology {
            settings.output.topology = path.clone();
        }
        if let Some(path) = &self.verdict {
            settings.output.verdict_path = path.clone();
        }
        if let Some(path) = &self.status_log {
            settings.output.status_log = path.clone();
        }
        if let Some(path) = &self.pid_file {
            settings.output.pid_file = path.clone();
        }
        if let Some(n) = self.max_attempts {
            settings.probe.max_attempts = Some(n);
        }
        if let Some(ms) = self.interval_ms {
            settings.probe.check_interval_ms = ms;
        }
        if let Some(ms) = self.timeout_ms {
            settings.probe.check_timeout_ms = ms;
        }
    }
}
