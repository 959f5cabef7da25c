mod cli;
mod config;
mod daemon;
mod probe;
mod status;
mod topology;
mod verdict;
mod verifier;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use config::{ConfigError, OutputConfig, Settings};
use daemon::Daemonized;
use probe::{MongoClusterClient, RetryPolicy};
use status::{FileStatusLog, LogEntry, StatusLog};
use verdict::FileVerdictSink;
use verifier::RunOutcome;

/// Retry limit reached; a failure verdict was published
const EXIT_EXHAUSTED: u8 = 1;
/// Settings or topology unusable; nothing was probed
const EXIT_CONFIG: u8 = 2;
/// Status trail or verdict could not be written
const EXIT_PERSISTENCE: u8 = 3;

const SETTINGS_PATHS: [&str; 2] = ["rs_verifier.toml", "config/rs_verifier.toml"];

fn main() -> anyhow::Result<ExitCode> {
    let args = cli::Args::parse();

    // Tracing is not up yet: it is initialized after the fork
    let (mut settings, source) = match load_or_default_settings(args.settings.as_deref()) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("rs-verifier: {}", e);
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };
    args.apply(&mut settings);
    if let Err(e) = settings.validate() {
        eprintln!("rs-verifier: {}", e);
        return Ok(ExitCode::from(EXIT_CONFIG));
    }
    absolutize_paths(&mut settings.output).context("Failed to resolve relative paths")?;

    if args.check {
        return Ok(check_verdict(&settings.output.verdict_path));
    }

    if !args.foreground {
        match daemon::daemonize(&settings.output.pid_file)? {
            Daemonized::Parent { child } => {
                println!("process_id of child process {}", child);
                return Ok(ExitCode::SUCCESS);
            }
            Daemonized::Child => {}
        }
    }

    init_tracing(args.foreground, settings.output.trace_log.as_deref())?;
    match &source {
        Some(path) => info!(path = %path.display(), "Loaded settings"),
        None => info!("Using default settings"),
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    runtime.block_on(run(settings))
}

async fn run(settings: Settings) -> anyhow::Result<ExitCode> {
    let mut status = match FileStatusLog::open(&settings.output.status_log) {
        Ok(log) => log,
        Err(e) => {
            error!(path = %settings.output.status_log.display(), error = %e, "Failed to open status log");
            return Ok(ExitCode::from(EXIT_PERSISTENCE));
        }
    };

    let parsed = match config::load_topology_or_fallback(&settings.output.topology) {
        Ok(parsed) => parsed,
        Err(e) => {
            error!(path = %settings.output.topology.display(), error = %e, "Unusable topology");
            if let Err(log_err) = status.record(&LogEntry::ConfigWarning(e.to_string())) {
                error!(path = %status.path().display(), error = %log_err, "Failed to write status log");
            }
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };
    for warning in &parsed.warnings {
        warn!(path = %settings.output.topology.display(), warning = %warning, "Topology entry skipped");
        if let Err(e) = status.record(&LogEntry::ConfigWarning(warning.to_string())) {
            error!(path = %status.path().display(), error = %e, "Failed to write status log");
            return Ok(ExitCode::from(EXIT_PERSISTENCE));
        }
    }

    let cancel = CancellationToken::new();
    let _signals = daemon::spawn_shutdown_listener(cancel.clone())
        .context("Failed to install signal handlers")?;

    let policy = RetryPolicy::from(&settings.probe);
    let client = MongoClusterClient::new(policy.attempt_timeout);
    let sink = FileVerdictSink::new(&settings.output.verdict_path);
    info!(
        verdict = %sink.path().display(),
        status_log = %status.path().display(),
        bounded = policy.is_bounded(),
        "Probe configured"
    );

    let outcome = verifier::run(&parsed.topology, client, &mut status, &sink, policy, &cancel).await;
    match outcome {
        Ok(RunOutcome::Connected(_)) | Ok(RunOutcome::Cancelled) => Ok(ExitCode::SUCCESS),
        Ok(RunOutcome::Exhausted(_)) => Ok(ExitCode::from(EXIT_EXHAUSTED)),
        Err(e) => {
            error!(error = %e, "Verification aborted");
            Ok(ExitCode::from(EXIT_PERSISTENCE))
        }
    }
}

fn load_or_default_settings(
    explicit: Option<&Path>,
) -> Result<(Settings, Option<PathBuf>), ConfigError> {
    if let Some(path) = explicit {
        return Ok((config::load_settings(path)?, Some(path.to_path_buf())));
    }

    // A present-but-broken file is an error, a missing one is not
    for path in SETTINGS_PATHS.iter().map(Path::new) {
        if path.exists() {
            return Ok((config::load_settings(path)?, Some(path.to_path_buf())));
        }
    }

    Ok((Settings::default(), None))
}

/// Readiness check for external pollers: succeed only on a success token
fn check_verdict(path: &Path) -> ExitCode {
    match verdict::read_verdict(path) {
        Ok(v) if v.success => {
            println!("ready: replica set '{}' at {}", v.replica_set, v.timestamp);
            ExitCode::SUCCESS
        }
        Ok(v) => {
            println!(
                "not ready: replica set '{}' unreachable after {} attempt(s) at {}",
                v.replica_set, v.attempts, v.timestamp
            );
            ExitCode::from(EXIT_EXHAUSTED)
        }
        Err(e) => {
            println!("not ready: {}", e);
            ExitCode::from(EXIT_EXHAUSTED)
        }
    }
}

/// The daemon changes directory to `/`, so relative paths are pinned first
fn absolutize_paths(output: &mut OutputConfig) -> std::io::Result<()> {
    output.topology = daemon::absolutize(&output.topology)?;
    output.verdict_path = daemon::absolutize(&output.verdict_path)?;
    output.status_log = daemon::absolutize(&output.status_log)?;
    output.pid_file = daemon::absolutize(&output.pid_file)?;
    if let Some(path) = output.trace_log.take() {
        output.trace_log = Some(daemon::absolutize(&path)?);
    }
    Ok(())
}

fn init_tracing(foreground: bool, trace_log: Option<&Path>) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(
        EnvFilter::builder()
            .with_default_directive(Level::INFO.into())
            .from_env_lossy(),
    );

    match (foreground, trace_log) {
        (true, _) => builder.with_writer(std::io::stderr).init(),
        (false, Some(path)) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open trace log {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        (false, None) => builder.with_writer(std::io::sink).init(),
    }
    Ok(())
}
