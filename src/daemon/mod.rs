//! Host-process plumbing: backgrounding, PID record, shutdown signals
//!
//! Forking happens before the async runtime or any probe state exists, so
//! the child starts from a clean slate.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use nix::sys::stat::{umask, Mode};
use nix::unistd::{chdir, dup2, fork, setsid, ForkResult, Pid};
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("fork failed: {0}")]
    Fork(nix::Error),
    #[error("setsid failed: {0}")]
    Setsid(nix::Error),
    #[error("failed to detach: {0}")]
    Detach(nix::Error),
    #[error("failed to write pid file {}: {source}", path.display())]
    PidFile { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Which side of the fork we are on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Daemonized {
    /// Original process; it should exit right away
    Parent { child: Pid },
    /// Detached background process
    Child,
}

/// Detach from the terminal.
///
/// The parent records the child's PID in `pid_file`. The child gets a new
/// session, a zero umask, `/` as working directory and stdio on
/// `/dev/null`. Callers must resolve relative paths beforehand.
pub fn daemonize(pid_file: &Path) -> Result<Daemonized, DaemonError> {
    // SAFETY: called from main before any threads are spawned
    match unsafe { fork() }.map_err(DaemonError::Fork)? {
        ForkResult::Parent { child } => {
            std::fs::write(pid_file, child.to_string()).map_err(|source| {
                DaemonError::PidFile {
                    path: pid_file.to_path_buf(),
                    source,
                }
            })?;
            Ok(Daemonized::Parent { child })
        }
        ForkResult::Child => {
            setsid().map_err(DaemonError::Setsid)?;
            umask(Mode::empty());
            chdir("/").map_err(DaemonError::Detach)?;

            let devnull = OpenOptions::new().read(true).write(true).open("/dev/null")?;
            for fd in 0..=2 {
                dup2(devnull.as_raw_fd(), fd).map_err(DaemonError::Detach)?;
            }
            Ok(Daemonized::Child)
        }
    }
}

/// Resolve `path` against the current directory
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Cancel `token` on SIGTERM or SIGINT. Must be called inside the runtime.
pub fn spawn_shutdown_listener(token: CancellationToken) -> io::Result<JoinHandle<()>> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = terminate.recv() => info!(signal = "SIGTERM", "Shutdown requested"),
            _ = interrupt.recv() => info!(signal = "SIGINT", "Shutdown requested"),
            _ = token.cancelled() => return,
        }
        token.cancel();
    }))
}
