//! Daemon process supervision.
//!
//! The supervisor launches the daemon once, forwards its output to the log,
//! records its exit and signals it on shutdown. It never restarts a daemon
//! that died; queries simply fail at the proxy until an operator restarts
//! the whole server.

use std::path::{Component, Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use hmsconsole_config::DaemonConfig;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Lifecycle of the supervised daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DaemonState::Stopped => "stopped",
            DaemonState::Starting => "starting",
            DaemonState::Running => "running",
            DaemonState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Daemon is already {0}")]
    AlreadyActive(DaemonState),

    #[error("Failed to spawn daemon {path:?}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

/// A running daemon: the stop trigger and the task that owns the child.
struct ProcessHandle {
    stop_tx: oneshot::Sender<()>,
    exited: JoinHandle<Option<ExitStatus>>,
}

pub struct DaemonSupervisor {
    config: DaemonConfig,
    state: Arc<watch::Sender<DaemonState>>,
    process: Mutex<Option<ProcessHandle>>,
}

impl DaemonSupervisor {
    pub fn new(config: DaemonConfig) -> Self {
        let (state, _) = watch::channel(DaemonState::Stopped);
        Self {
            config,
            state: Arc::new(state),
            process: Mutex::new(None),
        }
    }

    pub fn state(&self) -> DaemonState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DaemonState> {
        self.state.subscribe()
    }

    /// Launch the daemon from its working directory, with no arguments.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let mut process = self.process.lock().await;
        let current = self.state();
        if current != DaemonState::Stopped {
            return Err(SupervisorError::AlreadyActive(current));
        }
        if let Some(stale) = process.take() {
            // Previous daemon exited on its own; its task has already finished.
            let _ = stale.exited.await;
        }

        self.state.send_replace(DaemonState::Starting);
        let program = resolve_program(&self.config.binary, &self.config.working_dir);
        info!(binary = ?program, cwd = ?self.config.working_dir, "Starting daemon");

        let spawned = Command::new(&program)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                self.state.send_replace(DaemonState::Stopped);
                return Err(SupervisorError::Spawn { path: program, source });
            }
        };

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, OutputStream::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, OutputStream::Stderr));
        }

        let pid = child.id();
        // Set before supervision starts so an early exit is never overwritten.
        self.state.send_replace(DaemonState::Running);
        info!(pid = ?pid, "Daemon running");

        let (stop_tx, stop_rx) = oneshot::channel();
        let exited = tokio::spawn(supervise(
            child,
            stop_rx,
            self.state.clone(),
            self.config.stop_timeout(),
        ));

        *process = Some(ProcessHandle { stop_tx, exited });
        Ok(())
    }

    /// Signal the daemon and wait for it to exit.
    ///
    /// Returns the exit status, or `None` if no daemon was ever started.
    pub async fn stop(&self) -> Option<ExitStatus> {
        let mut process = self.process.lock().await;
        let handle = process.take()?;

        if self.state() == DaemonState::Running {
            self.state.send_replace(DaemonState::Stopping);
            info!("Stopping daemon");
        }
        // Fails only when the daemon already exited; the join below still reaps it.
        let _ = handle.stop_tx.send(());

        match handle.exited.await {
            Ok(status) => status,
            Err(e) => {
                error!("Daemon supervision task failed: {}", e);
                self.state.send_replace(DaemonState::Stopped);
                None
            }
        }
    }
}

/// Bare names go through PATH; relative paths are taken from the working directory.
fn resolve_program(binary: &Path, working_dir: &Path) -> PathBuf {
    let bare = matches!(
        binary.components().collect::<Vec<_>>().as_slice(),
        [Component::Normal(_)]
    );
    if binary.is_absolute() || bare {
        return binary.to_path_buf();
    }
    let dir = std::env::current_dir()
        .map(|cwd| cwd.join(working_dir))
        .unwrap_or_else(|_| working_dir.to_path_buf());
    dir.join(binary)
}

async fn forward_output<R: AsyncRead + Unpin>(reader: R, stream: OutputStream) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);
                match stream {
                    OutputStream::Stdout => info!(target: "daemon", "{}", line),
                    OutputStream::Stderr => warn!(target: "daemon", "{}", line),
                }
            }
            Err(e) => {
                debug!("Daemon {:?} closed: {}", stream, e);
                break;
            }
        }
    }
}

/// Owns the child until it exits, either on its own or after `stop_rx` fires.
async fn supervise(
    mut child: Child,
    stop_rx: oneshot::Receiver<()>,
    state: Arc<watch::Sender<DaemonState>>,
    grace: Duration,
) -> Option<ExitStatus> {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = stop_rx => {
            terminate(&mut child);
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!("Daemon ignored termination for {:?}, killing it", grace);
                    let _ = child.start_kill();
                    child.wait().await
                }
            }
        }
    };

    let status = match status {
        Ok(status) => {
            log_exit(&status);
            Some(status)
        }
        Err(e) => {
            error!("Failed to wait for daemon: {}", e);
            None
        }
    };
    state.send_replace(DaemonState::Stopped);
    status
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: plain kill(2) on a pid we spawned and have not reaped yet.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc == 0 {
            return;
        }
    }
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}

fn log_exit(status: &ExitStatus) {
    if let Some(code) = status.code() {
        info!(code, "Daemon process exited with code {}", code);
        return;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            info!(signal, "Daemon process terminated by signal {}", signal);
            return;
        }
    }
    info!("Daemon process exited");
}
