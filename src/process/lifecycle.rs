//! Launching, watching and stopping the server process.
//!
//! The server runs as a direct child of the supervisor with stdout and
//! stderr appended to the replica's capture file. It is not detached: if the
//! supervisor goes away the child is killed with it.

use std::fs::{self, OpenOptions};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use super::log_rotation::rotate_log_if_needed;
use super::types::{LaunchSpec, LogRotationConfig, ProcessHandle, ProcessState};
use crate::constants::{ENV_RUNTIME_MODE, REAP_TIMEOUT_MS, TERMINATE_POLL_MS};
use crate::error::{Error, Result};

struct Tracked {
    child: Child,
    handle: ProcessHandle,
}

/// Owns at most one running server process.
///
/// # Example
///
/// ```no_run
/// use natsvisor::process::{LaunchSpec, ProcessSupervisor};
/// use natsvisor::render::NodePaths;
/// use std::time::Duration;
///
/// # async fn demo() -> natsvisor::Result<()> {
/// let paths = NodePaths::new("/tmp/natsvisor", "1");
/// let mut supervisor = ProcessSupervisor::new();
/// let handle = supervisor.start(&LaunchSpec::new("nats-server", &paths, "."))?;
/// assert!(supervisor.is_alive(&handle));
/// supervisor.terminate(Duration::from_secs(5)).await;
/// # Ok(())
/// # }
/// ```
pub struct ProcessSupervisor {
    tracked: Option<Tracked>,
    state: ProcessState,
    rotation: LogRotationConfig,
    generation: u64,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    /// Supervisor with default capture rotation.
    pub fn new() -> Self {
        Self::with_rotation(LogRotationConfig::default())
    }

    /// Supervisor with custom capture rotation.
    pub fn with_rotation(rotation: LogRotationConfig) -> Self {
        Self {
            tracked: None,
            state: ProcessState::NotStarted,
            rotation,
            generation: 0,
        }
    }

    /// Last observed state. Call [`poll`](Self::poll) to refresh it.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Launch the server: `<executable> -c <config> -l <log>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessAlreadyRunning`] while a previous launch is
    /// still alive, and [`Error::ProcessLaunch`] if the capture file cannot
    /// be opened or the executable cannot be spawned.
    pub fn start(&mut self, spec: &LaunchSpec) -> Result<ProcessHandle> {
        self.poll();
        if let Some(tracked) = &self.tracked {
            return Err(Error::ProcessAlreadyRunning {
                pid: tracked.handle.pid,
            });
        }

        self.state = ProcessState::Starting;
        match self.spawn(spec) {
            Ok(child) => {
                self.generation += 1;
                let handle = ProcessHandle {
                    pid: child.id(),
                    generation: self.generation,
                    started_at: Instant::now(),
                };
                tracing::info!(
                    pid = handle.pid,
                    executable = %spec.executable.display(),
                    config = %spec.config_path.display(),
                    log = %spec.log_path.display(),
                    "Launched server"
                );
                self.state = ProcessState::Running { pid: handle.pid };
                self.tracked = Some(Tracked { child, handle });
                Ok(handle)
            },
            Err(e) => {
                self.state = ProcessState::NotStarted;
                Err(e)
            },
        }
    }

    fn spawn(&self, spec: &LaunchSpec) -> Result<Child> {
        let launch_err = |source| Error::ProcessLaunch {
            executable: spec.executable.clone(),
            source,
        };

        if let Some(parent) = spec.capture_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(launch_err)?;
        }

        if let Err(e) = rotate_log_if_needed(&spec.capture_path, &self.rotation) {
            tracing::warn!(
                path = %spec.capture_path.display(),
                error = %e,
                "Failed to rotate server output, appending"
            );
        }

        let capture = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&spec.capture_path)
            .map_err(launch_err)?;
        let capture_err = capture.try_clone().map_err(launch_err)?;

        Command::new(&spec.executable)
            .arg("-c")
            .arg(&spec.config_path)
            .arg("-l")
            .arg(&spec.log_path)
            .current_dir(&spec.working_dir)
            .env(ENV_RUNTIME_MODE, "1")
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(capture)
            .stderr(capture_err)
            .spawn()
            .map_err(launch_err)
    }

    /// Refresh and return the process state, reaping an exited child.
    pub fn poll(&mut self) -> ProcessState {
        let Some(tracked) = &mut self.tracked else {
            return self.state;
        };
        let pid = tracked.handle.pid;

        match tracked.child.try_wait() {
            Ok(None) => {},
            Ok(Some(status)) => {
                tracing::info!(pid, status = %status, "Server exited");
                self.state = ProcessState::Exited {
                    pid,
                    code: status.code(),
                };
                self.tracked = None;
            },
            Err(e) => {
                // The child can no longer be observed. Kill it before letting
                // go so a live server is never left untracked.
                tracing::warn!(pid, error = %e, "Failed to query server status, killing");
                if let Some(mut tracked) = self.tracked.take() {
                    send_kill(&mut tracked.child, pid);
                }
                self.state = ProcessState::Exited { pid, code: None };
            },
        }
        self.state
    }

    /// Whether the process behind `handle` is still running.
    ///
    /// Never fails: an unknown, stale or reaped handle reads as not alive.
    pub fn is_alive(&mut self, handle: &ProcessHandle) -> bool {
        self.poll();
        self.tracked
            .as_ref()
            .is_some_and(|t| t.handle.generation == handle.generation)
    }

    /// Stop the running process, if any.
    ///
    /// Asks the process to stop (SIGTERM on Unix), waits up to `grace` for it
    /// to exit, then kills it. Failures are logged and otherwise ignored; a
    /// process that already exited is a no-op.
    pub async fn terminate(&mut self, grace: Duration) {
        self.poll();
        let Some(mut tracked) = self.tracked.take() else {
            return;
        };
        let pid = tracked.handle.pid;

        if request_stop(pid) {
            let deadline = Instant::now() + grace;
            loop {
                match tracked.child.try_wait() {
                    Ok(Some(status)) => {
                        tracing::info!(pid, status = %status, "Server stopped");
                        self.state = ProcessState::Terminated { pid };
                        return;
                    },
                    Ok(None) if Instant::now() < deadline => {
                        tokio::time::sleep(Duration::from_millis(TERMINATE_POLL_MS)).await;
                    },
                    Ok(None) => {
                        tracing::warn!(
                            pid,
                            grace_ms = grace.as_millis(),
                            "Server didn't stop within grace period, killing"
                        );
                        break;
                    },
                    Err(e) => {
                        tracing::debug!(pid, error = %e, "Failed to query server status");
                        break;
                    },
                }
            }
        }

        send_kill(&mut tracked.child, pid);
        reap(&mut tracked.child, pid).await;
        self.state = ProcessState::Terminated { pid };
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if let Some(mut tracked) = self.tracked.take()
            && matches!(tracked.child.try_wait(), Ok(None))
        {
            let pid = tracked.handle.pid;
            tracing::debug!(pid, "Killing server on supervisor drop");
            send_kill(&mut tracked.child, pid);
            // Drop cannot await; the wait is short after SIGKILL.
            if let Err(e) = tracked.child.wait() {
                tracing::debug!(pid, error = %e, "Failed to reap server");
            }
        }
    }
}

/// Sends the graceful stop request. Returns false if it could not be sent.
#[cfg(unix)]
fn request_stop(pid: u32) -> bool {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid as NixPid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match signal::kill(NixPid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            let err = Error::Termination {
                pid,
                reason: format!("SIGTERM failed: {e}"),
            };
            tracing::debug!(error = %err, "Falling back to kill");
            false
        },
    }
}

#[cfg(not(unix))]
fn request_stop(_pid: u32) -> bool {
    false
}

fn send_kill(child: &mut Child, pid: u32) {
    if let Err(e) = child.kill() {
        let err = Error::Termination {
            pid,
            reason: format!("kill failed: {e}"),
        };
        tracing::debug!(error = %err, "Ignoring termination failure");
    }
}

/// Wait for a killed child to exit without blocking the runtime.
async fn reap(child: &mut Child, pid: u32) {
    let deadline = Instant::now() + Duration::from_millis(REAP_TIMEOUT_MS);
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) if Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(TERMINATE_POLL_MS)).await;
            },
            Ok(None) => {
                tracing::warn!(pid, "Killed server not reaped in time");
                return;
            },
            Err(e) => {
                tracing::debug!(pid, error = %e, "Failed to reap server");
                return;
            },
        }
    }
}
