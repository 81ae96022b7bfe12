use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::oneshot;

use crate::error::{FatalError, LaunchError};

use super::exit::exit_event;

/// Everything needed to start one nvmecmd process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub work_dir: PathBuf,
    pub timeout: Duration,
}

/// The single terminal event a supervised process produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// `exit_code` is `None` when the supervisor killed the process, either
    /// because the timer fired (`timed_out`) or because of `cancel`.
    Exited {
        exit_code: Option<i32>,
        timed_out: bool,
    },
    StartFailed {
        reason: String,
    },
    /// The process died from an outside signal, or waiting on it failed.
    Crashed {
        reason: String,
    },
}

pub struct ProcessSupervisor;

impl ProcessSupervisor {
    /// Spawns the tool and returns immediately. The timeout timer is armed only
    /// once the spawn call has returned a live child.
    pub fn start(spec: LaunchSpec) -> SupervisedProcess {
        let (done_tx, done_rx) = oneshot::channel();

        let spawned = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(source) => {
                let reason = source.to_string();
                let err = LaunchError::Spawn {
                    program: spec.program.display().to_string(),
                    source,
                };
                tracing::error!(
                    target: "nvmeinfo.supervisor",
                    cwd = %spec.work_dir.display(),
                    reason = %reason,
                    "{err}"
                );
                let _ = done_tx.send(TerminalEvent::StartFailed { reason });
                return SupervisedProcess {
                    pid: None,
                    cancel_tx: None,
                    done_rx,
                };
            }
        };

        let pid = child.id();
        tracing::debug!(
            target: "nvmeinfo.supervisor",
            pid = ?pid,
            program = %spec.program.display(),
            args = ?spec.args,
            cwd = %spec.work_dir.display(),
            timeout_ms = spec.timeout.as_millis() as u64,
            "nvmecmd started"
        );

        let (cancel_tx, cancel_rx) = oneshot::channel();
        tokio::spawn(watch(child, spec.timeout, cancel_rx, done_tx));

        SupervisedProcess {
            pid,
            cancel_tx: Some(cancel_tx),
            done_rx,
        }
    }
}

/// Handle to one spawned process. Owned by the coordinator and never shared.
pub struct SupervisedProcess {
    pid: Option<u32>,
    cancel_tx: Option<oneshot::Sender<()>>,
    done_rx: oneshot::Receiver<TerminalEvent>,
}

impl SupervisedProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Asks the watcher to kill the process. Calling it again, after the
    /// process exited, or on a handle that never started is a no-op.
    pub fn cancel(&mut self) {
        match self.cancel_tx.take() {
            Some(tx) => {
                if tx.send(()).is_err() {
                    tracing::debug!(target: "nvmeinfo.supervisor", pid = ?self.pid, "cancel after exit ignored");
                }
            }
            None => {
                tracing::debug!(target: "nvmeinfo.supervisor", pid = ?self.pid, "nvmecmd not running");
            }
        }
    }

    /// Resolves once with the terminal event. Must not be polled again after it
    /// has returned.
    pub async fn wait(&mut self) -> Result<TerminalEvent, FatalError> {
        (&mut self.done_rx)
            .await
            .map_err(|_| FatalError::Internal("process watcher dropped without reporting".into()))
    }

    /// Handle whose process ignores `cancel` and ends only when the returned
    /// sender fires.
    #[cfg(test)]
    pub(crate) fn unkillable() -> (Self, oneshot::Sender<TerminalEvent>) {
        let (done_tx, done_rx) = oneshot::channel();
        let process = Self {
            pid: Some(u32::MAX),
            cancel_tx: None,
            done_rx,
        };
        (process, done_tx)
    }
}

enum Wake {
    Exited(std::io::Result<ExitStatus>),
    Deadline,
    Cancelled,
}

async fn watch(
    mut child: Child,
    timeout: Duration,
    mut cancel_rx: oneshot::Receiver<()>,
    done_tx: oneshot::Sender<TerminalEvent>,
) {
    let pid = child.id();

    // Armed once here; dropped with this frame, so it can fire at most once.
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let wake = tokio::select! {
        res = child.wait() => Wake::Exited(res),
        _ = &mut deadline => Wake::Deadline,
        Ok(()) = &mut cancel_rx => Wake::Cancelled,
    };

    let event = match wake {
        Wake::Exited(Ok(status)) => {
            let event = exit_event(status);
            if let TerminalEvent::Crashed { reason } = &event {
                tracing::error!(target: "nvmeinfo.supervisor", pid = ?pid, "nvmecmd {reason}");
            }
            event
        }
        Wake::Exited(Err(e)) => {
            tracing::error!(target: "nvmeinfo.supervisor", pid = ?pid, error = %e, "waiting on nvmecmd failed");
            TerminalEvent::Crashed {
                reason: format!("could not be waited on: {e}"),
            }
        }
        Wake::Deadline => {
            tracing::warn!(
                target: "nvmeinfo.supervisor",
                pid = ?pid,
                timeout_ms = timeout.as_millis() as u64,
                "nvmecmd timed out, killing"
            );
            kill(&mut child, pid).await;
            TerminalEvent::Exited {
                exit_code: None,
                timed_out: true,
            }
        }
        Wake::Cancelled => {
            tracing::info!(target: "nvmeinfo.supervisor", pid = ?pid, "aborting nvmecmd");
            kill(&mut child, pid).await;
            TerminalEvent::Exited {
                exit_code: None,
                timed_out: false,
            }
        }
    };

    if done_tx.send(event).is_err() {
        tracing::debug!(target: "nvmeinfo.supervisor", pid = ?pid, "terminal event dropped, owner gone");
    }
}

async fn kill(child: &mut Child, pid: Option<u32>) {
    if let Err(e) = child.start_kill() {
        tracing::warn!(target: "nvmeinfo.supervisor", pid = ?pid, error = %e, "kill failed");
    }
    match child.wait().await {
        Ok(status) => {
            tracing::debug!(target: "nvmeinfo.supervisor", pid = ?pid, status = %status, "nvmecmd reaped");
        }
        Err(e) => {
            tracing::warn!(target: "nvmeinfo.supervisor", pid = ?pid, error = %e, "reaping nvmecmd failed");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> LaunchSpec {
        LaunchSpec {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), script.into()],
            work_dir: std::env::temp_dir(),
            timeout,
        }
    }

    #[tokio::test]
    async fn natural_exit_reports_code() {
        let mut p = ProcessSupervisor::start(sh("exit 3", Duration::from_secs(5)));
        assert!(p.pid().is_some());
        let ev = p.wait().await.unwrap();
        assert_eq!(
            ev,
            TerminalEvent::Exited {
                exit_code: Some(3),
                timed_out: false
            }
        );
    }

    #[tokio::test]
    async fn timeout_kills_and_flags() {
        let started = std::time::Instant::now();
        let mut p = ProcessSupervisor::start(sh("sleep 30", Duration::from_millis(200)));
        let ev = p.wait().await.unwrap();
        assert_eq!(
            ev,
            TerminalEvent::Exited {
                exit_code: None,
                timed_out: true
            }
        );
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let mut p = ProcessSupervisor::start(sh("sleep 30", Duration::from_secs(30)));
        p.cancel();
        p.cancel();
        let ev = p.wait().await.unwrap();
        assert_eq!(
            ev,
            TerminalEvent::Exited {
                exit_code: None,
                timed_out: false
            }
        );
        p.cancel();
    }

    #[tokio::test]
    async fn cancel_after_exit_is_noop() {
        let mut p = ProcessSupervisor::start(sh("exit 0", Duration::from_secs(5)));
        let ev = p.wait().await.unwrap();
        assert_eq!(
            ev,
            TerminalEvent::Exited {
                exit_code: Some(0),
                timed_out: false
            }
        );
        p.cancel();
        p.cancel();
    }

    #[tokio::test]
    async fn outside_kill_is_a_crash_not_an_abort() {
        let mut p = ProcessSupervisor::start(sh("kill -9 $$; sleep 5", Duration::from_secs(10)));
        let ev = p.wait().await.unwrap();
        assert_eq!(
            ev,
            TerminalEvent::Crashed {
                reason: "terminated by signal 9".into()
            }
        );
    }

    #[tokio::test]
    async fn missing_executable_fails_to_start() {
        let mut p = ProcessSupervisor::start(LaunchSpec {
            program: PathBuf::from("/nonexistent/nvmecmd"),
            args: vec![],
            work_dir: std::env::temp_dir(),
            timeout: Duration::from_millis(50),
        });
        assert!(p.pid().is_none());
        p.cancel();
        match p.wait().await.unwrap() {
            TerminalEvent::StartFailed { reason } => assert!(!reason.is_empty()),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
