use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{CoordinatorError, FatalError};
use crate::result::ResultLoader;
use crate::runner::{
    build_tool_args, classify, ExitSentinels, LaunchSpec, OutcomeKind, ProcessSupervisor, RunRequest,
    SupervisedProcess, TerminalEvent,
};
use crate::session::{LogSession, LogSessionAllocator};

use super::finish::{finish_run, Finish, FinishContext, FinishedRun};
use super::outcome::RunOutcome;
use super::resubmit::{PendingRun, ResubmitSchedule};
use super::sink::OutcomeSink;
use super::state::ProcessState;

/// Upper bound on waiting for a killed process during shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

enum Command {
    Submit(RunRequest),
    Cancel,
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable front door to the coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ProcessState>,
}

impl CoordinatorHandle {
    /// Queues a request. A request submitted while another run is active
    /// preempts it: the active process is cancelled and its outcome is never
    /// delivered.
    pub fn submit(&self, request: RunRequest) -> Result<(), CoordinatorError> {
        request.validate()?;
        self.tx
            .send(Command::Submit(request))
            .map_err(|_| CoordinatorError::Closed)
    }

    /// Aborts the active run, if any. The run still yields one outcome,
    /// classified as aborted by the user.
    pub fn cancel(&self) {
        if self.tx.send(Command::Cancel).is_err() {
            tracing::debug!(target: "nvmeinfo.coordinator", "cancel after coordinator exit ignored");
        }
    }

    /// Cancels the active run and stops the coordinator. Resolves once the
    /// coordinator task has finished its last delivery.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    pub fn state(&self) -> ProcessState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ProcessState> {
        self.state_rx.clone()
    }
}

pub struct RunCoordinator;

impl RunCoordinator {
    /// Starts the coordinator task. The join handle resolves with `Err` only
    /// for conditions that should end the application.
    pub fn spawn<S: OutcomeSink>(
        cfg: &AppConfig,
        sink: S,
    ) -> (CoordinatorHandle, JoinHandle<Result<(), FatalError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ProcessState::Idle);
        let actor = Actor::new(cfg, rx, state_tx, sink);

        tracing::debug!(
            target: "nvmeinfo.coordinator",
            log_root = %cfg.log_root.display(),
            program = %actor.program.display(),
            "run coordinator started"
        );

        let join = tokio::spawn(actor.run());
        (CoordinatorHandle { tx, state_rx }, join)
    }
}

struct ActiveRun {
    run_id: Uuid,
    request: RunRequest,
    session: LogSession,
    process: SupervisedProcess,
    started: Instant,
    superseded: bool,
}

enum Wake {
    Command(Command),
    Closed,
    Terminal(Result<TerminalEvent, FatalError>),
    Resubmit,
}

struct Actor<S> {
    rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ProcessState>,
    sink: S,
    allocator: LogSessionAllocator,
    loader: ResultLoader,
    program: PathBuf,
    read_template: PathBuf,
    tool_dir: PathBuf,
    timeout: Duration,
    sentinels: ExitSentinels,
    schedule: ResubmitSchedule,
    active: Option<ActiveRun>,
    pending: Option<PendingRun>,
}

impl<S: OutcomeSink> Actor<S> {
    fn new(
        cfg: &AppConfig,
        rx: mpsc::UnboundedReceiver<Command>,
        state_tx: watch::Sender<ProcessState>,
        sink: S,
    ) -> Self {
        Self {
            rx,
            state_tx,
            sink,
            allocator: LogSessionAllocator::new(cfg.log_root.clone()),
            loader: ResultLoader::from_tool(&cfg.tool),
            program: cfg.tool.executable_path(),
            read_template: cfg.tool.read_template_path(),
            tool_dir: cfg.tool.dir.clone(),
            timeout: cfg.tool.timeout(),
            sentinels: cfg.tool.sentinels(),
            schedule: ResubmitSchedule::from_config(&cfg.control),
            active: None,
            pending: None,
        }
    }

    async fn run(mut self) -> Result<(), FatalError> {
        loop {
            let resubmit_at = self.pending.as_ref().map(|p| p.due);

            let wake = tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => Wake::Command(cmd),
                    None => Wake::Closed,
                },
                ev = wait_active(&mut self.active) => Wake::Terminal(ev),
                _ = tokio::time::sleep_until(resubmit_at.unwrap_or_else(Instant::now)), if resubmit_at.is_some() => {
                    Wake::Resubmit
                }
            };

            match wake {
                Wake::Command(Command::Submit(request)) => self.on_submit(request)?,
                Wake::Command(Command::Cancel) => self.on_cancel(),
                Wake::Command(Command::Shutdown(ack)) => {
                    self.shutdown().await;
                    let _ = ack.send(());
                    return Ok(());
                }
                Wake::Closed => {
                    self.shutdown().await;
                    return Ok(());
                }
                Wake::Terminal(event) => self.on_terminal(event?).await?,
                Wake::Resubmit => self.on_resubmit_tick()?,
            }
        }
    }

    fn state(&self) -> ProcessState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, next: ProcessState) {
        let prev = self.state_tx.send_replace(next);
        if prev != next {
            tracing::trace!(target: "nvmeinfo.coordinator", ?prev, ?next, "state");
        }
    }

    fn on_submit(&mut self, request: RunRequest) -> Result<(), FatalError> {
        match self.active.as_mut() {
            None => {
                if let Some(dropped) = self.pending.take() {
                    tracing::debug!(
                        target: "nvmeinfo.coordinator",
                        kind = %dropped.request.kind,
                        "pending request replaced before it started"
                    );
                }
                self.start(request)
            }
            Some(active) => {
                if !active.superseded {
                    tracing::info!(
                        target: "nvmeinfo.coordinator",
                        run_id = %active.run_id,
                        kind = %active.request.kind,
                        next = %request.kind,
                        "preempting active run"
                    );
                }
                active.superseded = true;
                active.process.cancel();

                match self.pending.as_mut() {
                    Some(pending) => {
                        let dropped = pending.replace(request);
                        tracing::debug!(
                            target: "nvmeinfo.coordinator",
                            kind = %dropped.kind,
                            "pending request replaced before it started"
                        );
                    }
                    None => {
                        self.pending = Some(PendingRun::new(request, &self.schedule, Instant::now()));
                    }
                }
                Ok(())
            }
        }
    }

    fn on_cancel(&mut self) {
        match self.active.as_mut() {
            Some(active) => {
                tracing::info!(target: "nvmeinfo.coordinator", run_id = %active.run_id, "abort requested");
                active.process.cancel();
            }
            None => {
                tracing::debug!(target: "nvmeinfo.coordinator", "abort requested with no active run");
            }
        }
    }

    fn on_resubmit_tick(&mut self) -> Result<(), FatalError> {
        let Some(mut pending) = self.pending.take() else {
            return Ok(());
        };

        if self.active.is_none() {
            tracing::debug!(
                target: "nvmeinfo.coordinator",
                kind = %pending.request.kind,
                attempts = pending.attempts,
                "starting preempting request"
            );
            return self.start(pending.request);
        }

        if pending.reschedule(&self.schedule, Instant::now()) {
            self.pending = Some(pending);
            return Ok(());
        }

        tracing::error!(
            target: "nvmeinfo.coordinator",
            kind = %pending.request.kind,
            attempts = pending.attempts,
            "previous nvmecmd did not stop, request rejected"
        );
        let message = format!(
            "{} not started: previous nvmecmd did not stop",
            pending.request.kind.action()
        );
        self.deliver(RunOutcome::failure(
            OutcomeKind::Rejected,
            pending.request,
            PathBuf::new(),
            0.0,
            message,
            None,
        ));
        Ok(())
    }

    /// Allocates the session and spawns the tool. Only called while idle.
    fn start(&mut self, request: RunRequest) -> Result<(), FatalError> {
        debug_assert!(self.active.is_none());
        self.set_state(ProcessState::Starting);

        let started = Instant::now();
        let session = match self.allocator.allocate(request.kind, chrono::Local::now()) {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(target: "nvmeinfo.session", error = %e, "log session allocation failed");
                self.set_state(ProcessState::Idle);
                return Err(e.into());
            }
        };

        let args = build_tool_args(&request, &self.read_template, &session.dir);
        let process = ProcessSupervisor::start(LaunchSpec {
            program: self.program.clone(),
            args,
            work_dir: self.tool_dir.clone(),
            timeout: self.timeout,
        });

        let run_id = Uuid::new_v4();
        tracing::info!(
            target: "nvmeinfo.coordinator",
            run_id = %run_id,
            kind = %request.kind,
            drive = %request.drive_id,
            log_dir = %session.dir.display(),
            overhead_ms = started.elapsed().as_millis() as u64,
            "run started"
        );

        if process.pid().is_some() {
            self.set_state(ProcessState::Running);
        }

        self.active = Some(ActiveRun {
            run_id,
            request,
            session,
            process,
            started,
            superseded: false,
        });
        Ok(())
    }

    async fn on_terminal(&mut self, event: TerminalEvent) -> Result<(), FatalError> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };
        self.set_state(ProcessState::Finishing);

        let elapsed = active.started.elapsed();
        if active.superseded {
            tracing::info!(
                target: "nvmeinfo.coordinator",
                run_id = %active.run_id,
                event = ?event,
                elapsed_ms = elapsed.as_millis() as u64,
                "superseded run finished, outcome suppressed"
            );
            if let TerminalEvent::Exited {
                exit_code: Some(code),
                ..
            } = event
            {
                if classify(Some(code), false, &self.sentinels).is_fatal() {
                    self.set_state(ProcessState::Idle);
                    return Err(FatalError::NoTargets { exit_code: code });
                }
            }
            self.set_state(ProcessState::Idle);
            return Ok(());
        }

        tracing::debug!(
            target: "nvmeinfo.coordinator",
            run_id = %active.run_id,
            event = ?event,
            "run finished"
        );
        let ctx = self.finish_context();
        let finish = finish_run(
            &ctx,
            FinishedRun {
                request: active.request,
                log_dir: &active.session.dir,
                event,
                elapsed,
            },
        )
        .await;
        self.set_state(ProcessState::Idle);
        match finish {
            Finish::Deliver(outcome) => {
                self.deliver(outcome);
                Ok(())
            }
            Finish::Fatal(e) => Err(e),
        }
    }

    fn finish_context(&self) -> FinishContext<'_> {
        FinishContext {
            loader: &self.loader,
            sentinels: &self.sentinels,
            program: &self.program,
            tool_dir: &self.tool_dir,
        }
    }

    fn deliver(&self, outcome: RunOutcome) {
        if let Err(e) = self.sink.deliver(outcome) {
            tracing::debug!(target: "nvmeinfo.coordinator", error = %e, "outcome dropped");
        }
    }

    async fn shutdown(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::debug!(
                target: "nvmeinfo.coordinator",
                kind = %pending.request.kind,
                "pending request dropped at shutdown"
            );
        }

        let Some(mut active) = self.active.take() else {
            tracing::debug!(target: "nvmeinfo.coordinator", state = ?self.state(), "coordinator stopped");
            return;
        };

        tracing::info!(target: "nvmeinfo.coordinator", run_id = %active.run_id, "aborting run at shutdown");
        active.process.cancel();
        let event = match tokio::time::timeout(SHUTDOWN_GRACE, active.process.wait()).await {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => {
                tracing::warn!(target: "nvmeinfo.coordinator", error = %e, "no terminal event at shutdown");
                self.set_state(ProcessState::Idle);
                return;
            }
            Err(_) => {
                tracing::warn!(target: "nvmeinfo.coordinator", "process did not stop within shutdown grace");
                self.set_state(ProcessState::Idle);
                return;
            }
        };

        self.set_state(ProcessState::Finishing);
        if !active.superseded {
            let ctx = self.finish_context();
            let finish = finish_run(
                &ctx,
                FinishedRun {
                    request: active.request,
                    log_dir: &active.session.dir,
                    event,
                    elapsed: active.started.elapsed(),
                },
            )
            .await;
            if let Finish::Deliver(outcome) = finish {
                self.deliver(outcome);
            }
        }
        self.set_state(ProcessState::Idle);
    }
}

async fn wait_active(active: &mut Option<ActiveRun>) -> Result<TerminalEvent, FatalError> {
    match active {
        Some(run) => run.process.wait().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stuck_run_gets_preempting_request_rejected_once() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = AppConfig::default();
        cfg.log_root = tmp.path().join("logs");
        cfg.control.resubmit_delay_ms = 10;
        cfg.control.max_resubmit_attempts = 1;

        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ProcessState::Running);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<RunOutcome>();
        let mut actor = Actor::new(&cfg, rx, state_tx, out_tx);

        let (process, done_tx) = SupervisedProcess::unkillable();
        actor.active = Some(ActiveRun {
            run_id: Uuid::new_v4(),
            request: RunRequest::read("0"),
            session: LogSession {
                dir: tmp.path().to_path_buf(),
                created_at: chrono::Local::now(),
            },
            process,
            started: Instant::now(),
            superseded: false,
        });
        let join = tokio::spawn(actor.run());
        let handle = CoordinatorHandle { tx, state_rx };

        handle.submit(RunRequest::dashboard("1")).unwrap();
        let out = tokio::time::timeout(Duration::from_secs(5), out_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.kind, OutcomeKind::Rejected);
        assert_eq!(out.request, RunRequest::dashboard("1"));
        assert_eq!(out.status_code, Some(-1));
        assert_eq!(
            out.message.as_deref(),
            Some("Read information not started: previous nvmecmd did not stop")
        );
        assert!(out.result.is_none());

        // No second rejection while the old process keeps running.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(out_rx.try_recv().is_err());
        assert_eq!(handle.state(), ProcessState::Running);

        // The superseded run finally ends; its outcome stays suppressed.
        done_tx
            .send(TerminalEvent::Exited {
                exit_code: None,
                timed_out: false,
            })
            .unwrap();
        handle.shutdown().await;
        assert!(join.await.unwrap().is_ok());
        assert!(out_rx.try_recv().is_err());
        assert_eq!(handle.state(), ProcessState::Idle);
    }
}
