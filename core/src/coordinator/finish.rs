use std::path::Path;
use std::time::Duration;

use crate::error::FatalError;
use crate::result::ResultLoader;
use crate::runner::{classify_event, ExitSentinels, OutcomeKind, RunRequest, TerminalEvent};

use super::outcome::{RunOutcome, FAILURE_STATUS};

pub(crate) struct FinishContext<'a> {
    pub loader: &'a ResultLoader,
    pub sentinels: &'a ExitSentinels,
    pub program: &'a Path,
    pub tool_dir: &'a Path,
}

pub(crate) struct FinishedRun<'a> {
    pub request: RunRequest,
    pub log_dir: &'a Path,
    pub event: TerminalEvent,
    pub elapsed: Duration,
}

pub(crate) enum Finish {
    Deliver(RunOutcome),
    Fatal(FatalError),
}

/// Turns a terminal event into the outcome the consumer sees, reading the
/// session's artifacts only when the classification calls for it.
pub(crate) async fn finish_run(ctx: &FinishContext<'_>, run: FinishedRun<'_>) -> Finish {
    let kind = classify_event(&run.event, ctx.sentinels);
    let secs = run.elapsed.as_secs_f64();
    let action = run.request.kind.action();
    let log_dir = run.log_dir.to_path_buf();
    let code = match &run.event {
        TerminalEvent::Exited { exit_code, .. } => *exit_code,
        TerminalEvent::StartFailed { .. } | TerminalEvent::Crashed { .. } => None,
    };

    let failure = |kind: OutcomeKind, message: String, trace: Option<String>| {
        Finish::Deliver(RunOutcome::failure(
            kind,
            run.request.clone(),
            log_dir.clone(),
            secs,
            message,
            trace,
        ))
    };

    match kind {
        OutcomeKind::FatalNoTargets => {
            let exit_code = code.unwrap_or(ctx.sentinels.no_targets);
            tracing::error!(
                target: "nvmeinfo.coordinator",
                exit_code,
                log_dir = %run.log_dir.display(),
                "nvmecmd found no NVMe drives"
            );
            Finish::Fatal(FatalError::NoTargets { exit_code })
        }
        OutcomeKind::TimedOut => {
            let message = format!("{action} timed out and aborted at {secs:.3} seconds");
            tracing::warn!(target: "nvmeinfo.coordinator", "{message}");
            failure(kind, message, None)
        }
        OutcomeKind::AbortedByUser => {
            let message = format!("{action} aborted by user");
            tracing::info!(target: "nvmeinfo.coordinator", "{message}");
            failure(kind, message, None)
        }
        OutcomeKind::ExceptionFailure | OutcomeKind::UsageError => {
            let what = if kind == OutcomeKind::ExceptionFailure {
                "exception"
            } else {
                "usage error"
            };
            let code = code.unwrap_or(FAILURE_STATUS);
            let message = format!("nvmecmd failed with {what} {code} after {secs:.3} seconds");
            tracing::error!(target: "nvmeinfo.coordinator", "{message}");
            let trace = if kind.reads_trace() {
                read_trace_logged(ctx.loader, run.log_dir).await
            } else {
                None
            };
            failure(kind, message, trace)
        }
        OutcomeKind::StartFailure => {
            let reason = match &run.event {
                TerminalEvent::StartFailed { reason } => reason.as_str(),
                _ => "unknown",
            };
            let message = format!(
                "{}\n{} failed to start: {reason}",
                ctx.tool_dir.display(),
                ctx.program.display()
            );
            failure(kind, message, None)
        }
        OutcomeKind::Crashed => {
            let reason = match &run.event {
                TerminalEvent::Crashed { reason } => reason.as_str(),
                _ => "ended abnormally",
            };
            let message = format!("nvmecmd {reason} after {secs:.3} seconds");
            tracing::error!(target: "nvmeinfo.coordinator", "{message}");
            let trace = read_trace_logged(ctx.loader, run.log_dir).await;
            failure(kind, message, trace)
        }
        OutcomeKind::Success | OutcomeKind::SuccessWithWarnings => {
            let code = code.unwrap_or_default();
            match ctx.loader.load(run.log_dir, run.request.kind).await {
                Ok(parsed) => {
                    tracing::info!(
                        target: "nvmeinfo.coordinator",
                        exit_code = code,
                        elapsed_s = secs,
                        "{action} completed with code {code} in {secs:.3} seconds"
                    );
                    tracing::debug!(
                        target: "nvmeinfo.coordinator",
                        system = ?parsed.system(),
                        host = ?parsed.host(),
                        "result metadata"
                    );
                    Finish::Deliver(RunOutcome {
                        status_code: Some(code),
                        message: None,
                        elapsed_seconds: secs,
                        result: Some(parsed),
                        log_dir,
                        kind,
                        request: run.request,
                        trace: None,
                    })
                }
                Err(e) => {
                    let message = format!(
                        "{action} completed with code {code} in {secs:.3} seconds but could not parse log file '{}': {}",
                        ctx.loader.result_path(run.log_dir).display(),
                        error_chain(&e)
                    );
                    tracing::error!(target: "nvmeinfo.coordinator", "{message}");
                    let trace = read_trace_logged(ctx.loader, run.log_dir).await;
                    failure(OutcomeKind::ResultParseFailure, message, trace)
                }
            }
        }
        OutcomeKind::ResultParseFailure | OutcomeKind::Rejected => {
            // classify_event never produces these.
            failure(kind, format!("{action} ended without a result"), None)
        }
    }
}

async fn read_trace_logged(loader: &ResultLoader, dir: &Path) -> Option<String> {
    let trace = loader.read_trace(dir).await?;
    tracing::error!(
        target: "nvmeinfo.result",
        path = %loader.trace_path(dir).display(),
        "nvmecmd trace:\n{trace}"
    );
    Some(trace)
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut out = e.to_string();
    let mut cur = e.source();
    while let Some(src) = cur {
        out.push_str(": ");
        out.push_str(&src.to_string());
        cur = src.source();
    }
    out
}
