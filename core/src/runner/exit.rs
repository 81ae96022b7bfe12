use serde::{Deserialize, Serialize};

use super::supervisor::TerminalEvent;

/// nvmecmd hit an internal exception; its result file cannot be trusted.
pub const EXCEPTION_EXIT_CODE: i32 = 17;
/// nvmecmd rejected its command line and wrote no result file.
pub const USAGE_ERROR_EXIT_CODE: i32 = 16;
/// nvmecmd found no NVMe drives at all.
pub const NO_TARGETS_EXIT_CODE: i32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitSentinels {
    pub exception: i32,
    pub usage_error: i32,
    pub no_targets: i32,
}

impl Default for ExitSentinels {
    fn default() -> Self {
        Self {
            exception: EXCEPTION_EXIT_CODE,
            usage_error: USAGE_ERROR_EXIT_CODE,
            no_targets: NO_TARGETS_EXIT_CODE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    Success,
    SuccessWithWarnings,
    TimedOut,
    AbortedByUser,
    ExceptionFailure,
    UsageError,
    StartFailure,
    /// Result artifact missing or malformed after an otherwise successful exit.
    ResultParseFailure,
    /// A preempting request could not be started because the previous run never stopped.
    Rejected,
    /// nvmecmd died from a signal nobody here sent, or its exit could not be observed.
    Crashed,
    FatalNoTargets,
}

impl OutcomeKind {
    pub fn loads_result(self) -> bool {
        matches!(self, OutcomeKind::Success | OutcomeKind::SuccessWithWarnings)
    }

    pub fn reads_trace(self) -> bool {
        matches!(
            self,
            OutcomeKind::ExceptionFailure
                | OutcomeKind::UsageError
                | OutcomeKind::ResultParseFailure
                | OutcomeKind::Crashed
        )
    }

    pub fn is_fatal(self) -> bool {
        self == OutcomeKind::FatalNoTargets
    }

    pub fn is_success(self) -> bool {
        self.loads_result()
    }
}

/// Single mapping from nvmecmd termination to outcome kind.
///
/// Every non-zero code that is not a sentinel means the tool completed and
/// wrote its result file, possibly with warnings.
pub fn classify(exit_code: Option<i32>, timed_out: bool, sentinels: &ExitSentinels) -> OutcomeKind {
    match exit_code {
        None if timed_out => OutcomeKind::TimedOut,
        None => OutcomeKind::AbortedByUser,
        Some(0) => OutcomeKind::Success,
        Some(c) if c == sentinels.exception => OutcomeKind::ExceptionFailure,
        Some(c) if c == sentinels.usage_error => OutcomeKind::UsageError,
        Some(c) if c == sentinels.no_targets => OutcomeKind::FatalNoTargets,
        Some(_) => OutcomeKind::SuccessWithWarnings,
    }
}

pub fn classify_event(event: &TerminalEvent, sentinels: &ExitSentinels) -> OutcomeKind {
    match event {
        TerminalEvent::StartFailed { .. } => OutcomeKind::StartFailure,
        TerminalEvent::Crashed { .. } => OutcomeKind::Crashed,
        TerminalEvent::Exited {
            exit_code,
            timed_out,
        } => classify(*exit_code, *timed_out, sentinels),
    }
}

/// Terminal event for a tool that exited on its own. A signal death is never
/// reported as an exit code, so it cannot be mistaken for a user abort.
pub fn exit_event(status: std::process::ExitStatus) -> TerminalEvent {
    if let Some(code) = status.code() {
        return TerminalEvent::Exited {
            exit_code: Some(code),
            timed_out: false,
        };
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return TerminalEvent::Crashed {
                reason: format!("terminated by signal {sig}"),
            };
        }
    }
    TerminalEvent::Crashed {
        reason: format!("ended without an exit code ({status})"),
    }
}
