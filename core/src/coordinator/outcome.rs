use std::path::PathBuf;

use serde::Serialize;

use crate::result::ParsedResult;
use crate::runner::{OutcomeKind, RunRequest};

/// Status code carried by every failure outcome.
pub const FAILURE_STATUS: i32 = -1;

/// What the consumer receives once per non-superseded run request.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub status_code: Option<i32>,
    pub message: Option<String>,
    pub elapsed_seconds: f64,
    pub result: Option<ParsedResult>,
    pub log_dir: PathBuf,
    pub kind: OutcomeKind,
    pub request: RunRequest,
    /// Trace text, present only when the tool's result could not be trusted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.kind.is_success()
    }

    pub(crate) fn failure(
        kind: OutcomeKind,
        request: RunRequest,
        log_dir: PathBuf,
        elapsed_seconds: f64,
        message: String,
        trace: Option<String>,
    ) -> Self {
        Self {
            status_code: Some(FAILURE_STATUS),
            message: Some(message),
            elapsed_seconds,
            result: None,
            log_dir,
            kind,
            request,
            trace,
        }
    }
}
