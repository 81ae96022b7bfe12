use std::path::PathBuf;

use thiserror::Error;

/// Failure to create a run's log session directory.
#[derive(Debug, Error)]
#[error("failed to create log directory: {}", path.display())]
pub struct SessionError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to spawn process: {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} requires an auxiliary file path")]
    MissingAuxFile { kind: &'static str },

    #[error("drive id must not be empty")]
    EmptyDriveId,
}

#[derive(Debug, Error)]
pub enum ResultError {
    #[error("could not read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json")]
    InvalidJson(#[source] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Conditions that end the whole application, not just one run.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error(transparent)]
    LogSession(#[from] SessionError),

    #[error("no NVMe drives found (nvmecmd exit code {exit_code})")]
    NoTargets { exit_code: i32 },

    #[error("internal fault: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("run coordinator is no longer accepting requests")]
    Closed,

    #[error("invalid run request: {0}")]
    Invalid(#[from] LaunchError),
}

#[derive(Debug, Error)]
#[error("outcome consumer is gone")]
pub struct DeliveryError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Fatal(#[from] FatalError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error("command error: {0}")]
    Command(String),
}
