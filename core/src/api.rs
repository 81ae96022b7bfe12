//! Stable re-exports for consumers (`cli`, integration tests, and external crates).
//!
//! Prefer importing from `nvmeinfo_core::api` instead of reaching into internal modules.

pub use crate::config::{
    load_from, AppConfig, ControlConfig, ExitCodeConfig, LoggingConfig,
    RetentionConfig, RetentionPolicy, ToolConfig,
};
pub use crate::coordinator::{
    CoordinatorHandle, OutcomeSink, ProcessState, RunCoordinator, RunOutcome, FAILURE_STATUS,
};
pub use crate::error::{
    CliError, CoordinatorError, DeliveryError, FatalError, LaunchError, ResultError, SessionError,
};
pub use crate::result::{ParsedResult, ResultLoader};
pub use crate::runner::{
    build_tool_args, classify, classify_event, ExitSentinels, LaunchSpec, OutcomeKind,
    ProcessSupervisor, RunKind, RunRequest, SupervisedProcess, TerminalEvent,
};
pub use crate::session::{LogSession, LogSessionAllocator, SESSION_TIMESTAMP_FORMAT};
