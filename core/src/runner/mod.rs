mod args;
pub mod exit;
mod supervisor;
mod types;

pub use args::build_tool_args;
pub use exit::{classify, classify_event, ExitSentinels, OutcomeKind};
pub use supervisor::{LaunchSpec, ProcessSupervisor, SupervisedProcess, TerminalEvent};
pub use types::{RunKind, RunRequest};
