//! Single owner of the tool process: accepts run requests, preempts the
//! active run when a newer one arrives, and delivers one outcome per
//! surviving request.

mod actor;
mod finish;
mod outcome;
mod resubmit;
mod sink;
mod state;

pub use actor::{CoordinatorHandle, RunCoordinator};
pub use outcome::{RunOutcome, FAILURE_STATUS};
pub use sink::OutcomeSink;
pub use state::ProcessState;
