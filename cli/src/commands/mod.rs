pub mod cli;
pub mod prune;
pub mod run;
pub mod stdio;

use nvmeinfo_core::api::{CliError, FatalError};
use tokio::task::JoinHandle;

/// Awaits the coordinator task and surfaces application-ending conditions.
pub(crate) async fn join_coordinator(
    join: JoinHandle<Result<(), FatalError>>,
) -> Result<(), CliError> {
    match join.await {
        Ok(res) => res.map_err(CliError::Fatal),
        Err(e) => Err(CliError::Fatal(FatalError::Internal(e.to_string()))),
    }
}
