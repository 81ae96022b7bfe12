use tokio::sync::mpsc;

use crate::error::DeliveryError;

use super::outcome::RunOutcome;

/// Consumer side of the coordinator. Implementations report a torn-down
/// consumer as `Err`; the coordinator logs and drops the outcome.
pub trait OutcomeSink: Send + 'static {
    fn deliver(&self, outcome: RunOutcome) -> Result<(), DeliveryError>;
}

impl OutcomeSink for mpsc::UnboundedSender<RunOutcome> {
    fn deliver(&self, outcome: RunOutcome) -> Result<(), DeliveryError> {
        self.send(outcome).map_err(|_| DeliveryError)
    }
}

impl OutcomeSink for mpsc::Sender<RunOutcome> {
    fn deliver(&self, outcome: RunOutcome) -> Result<(), DeliveryError> {
        self.try_send(outcome).map_err(|_| DeliveryError)
    }
}
