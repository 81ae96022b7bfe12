use std::time::Duration;

use tokio::time::Instant;

use crate::config::ControlConfig;
use crate::runner::RunRequest;

/// Fixed-delay, capped schedule for starting a request that preempted a
/// still-running one.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResubmitSchedule {
    delay: Duration,
    max_attempts: u32,
}

impl ResubmitSchedule {
    pub(crate) fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: max_attempts.max(1),
        }
    }

    pub(crate) fn from_config(cfg: &ControlConfig) -> Self {
        Self::new(
            Duration::from_millis(cfg.resubmit_delay_ms),
            cfg.max_resubmit_attempts,
        )
    }

    pub(crate) fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// The one request waiting for the coordinator to become idle.
#[derive(Debug)]
pub(crate) struct PendingRun {
    pub request: RunRequest,
    pub attempts: u32,
    pub due: Instant,
}

impl PendingRun {
    pub(crate) fn new(request: RunRequest, schedule: &ResubmitSchedule, now: Instant) -> Self {
        Self {
            request,
            attempts: 0,
            due: now + schedule.delay,
        }
    }

    /// Last write wins; the attempt budget carries over so a stuck process
    /// cannot be outwaited by submitting repeatedly.
    pub(crate) fn replace(&mut self, request: RunRequest) -> RunRequest {
        std::mem::replace(&mut self.request, request)
    }

    /// Counts a tick that found the coordinator busy. Returns `false` once
    /// the budget is spent.
    pub(crate) fn reschedule(&mut self, schedule: &ResubmitSchedule, now: Instant) -> bool {
        self.attempts += 1;
        if self.attempts >= schedule.max_attempts {
            return false;
        }
        self.due = now + schedule.delay;
        true
    }
}
