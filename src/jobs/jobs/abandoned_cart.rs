use crate::jobs::{BackgroundJob, JobContext, JobError};
use crate::reminder::{ReminderError, ReminderService};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const ABANDONED_CART_JOB_ID: &str = "abandoned_cart_reminder";

/// Scheduled job that runs one abandoned-cart reminder pass per tick.
pub struct AbandonedCartJob {
    service: Arc<ReminderService>,
    interval: Duration,
}

impl AbandonedCartJob {
    pub fn new(service: Arc<ReminderService>, interval: Duration) -> Self {
        Self { service, interval }
    }
}

impl BackgroundJob for AbandonedCartJob {
    fn id(&self) -> &'static str {
        ABANDONED_CART_JOB_ID
    }

    fn name(&self) -> &'static str {
        "Abandoned cart reminders"
    }

    fn description(&self) -> &'static str {
        "Sends reminder emails to customers with abandoned carts"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        match self.service.run_once(&ctx.cancellation_token) {
            Ok(summary) => {
                if summary.stopped_early && ctx.is_cancelled() {
                    return Err(JobError::Cancelled);
                }
                Ok(())
            }
            // An empty shop is not a failure
            Err(ReminderError::NoCandidates) => {
                debug!("No abandoned carts found this run");
                Ok(())
            }
            Err(error @ ReminderError::Storage(_)) => {
                Err(JobError::ExecutionFailed(error.to_string()))
            }
        }
    }
}
