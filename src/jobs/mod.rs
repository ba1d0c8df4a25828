//! Background job scheduling and execution.
//!
//! Jobs run on fixed intervals under a scheduler that persists run history
//! and schedule state, and guarantees a job is never started while its
//! previous run is still executing.

mod context;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use job::{BackgroundJob, JobError, ShutdownBehavior};
pub use scheduler::JobScheduler;
