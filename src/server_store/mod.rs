mod models;
mod schema;
mod sqlite_server_store;

pub use models::*;
pub use schema::SERVER_VERSIONED_SCHEMAS;
pub use sqlite_server_store::SqliteServerStore;

use crate::sqlite_persistence::StoreError;
use chrono::{DateTime, Utc};

pub trait ServerStore: Send + Sync {
    fn record_job_start(&self, job_id: &str, triggered_by: &str) -> Result<i64, StoreError>;
    fn record_job_finish(
        &self,
        run_id: i64,
        status: JobRunStatus,
        error_message: Option<String>,
    ) -> Result<(), StoreError>;
    fn get_job_history(&self, job_id: &str, limit: usize) -> Result<Vec<JobRun>, StoreError>;
    fn get_last_run(&self, job_id: &str) -> Result<Option<JobRun>, StoreError>;
    fn mark_stale_jobs_failed(&self) -> Result<usize, StoreError>;

    // Schedule state
    fn get_schedule_state(&self, job_id: &str) -> Result<Option<JobScheduleState>, StoreError>;
    fn update_schedule_state(&self, state: &JobScheduleState) -> Result<(), StoreError>;

    // Reminder log
    fn last_reminded_at(&self, cart_token: &str) -> Result<Option<DateTime<Utc>>, StoreError>;
    fn mark_reminded(
        &self,
        cart_token: &str,
        email: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
