use super::context::JobContext;
use super::job::{BackgroundJob, JobError, ShutdownBehavior};
use crate::server_store::{JobRunStatus, JobScheduleState, ServerStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upper bound on the scheduler's sleep between wake-ups.
const MAX_SLEEP: Duration = Duration::from_secs(60);
/// Poll interval while waiting for a running job to finish.
const RUNNING_POLL: Duration = Duration::from_millis(250);
/// How long to wait for jobs to wind down at shutdown.
const SHUTDOWN_WAIT: Duration = Duration::from_secs(30);

/// Interval scheduler for background jobs.
///
/// Persists run history and schedule state through the server store and
/// enforces single-flight per job id: a tick that arrives while the
/// previous run is still executing is skipped.
pub struct JobScheduler {
    jobs: HashMap<String, Arc<dyn BackgroundJob>>,
    /// Currently running jobs with their task handles.
    running_handles: HashMap<String, JoinHandle<()>>,
    /// Cancellation tokens for each running job.
    job_cancel_tokens: HashMap<String, CancellationToken>,
    server_store: Arc<dyn ServerStore>,
    shutdown_token: CancellationToken,
}

impl JobScheduler {
    pub fn new(server_store: Arc<dyn ServerStore>, shutdown_token: CancellationToken) -> Self {
        Self {
            jobs: HashMap::new(),
            running_handles: HashMap::new(),
            job_cancel_tokens: HashMap::new(),
            server_store,
            shutdown_token,
        }
    }

    pub fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        debug!(
            "Registering job: {} ({}) - {}",
            job.id(),
            job.name(),
            job.description()
        );
        self.jobs.insert(job.id().to_string(), job);
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    fn is_running(&self, job_id: &str) -> bool {
        self.running_handles
            .get(job_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Run the scheduler loop until the shutdown token fires.
    pub async fn run(&mut self) {
        info!("Starting job scheduler with {} registered jobs", self.job_count());

        // On startup: mark any stale running jobs as failed
        match self.server_store.mark_stale_jobs_failed() {
            Ok(count) if count > 0 => {
                info!("Marked {} stale jobs as failed from previous run", count);
            }
            Ok(_) => {}
            Err(e) => {
                error!("Failed to mark stale jobs: {}", e);
            }
        }

        loop {
            self.cleanup_completed_jobs().await;

            let sleep_duration = self.time_until_next_job();
            debug!(
                "Scheduler sleeping for {:?} until next scheduled job",
                sleep_duration
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_jobs();
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    /// Time until the next job is due. Capped so the loop still wakes up to
    /// clean up finished runs.
    fn time_until_next_job(&self) -> Duration {
        let mut min_duration = MAX_SLEEP;

        for job_id in self.jobs.keys() {
            if self.is_running(job_id) {
                min_duration = min_duration.min(RUNNING_POLL);
                continue;
            }

            let next_run = self.next_run_time(job_id);
            let now = chrono::Utc::now();
            if next_run <= now {
                return Duration::from_secs(0);
            }
            let until = (next_run - now).to_std().unwrap_or(Duration::from_secs(1));
            min_duration = min_duration.min(until);
        }

        min_duration
    }

    /// Next scheduled run time for a job. A job without persisted schedule
    /// state runs immediately.
    fn next_run_time(&self, job_id: &str) -> chrono::DateTime<chrono::Utc> {
        match self.server_store.get_schedule_state(job_id) {
            Ok(Some(state)) => state.next_run_at,
            Ok(None) => chrono::Utc::now(),
            Err(e) => {
                warn!("Failed to read schedule state for {}: {}", job_id, e);
                chrono::Utc::now()
            }
        }
    }

    fn run_due_jobs(&mut self) {
        let now = chrono::Utc::now();
        let due: Vec<String> = self
            .jobs
            .keys()
            .filter(|job_id| !self.is_running(job_id) && self.next_run_time(job_id) <= now)
            .cloned()
            .collect();

        for job_id in due {
            self.spawn_job(&job_id, "schedule");
        }
    }

    fn spawn_job(&mut self, job_id: &str, triggered_by: &str) {
        let job = match self.jobs.get(job_id) {
            Some(job) => Arc::clone(job),
            None => {
                error!("Attempted to spawn unknown job: {}", job_id);
                return;
            }
        };

        let run_id = match self.server_store.record_job_start(job_id, triggered_by) {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to record job start for {}: {}", job_id, e);
                return;
            }
        };

        info!(
            "Starting job: {} (run_id: {}, triggered_by: {})",
            job_id, run_id, triggered_by
        );

        // Push next_run_at past the interval right away so the loop does not
        // re-trigger the job while it is still running.
        let next_run = chrono::Utc::now()
            + chrono::Duration::from_std(job.interval()).unwrap_or_default();
        let schedule_state = JobScheduleState {
            job_id: job_id.to_string(),
            next_run_at: next_run,
            last_run_at: None,
        };
        if let Err(e) = self.server_store.update_schedule_state(&schedule_state) {
            warn!("Failed to initialize schedule state for {}: {}", job_id, e);
        }

        let cancel_token = self.shutdown_token.child_token();
        self.job_cancel_tokens
            .insert(job_id.to_string(), cancel_token.clone());

        let ctx = JobContext::new(cancel_token, Arc::clone(&self.server_store));
        let server_store = Arc::clone(&self.server_store);
        let job_id_owned = job_id.to_string();

        // Jobs are synchronous, so execute them on the blocking pool
        let handle = tokio::spawn(async move {
            let start_time = Instant::now();
            let result = tokio::task::spawn_blocking(move || job.execute(&ctx)).await;
            let elapsed = start_time.elapsed();

            let (status, error_msg) = match result {
                Ok(Ok(())) => {
                    info!("Job {} completed successfully in {:?}", job_id_owned, elapsed);
                    (JobRunStatus::Completed, None)
                }
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id_owned, elapsed);
                    (JobRunStatus::Failed, Some("Cancelled".to_string()))
                }
                Ok(Err(e)) => {
                    error!("Job {} failed after {:?}: {}", job_id_owned, elapsed, e);
                    (JobRunStatus::Failed, Some(e.to_string()))
                }
                Err(e) => {
                    error!("Job {} panicked after {:?}: {}", job_id_owned, elapsed, e);
                    (JobRunStatus::Failed, Some(format!("Task panic: {}", e)))
                }
            };

            if let Err(e) = server_store.record_job_finish(run_id, status, error_msg) {
                error!("Failed to record job finish for {}: {}", job_id_owned, e);
            }
        });

        self.running_handles.insert(job_id.to_string(), handle);
    }

    /// Record the completed run in the schedule state.
    fn update_schedule_after_run(&self, job_id: &str) {
        let job = match self.jobs.get(job_id) {
            Some(job) => job,
            None => return,
        };

        let now = chrono::Utc::now();
        let state = JobScheduleState {
            job_id: job_id.to_string(),
            next_run_at: now + chrono::Duration::from_std(job.interval()).unwrap_or_default(),
            last_run_at: Some(now),
        };
        if let Err(e) = self.server_store.update_schedule_state(&state) {
            error!("Failed to update schedule state for {}: {}", job_id, e);
        }
    }

    async fn cleanup_completed_jobs(&mut self) {
        let completed: Vec<String> = self
            .running_handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in completed {
            if let Some(handle) = self.running_handles.remove(&job_id) {
                let _ = handle.await;
            }
            self.job_cancel_tokens.remove(&job_id);
            self.update_schedule_after_run(&job_id);
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        for (job_id, token) in &self.job_cancel_tokens {
            let cancellable = self
                .jobs
                .get(job_id)
                .map(|j| j.shutdown_behavior() == ShutdownBehavior::Cancellable)
                .unwrap_or(true);
            if cancellable {
                debug!("Cancelling job: {}", job_id);
                token.cancel();
            }
        }

        for (job_id, handle) in self.running_handles.drain() {
            let behavior = self
                .jobs
                .get(&job_id)
                .map(|j| j.shutdown_behavior())
                .unwrap_or_default();
            if behavior == ShutdownBehavior::WaitForCompletion {
                info!("Waiting for job {} to complete...", job_id);
            }
            let _ = tokio::time::timeout(SHUTDOWN_WAIT, handle).await;
        }

        self.job_cancel_tokens.clear();
        info!("Scheduler shutdown complete");
    }
}
