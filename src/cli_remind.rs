//! Manual one-shot trigger for the abandoned-cart reminder run.
//!
//! Prints a one-line summary of the run, or the error message if it failed.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod commerce_store;
mod config;
mod jobs;
mod mailer;
mod reminder;
mod server_store;
mod sqlite_persistence;

use commerce_store::{CommerceStore, SqliteCommerceStore};
use config::{AppConfig, CliConfig, FileConfig};
use jobs::jobs::ABANDONED_CART_JOB_ID;
use mailer::{ConsoleMailer, Mailer, SmtpMailer};
use reminder::{ReminderError, ReminderService, ReminderSettings};
use server_store::{JobRunStatus, ServerStore, SqliteServerStore};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the commerce and server SQLite databases.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to an optional TOML config file. Values in the file override
    /// CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Minutes a cart must be inactive before it counts as abandoned.
    #[clap(long, default_value_t = 60)]
    pub min_inactive_minutes: u64,

    /// Hours to wait before reminding the same cart again.
    #[clap(long, default_value_t = 24)]
    pub resend_cooldown_hours: u64,

    /// Wall-clock budget in seconds for this run. 0 disables the deadline.
    #[clap(long, default_value_t = 0)]
    pub run_deadline_secs: u64,
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        // The interval only matters to the scheduler, not a manual run
        interval_secs: 60,
        min_inactive_minutes: cli_args.min_inactive_minutes,
        resend_cooldown_hours: cli_args.resend_cooldown_hours,
        run_deadline_secs: cli_args.run_deadline_secs,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    let commerce_store: Arc<dyn CommerceStore> =
        Arc::new(SqliteCommerceStore::new(config.commerce_db_path())?);
    let server_store: Arc<dyn ServerStore> =
        Arc::new(SqliteServerStore::new(config.server_db_path())?);

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => Arc::new(ConsoleMailer),
    };

    let service = ReminderService::new(
        commerce_store,
        server_store.clone(),
        mailer,
        ReminderSettings::from_config(&config),
    );

    // Manual runs show up in the same job history as scheduled ones
    let run_id = server_store.record_job_start(ABANDONED_CART_JOB_ID, "manual")?;

    match service.run_once(&CancellationToken::new()) {
        Ok(summary) => {
            server_store.record_job_finish(run_id, JobRunStatus::Completed, None)?;
            println!("Sent {} abandoned cart reminder emails", summary.sent);
            if !summary.failures.is_empty() {
                println!("{} reminders failed, see log for details", summary.failures.len());
            }
            Ok(())
        }
        Err(ReminderError::NoCandidates) => {
            server_store.record_job_finish(run_id, JobRunStatus::Completed, None)?;
            println!("No abandoned carts to remind");
            Ok(())
        }
        Err(error) => {
            server_store.record_job_finish(
                run_id,
                JobRunStatus::Failed,
                Some(error.to_string()),
            )?;
            println!("{}", error);
            std::process::exit(1);
        }
    }
}
