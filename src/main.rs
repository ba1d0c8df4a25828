use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commerce_store;
mod config;
mod jobs;
mod mailer;
mod reminder;
mod server_store;
mod sqlite_persistence;

use commerce_store::{CommerceStore, SqliteCommerceStore};
use config::{AppConfig, CliConfig, FileConfig};
use jobs::jobs::AbandonedCartJob;
use jobs::JobScheduler;
use mailer::{ConsoleMailer, Mailer, SmtpMailer};
use reminder::{ReminderService, ReminderSettings};
use server_store::{ServerStore, SqliteServerStore};
use tokio_util::sync::CancellationToken;

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

    /// Seconds between scheduled reminder runs.
    #[clap(long, default_value_t = 60)]
    pub interval_secs: u64,

    /// Minutes a cart must be inactive before it counts as abandoned.
    #[clap(long, default_value_t = 60)]
    pub min_inactive_minutes: u64,

    /// Hours to wait before reminding the same cart again.
    #[clap(long, default_value_t = 24)]
    pub resend_cooldown_hours: u64,

    /// Wall-clock budget in seconds for one reminder run. 0 disables the
    /// deadline.
    #[clap(long, default_value_t = 0)]
    pub run_deadline_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        interval_secs: cli_args.interval_secs,
        min_inactive_minutes: cli_args.min_inactive_minutes,
        resend_cooldown_hours: cli_args.resend_cooldown_hours,
        run_deadline_secs: cli_args.run_deadline_secs,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!(
        "Opening commerce database at {:?}...",
        config.commerce_db_path()
    );
    let commerce_store: Arc<dyn CommerceStore> =
        Arc::new(SqliteCommerceStore::new(config.commerce_db_path())?);

    info!("Opening server database at {:?}...", config.server_db_path());
    let server_store: Arc<dyn ServerStore> =
        Arc::new(SqliteServerStore::new(config.server_db_path())?);

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            info!("Sending reminders through SMTP relay {}", smtp.host);
            Arc::new(SmtpMailer::new(smtp)?)
        }
        None => {
            info!("No SMTP relay configured, reminder emails will be logged");
            Arc::new(ConsoleMailer)
        }
    };

    let service = Arc::new(ReminderService::new(
        commerce_store,
        server_store.clone(),
        mailer,
        ReminderSettings::from_config(&config),
    ));

    let shutdown_token = CancellationToken::new();
    let mut scheduler = JobScheduler::new(server_store, shutdown_token.clone());
    scheduler.register_job(Arc::new(AbandonedCartJob::new(
        service,
        Duration::from_secs(config.interval_secs),
    )));

    let ctrl_c_token = shutdown_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received ctrl-c, shutting down");
            ctrl_c_token.cancel();
        }
    });

    info!(
        "Reminder scheduler running every {} seconds",
        config.interval_secs
    );
    scheduler.run().await;

    Ok(())
}
