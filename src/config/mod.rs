mod file_config;

pub use file_config::{FileConfig, SmtpFileConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub interval_secs: u64,
    pub min_inactive_minutes: u64,
    pub resend_cooldown_hours: u64,
    pub run_deadline_secs: u64,
}

/// Resolved SMTP transport settings. Present only when a host is configured;
/// otherwise the service falls back to the console mailer.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    /// Seconds between scheduled reminder runs.
    pub interval_secs: u64,
    /// A cart is only considered abandoned after this many minutes without
    /// activity.
    pub min_inactive_minutes: u64,
    /// Hours to wait before reminding the same cart again.
    pub resend_cooldown_hours: u64,
    /// Wall-clock budget for a single run; 0 disables the deadline.
    pub run_deadline_secs: u64,

    pub smtp: Option<SmtpSettings>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let interval_secs = file.interval_secs.unwrap_or(cli.interval_secs);
        if interval_secs == 0 {
            bail!("interval_secs must be greater than zero");
        }
        let min_inactive_minutes = file.min_inactive_minutes.unwrap_or(cli.min_inactive_minutes);
        let resend_cooldown_hours = file
            .resend_cooldown_hours
            .unwrap_or(cli.resend_cooldown_hours);
        let run_deadline_secs = file.run_deadline_secs.unwrap_or(cli.run_deadline_secs);

        let smtp = match file.smtp {
            Some(smtp_file) if smtp_file.host.is_some() => {
                let host = smtp_file.host.unwrap_or_default();
                let from_address = match smtp_file.from_address {
                    Some(addr) if !addr.is_empty() => addr,
                    _ => bail!("smtp.from_address is required when smtp.host is set"),
                };
                Some(SmtpSettings {
                    host,
                    port: smtp_file.port.unwrap_or(587),
                    username: smtp_file.username,
                    password: smtp_file.password,
                    from_address,
                    from_name: smtp_file.from_name,
                })
            }
            _ => None,
        };

        Ok(Self {
            db_dir,
            interval_secs,
            min_inactive_minutes,
            resend_cooldown_hours,
            run_deadline_secs,
            smtp,
        })
    }

    pub fn commerce_db_path(&self) -> PathBuf {
        self.db_dir.join("commerce.db")
    }

    pub fn server_db_path(&self) -> PathBuf {
        self.db_dir.join("server.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_temp_db_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    fn cli_with_dir(dir: &TempDir) -> CliConfig {
        CliConfig {
            db_dir: Some(dir.path().to_path_buf()),
            interval_secs: 60,
            min_inactive_minutes: 60,
            resend_cooldown_hours: 24,
            run_deadline_secs: 0,
        }
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            interval_secs: 120,
            min_inactive_minutes: 90,
            resend_cooldown_hours: 48,
            run_deadline_secs: 30,
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.interval_secs, 120);
        assert_eq!(config.min_inactive_minutes, 90);
        assert_eq!(config.resend_cooldown_hours, 48);
        assert_eq!(config.run_deadline_secs, 30);
        assert!(config.smtp.is_none());
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/should/be/overridden")),
            interval_secs: 60,
            min_inactive_minutes: 60,
            resend_cooldown_hours: 24,
            run_deadline_secs: 0,
        };

        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            interval_secs: Some(300),
            resend_cooldown_hours: Some(12),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        // TOML values should override CLI
        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.interval_secs, 300);
        assert_eq!(config.resend_cooldown_hours, 12);
        // CLI value used when TOML doesn't specify
        assert_eq!(config.min_inactive_minutes, 60);
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let cli = CliConfig::default();
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_dir must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_db_dir_error() {
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/nonexistent/path/that/should/not/exist")),
            interval_secs: 60,
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_zero_interval_error() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            interval_secs: 0,
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("interval_secs must be greater than zero"));
    }

    #[test]
    fn test_resolve_smtp_requires_from_address() {
        let temp_dir = make_temp_db_dir();
        let file_config = FileConfig {
            smtp: Some(SmtpFileConfig {
                host: Some("smtp.example.com".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = AppConfig::resolve(&cli_with_dir(&temp_dir), Some(file_config));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("smtp.from_address is required"));
    }

    #[test]
    fn test_resolve_smtp_settings() {
        let temp_dir = make_temp_db_dir();
        let file_config = FileConfig {
            smtp: Some(SmtpFileConfig {
                host: Some("smtp.example.com".to_string()),
                port: Some(2525),
                username: Some("mailer".to_string()),
                password: Some("secret".to_string()),
                from_address: Some("noreply@example.com".to_string()),
                from_name: Some("Example Shop".to_string()),
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli_with_dir(&temp_dir), Some(file_config)).unwrap();
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.port, 2525);
        assert_eq!(smtp.username.as_deref(), Some("mailer"));
        assert_eq!(smtp.from_address, "noreply@example.com");
        assert_eq!(smtp.from_name.as_deref(), Some("Example Shop"));
    }

    #[test]
    fn test_resolve_smtp_default_port() {
        let temp_dir = make_temp_db_dir();
        let file_config = FileConfig {
            smtp: Some(SmtpFileConfig {
                host: Some("smtp.example.com".to_string()),
                from_address: Some("noreply@example.com".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli_with_dir(&temp_dir), Some(file_config)).unwrap();
        assert_eq!(config.smtp.unwrap().port, 587);
    }

    #[test]
    fn test_db_path_helpers() {
        let temp_dir = make_temp_db_dir();
        let config = AppConfig::resolve(&cli_with_dir(&temp_dir), None).unwrap();

        assert_eq!(
            config.commerce_db_path(),
            temp_dir.path().join("commerce.db")
        );
        assert_eq!(config.server_db_path(), temp_dir.path().join("server.db"));
    }
}
