use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Tuning for reminder throttling and delivery recording.
#[derive(Clone, Debug, Deserialize)]
pub struct NotificationsConfig {
    /// Minimum gap between two successful notifications of the same type.
    #[serde(default = "default_min_interval_minutes")]
    pub min_interval_minutes: u64,
    /// Default page size for history queries.
    #[serde(default = "default_history_limit")]
    pub history_limit: u64,
    /// How many times a rate-limited send is retried.
    #[serde(default = "default_max_send_retries")]
    pub max_send_retries: u32,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            min_interval_minutes: default_min_interval_minutes(),
            history_limit: default_history_limit(),
            max_send_retries: default_max_send_retries(),
        }
    }
}

impl NotificationsConfig {
    pub fn min_interval(&self) -> time::Duration {
        time::Duration::minutes(self.min_interval_minutes as i64)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_min_interval_minutes() -> u64 {
    60
}

fn default_history_limit() -> u64 {
    50
}

fn default_max_send_retries() -> u32 {
    1
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Validation("database_url must be set".into()));
        }
        if self.notifications.min_interval_minutes == 0 {
            return Err(ConfigError::Validation(
                "notifications.min_interval_minutes must be > 0".into(),
            ));
        }
        if self.notifications.history_limit == 0 {
            return Err(ConfigError::Validation(
                "notifications.history_limit must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// The file is optional. Any environment variable matching the key path separated by
/// double underscores (e.g. `NOTIFICATIONS__MIN_INTERVAL_MINUTES`) overrides the file
/// value; `DATABASE_URL` maps onto `database_url`.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from("config.yaml")
}

pub fn load_config_from(path: &str) -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            listen_addr: default_listen_addr(),
            notifications: NotificationsConfig::default(),
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(base().validate().is_ok());
        assert_eq!(base().notifications.min_interval(), time::Duration::hours(1));
    }

    #[test]
    fn rejects_empty_database_url() {
        let mut cfg = base();
        cfg.database_url = "  ".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_zero_intervals() {
        let mut cfg = base();
        cfg.notifications.min_interval_minutes = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = base();
        cfg.notifications.history_limit = 0;
        assert!(cfg.validate().is_err());
    }
}
