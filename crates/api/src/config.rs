//! Process configuration.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. optional `shopdocs.toml` in the working directory
//! 3. `SHOPDOCS_*` environment variables (`SHOPDOCS_LOG__FORMAT` for nested keys)
//!
//! `main` calls `dotenvy::dotenv()` first, so a `.env` file feeds step 3.

use std::time::Duration;

use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use serde::Deserialize;

use shopdocs_infra::ServiceSettings;
use shopdocs_observability::LogSettings;

pub const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub payment_terms_days: i64,
    pub store_timeout_ms: u64,
    /// `0` disables the background sweeper.
    pub sweep_interval_secs: u64,
    #[serde(default)]
    pub log: LogSettings,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(
            Self::defaults()?
                .add_source(File::with_name("shopdocs").required(false))
                .add_source(
                    Environment::with_prefix("SHOPDOCS")
                        .prefix_separator("_")
                        .separator("__")
                        .try_parsing(true),
                ),
        )
    }

    /// Defaults overlaid with a TOML document.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Self::from_builder(
            Self::defaults()?.add_source(File::from_str(source, config::FileFormat::Toml)),
        )
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("bind_addr", "0.0.0.0:8080")?
            .set_default("db_max_connections", 10)?
            .set_default("jwt_secret", DEV_JWT_SECRET)?
            .set_default("payment_terms_days", 30)?
            .set_default("store_timeout_ms", 5_000)?
            .set_default("sweep_interval_secs", 300)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.payment_terms_days < 0 {
            return Err(ConfigError::Message(
                "payment_terms_days must not be negative".to_string(),
            ));
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Message("store_timeout_ms must be positive".to_string()));
        }
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Message("jwt_secret must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            payment_terms_days: self.payment_terms_days,
            store_timeout: Duration::from_millis(self.store_timeout_ms),
        }
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopdocs_observability::LogFormat;

    #[test]
    fn defaults_apply_without_sources() {
        let s = Settings::from_toml("").unwrap();
        assert_eq!(s.bind_addr, "0.0.0.0:8080");
        assert_eq!(s.database_url, None);
        assert_eq!(s.payment_terms_days, 30);
        assert_eq!(s.service_settings().store_timeout, Duration::from_millis(5_000));
        assert_eq!(s.sweep_interval(), Some(Duration::from_secs(300)));
        assert_eq!(s.log, LogSettings::default());
    }

    #[test]
    fn toml_overrides_defaults() {
        let s = Settings::from_toml(
            r#"
            database_url = "postgres://shop@localhost/shopdocs"
            payment_terms_days = 14
            sweep_interval_secs = 0

            [log]
            format = "pretty"
            "#,
        )
        .unwrap();
        assert_eq!(s.database_url.as_deref(), Some("postgres://shop@localhost/shopdocs"));
        assert_eq!(s.service_settings().payment_terms_days, 14);
        assert_eq!(s.sweep_interval(), None);
        assert_eq!(s.log.format, LogFormat::Pretty);
    }

    #[test]
    fn rejects_negative_terms() {
        assert!(Settings::from_toml("payment_terms_days = -1").is_err());
    }
}
