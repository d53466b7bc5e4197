//! Application configuration loaded from environment variables.
//!
//! Loaded once at startup; a `.env` file is honored for local development.

use chrono::NaiveTime;
use std::env;
use std::time::Duration;

use crate::services::groups::DEFAULT_QUICK_MATCH_TITLE;

/// Default deactivation sweep cadence.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5;
/// Default daily quick-match regeneration time (UTC).
pub const DEFAULT_QUICK_MATCH_TIME: &str = "18:59:30";

/// Cadence of the background lifecycle jobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between deactivation sweeps
    pub sweep_interval: Duration,
    /// Wall-clock time (UTC) of the daily quick-match regeneration
    pub quick_match_at: NaiveTime,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            quick_match_at: NaiveTime::from_hms_opt(18, 59, 30).unwrap_or_default(),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// GCP project ID. When unset, the in-memory store is used.
    pub gcp_project_id: Option<String>,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Title of the auto-generated quick-match group
    pub quick_match_title: String,
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:8081".to_string(),
            port: 8080,
            gcp_project_id: None,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            quick_match_title: DEFAULT_QUICK_MATCH_TITLE.to_string(),
            scheduler: SchedulerConfig::default(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let sweep_interval_secs = match env::var("SWEEP_INTERVAL_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid("SWEEP_INTERVAL_SECS", raw))?,
            Err(_) => DEFAULT_SWEEP_INTERVAL_SECS,
        };

        let quick_match_raw =
            env::var("QUICK_MATCH_TIME").unwrap_or_else(|_| DEFAULT_QUICK_MATCH_TIME.to_string());
        let quick_match_at = NaiveTime::parse_from_str(quick_match_raw.trim(), "%H:%M:%S")
            .map_err(|_| ConfigError::Invalid("QUICK_MATCH_TIME", quick_match_raw.clone()))?;

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            gcp_project_id: env::var("GCP_PROJECT_ID")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            quick_match_title: env::var("QUICK_MATCH_TITLE")
                .unwrap_or_else(|_| DEFAULT_QUICK_MATCH_TITLE.to_string()),
            scheduler: SchedulerConfig {
                sweep_interval: Duration::from_secs(sweep_interval_secs),
                quick_match_at,
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test so the environment is not mutated concurrently.
    #[test]
    fn test_config_from_env() {
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::remove_var("SWEEP_INTERVAL_SECS");
        env::remove_var("QUICK_MATCH_TIME");

        let config = Config::from_env().expect("Config should load");
        assert_eq!(config.port, 8080);
        assert_eq!(config.scheduler.sweep_interval, Duration::from_secs(5));
        assert_eq!(
            config.scheduler.quick_match_at,
            NaiveTime::from_hms_opt(18, 59, 30).unwrap()
        );

        env::set_var("SWEEP_INTERVAL_SECS", "30");
        env::set_var("QUICK_MATCH_TIME", "06:00:00");
        let config = Config::from_env().expect("Config should load");
        assert_eq!(config.scheduler.sweep_interval, Duration::from_secs(30));
        assert_eq!(
            config.scheduler.quick_match_at,
            NaiveTime::from_hms_opt(6, 0, 0).unwrap()
        );

        env::set_var("QUICK_MATCH_TIME", "7pm");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid("QUICK_MATCH_TIME", _))
        ));

        env::remove_var("SWEEP_INTERVAL_SECS");
        env::remove_var("QUICK_MATCH_TIME");
    }
}
