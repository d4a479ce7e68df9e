//! Process configuration loaded from the environment.
//!
//! The API key and the update interval are user settings stored in the
//! database, not here.

use std::time::Duration;

use url::Url;

use crate::monitor::{DEFAULT_SWEEP_LEASE_TTL, PacingPolicy};
use crate::{Error, Result};

/// Runtime configuration for the tracker.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database URL.
    pub database_url: String,
    /// Directory for rolling log files.
    pub log_dir: String,
    /// Base URL of the catalog API.
    pub catalog_base_url: String,
    /// Delays applied between webhook deliveries.
    pub pacing: PacingPolicy,
    /// Minimum spacing between two manual checks.
    pub manual_cooldown: Duration,
    /// How long a completion event id is remembered for deduplication.
    pub event_dedup_window: Duration,
    /// HTTP request timeout (zero disables it).
    pub request_timeout: Duration,
    /// Lifetime of the shared sweep lease between renewals.
    pub sweep_lease_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:modwatch.db?mode=rwc".to_string(),
            log_dir: "logs".to_string(),
            catalog_base_url: "https://api.curseforge.com".to_string(),
            pacing: PacingPolicy::default(),
            manual_cooldown: Duration::from_secs(30),
            event_dedup_window: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
            sweep_lease_ttl: DEFAULT_SWEEP_LEASE_TTL,
        }
    }
}

impl AppConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `DATABASE_URL`
    /// - `MODWATCH_LOG_DIR`
    /// - `MODWATCH_CATALOG_URL`
    /// - `MODWATCH_DELIVERY_DELAY_MS`
    /// - `MODWATCH_RATE_LIMIT_BACKOFF_MS`
    /// - `MODWATCH_MANUAL_COOLDOWN_SECS`
    /// - `MODWATCH_EVENT_DEDUP_WINDOW_SECS`
    /// - `MODWATCH_REQUEST_TIMEOUT_SECS`
    /// - `MODWATCH_SWEEP_LEASE_SECS`
    pub fn from_env_or_default() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = non_empty(lookup("DATABASE_URL")) {
            config.database_url = url;
        }
        if let Some(dir) = non_empty(lookup("MODWATCH_LOG_DIR")) {
            config.log_dir = dir;
        }
        if let Some(url) = non_empty(lookup("MODWATCH_CATALOG_URL")) {
            config.catalog_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(ms) = parse_u64(&lookup, "MODWATCH_DELIVERY_DELAY_MS")? {
            config.pacing.delivery_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(&lookup, "MODWATCH_RATE_LIMIT_BACKOFF_MS")? {
            config.pacing.rate_limit_backoff = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_u64(&lookup, "MODWATCH_MANUAL_COOLDOWN_SECS")? {
            config.manual_cooldown = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_u64(&lookup, "MODWATCH_EVENT_DEDUP_WINDOW_SECS")? {
            config.event_dedup_window = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_u64(&lookup, "MODWATCH_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_u64(&lookup, "MODWATCH_SWEEP_LEASE_SECS")? {
            config.sweep_lease_ttl = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.catalog_base_url).map_err(|e| {
            Error::config(format!(
                "invalid catalog url '{}': {}",
                self.catalog_base_url, e
            ))
        })?;
        if self.sweep_lease_ttl.is_zero() {
            return Err(Error::config("sweep lease ttl must be positive"));
        }
        self.pacing.validate()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| Error::config(format!("{} must be an unsigned integer: {}", key, e))),
        None => Ok(None),
    }
}
