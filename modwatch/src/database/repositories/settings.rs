//! User settings repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::{Error, Result};

/// Update interval used when none has been stored.
pub const DEFAULT_UPDATE_INTERVAL_MINUTES: u32 = 30;

const API_KEY: &str = "api_key";
const UPDATE_INTERVAL: &str = "update_interval";

/// Settings repository trait.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// The catalog API key, if one is configured and non-blank.
    async fn get_api_key(&self) -> Result<Option<String>>;
    async fn set_api_key(&self, key: &str) -> Result<()>;
    /// Minutes between scheduled checks.
    async fn get_update_interval(&self) -> Result<u32>;
    async fn set_update_interval(&self, minutes: u32) -> Result<()>;
}

/// SQLx implementation of SettingsRepository.
pub struct SqlxSettingsRepository {
    pool: SqlitePool,
}

impl SqlxSettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT value FROM settings WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for SqlxSettingsRepository {
    async fn get_api_key(&self) -> Result<Option<String>> {
        Ok(self
            .get(API_KEY)
            .await?
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty()))
    }

    async fn set_api_key(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::validation("API key must not be empty"));
        }
        self.set(API_KEY, key).await
    }

    async fn get_update_interval(&self) -> Result<u32> {
        match self.get(UPDATE_INTERVAL).await? {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(minutes) if minutes > 0 => Ok(minutes),
                _ => {
                    tracing::warn!(value = %raw, "Ignoring invalid stored update interval");
                    Ok(DEFAULT_UPDATE_INTERVAL_MINUTES)
                }
            },
            None => Ok(DEFAULT_UPDATE_INTERVAL_MINUTES),
        }
    }

    async fn set_update_interval(&self, minutes: u32) -> Result<()> {
        if minutes == 0 {
            return Err(Error::validation("Update interval must be at least one minute"));
        }
        self.set(UPDATE_INTERVAL, &minutes.to_string()).await
    }
}
