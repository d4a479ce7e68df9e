//! Named wall-clock timestamps and leases that survive restarts.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sqlx::SqlitePool;

use crate::{Error, Result};

/// Persisted state store for named timestamps.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>>;
    async fn set_timestamp(&self, key: &str, at: DateTime<Utc>) -> Result<()>;
    async fn clear(&self, key: &str) -> Result<()>;

    /// Take the lease `name` for `holder` until `now + ttl`.
    ///
    /// Succeeds only when nobody holds it or the current lease expired at or
    /// before `now`. The check and the write are a single atomic step.
    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool>;
    /// Push the expiry of a lease `holder` still owns. `false` if it lost it.
    async fn renew_lease(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool>;
    /// Drop the lease if `holder` owns it.
    async fn release_lease(&self, name: &str, holder: &str) -> Result<()>;
}

fn lease_expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now + ttl
}

/// SQLx implementation of StateStore backed by the `app_state` table.
pub struct SqlxStateStore {
    pool: SqlitePool,
}

impl SqlxStateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for SqlxStateStore {
    async fn get_timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM app_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some((raw,)) = row else {
            return Ok(None);
        };

        DateTime::parse_from_rfc3339(&raw)
            .map(|at| Some(at.with_timezone(&Utc)))
            .map_err(|e| Error::validation(format!("invalid timestamp stored under '{}': {}", key, e)))
    }

    async fn set_timestamp(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO app_state (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM app_state WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO sweep_leases (name, holder, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                holder = excluded.holder,
                expires_at = excluded.expires_at
            WHERE sweep_leases.expires_at <= ?
            "#,
        )
        .bind(name)
        .bind(holder)
        .bind(lease_expiry(now, ttl).timestamp_millis())
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn renew_lease(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE sweep_leases SET expires_at = ? WHERE name = ? AND holder = ?")
                .bind(lease_expiry(now, ttl).timestamp_millis())
                .bind(name)
                .bind(holder)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_lease(&self, name: &str, holder: &str) -> Result<()> {
        sqlx::query("DELETE FROM sweep_leases WHERE name = ? AND holder = ?")
            .bind(name)
            .bind(holder)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// In-memory StateStore, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<String, DateTime<Utc>>>,
    leases: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.values.lock().get(key).copied())
    }

    async fn set_timestamp(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        self.values.lock().insert(key.to_string(), at);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool> {
        let mut leases = self.leases.lock();
        if leases.get(name).is_some_and(|(_, expires_at)| *expires_at > now) {
            return Ok(false);
        }
        leases.insert(name.to_string(), (holder.to_string(), lease_expiry(now, ttl)));
        Ok(true)
    }

    async fn renew_lease(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool> {
        match self.leases.lock().get_mut(name) {
            Some((owner, expires_at)) if owner == holder => {
                *expires_at = lease_expiry(now, ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_lease(&self, name: &str, holder: &str) -> Result<()> {
        let mut leases = self.leases.lock();
        if leases.get(name).is_some_and(|(owner, _)| owner == holder) {
            leases.remove(name);
        }
        Ok(())
    }
}
