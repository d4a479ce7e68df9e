//! Activity log repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::Result;

/// Number of activity entries kept; older ones are evicted on insert.
pub const MAX_ACTIVITIES: i64 = 50;

/// Activity kinds recorded by the pipeline.
pub mod kind {
    pub const MOD_ADDED: &str = "mod_added";
    pub const MOD_REMOVED: &str = "mod_removed";
    pub const WEBHOOK_ADDED: &str = "webhook_added";
    pub const WEBHOOK_REMOVED: &str = "webhook_removed";
    pub const WEBHOOK_ASSIGNED: &str = "webhook_assigned";
    pub const WEBHOOK_UNASSIGNED: &str = "webhook_unassigned";
    pub const MOD_UPDATED: &str = "mod_updated";
    pub const NOTIFICATION_SENT: &str = "notification_sent";
    pub const WEBHOOK_ERROR: &str = "webhook_error";
}

/// An entry in the user-facing activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Activity {
    pub id: i64,
    pub activity_type: String,
    pub mod_id: Option<i64>,
    pub mod_name: Option<String>,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    /// Free-form JSON payload.
    pub metadata: Option<String>,
}

/// Activity to be recorded. The id and timestamp are assigned on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub activity_type: String,
    pub mod_id: Option<i64>,
    pub mod_name: Option<String>,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
}

impl NewActivity {
    pub fn new(activity_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            activity_type: activity_type.into(),
            mod_id: None,
            mod_name: None,
            description: description.into(),
            metadata: None,
        }
    }

    pub fn with_mod(mut self, mod_id: i64, mod_name: impl Into<String>) -> Self {
        self.mod_id = Some(mod_id);
        self.mod_name = Some(mod_name.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Activity repository trait.
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn add_activity(&self, activity: NewActivity) -> Result<()>;
    /// Most recent entries first.
    async fn recent_activities(&self, limit: i64) -> Result<Vec<Activity>>;
}

/// SQLx implementation of ActivityRepository.
pub struct SqlxActivityRepository {
    pool: SqlitePool,
}

impl SqlxActivityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete the whole history. Returns the number of entries removed.
    pub async fn clear_activities(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM activities")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ActivityRepository for SqlxActivityRepository {
    async fn add_activity(&self, activity: NewActivity) -> Result<()> {
        let metadata = activity
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO activities (activity_type, mod_id, mod_name, description, timestamp, metadata)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&activity.activity_type)
        .bind(activity.mod_id)
        .bind(&activity.mod_name)
        .bind(&activity.description)
        .bind(Utc::now())
        .bind(metadata)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM activities WHERE id NOT IN (
                SELECT id FROM activities ORDER BY id DESC LIMIT ?
            )
            "#,
        )
        .bind(MAX_ACTIVITIES)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn recent_activities(&self, limit: i64) -> Result<Vec<Activity>> {
        let rows = sqlx::query_as::<_, Activity>(
            r#"
            SELECT id, activity_type, mod_id, mod_name, description, timestamp, metadata
            FROM activities
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
