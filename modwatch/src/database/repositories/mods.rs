//! Tracked mod repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::{TrackedMod, Webhook};
use crate::{Error, Result};

use super::webhooks::WebhookRow;

/// Tracked mod repository trait.
#[async_trait]
pub trait ModRepository: Send + Sync {
    /// All tracked mods with their assigned webhook ids, ordered by game then name.
    async fn list_mods(&self) -> Result<Vec<TrackedMod>>;
    /// Webhooks assigned to a mod, ordered by name.
    async fn get_assigned_webhooks(&self, mod_id: i64) -> Result<Vec<Webhook>>;
    /// Record the release date of the newest version seen for a mod.
    async fn update_last_updated(&self, mod_id: i64, last_updated: &str) -> Result<()>;
}

#[derive(sqlx::FromRow)]
struct ModRow {
    id: i64,
    curseforge_id: i64,
    name: String,
    game_name: String,
    last_updated: String,
    page_url: Option<String>,
    webhook_ids: Option<String>,
}

impl From<ModRow> for TrackedMod {
    fn from(row: ModRow) -> Self {
        let webhook_ids = row
            .webhook_ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|id| id.trim().parse::<i64>().ok())
            .collect();

        Self {
            id: row.id,
            curseforge_id: row.curseforge_id,
            name: row.name,
            game_name: row.game_name,
            last_updated: row.last_updated,
            page_url: row.page_url,
            webhook_ids,
        }
    }
}

/// SQLx implementation of ModRepository.
pub struct SqlxModRepository {
    pool: SqlitePool,
}

impl SqlxModRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_mod(&self, mod_id: i64) -> Result<TrackedMod> {
        sqlx::query_as::<_, ModRow>(
            r#"
            SELECT m.id, m.curseforge_id, m.name, m.game_name, m.last_updated, m.page_url,
                   GROUP_CONCAT(a.webhook_id) AS webhook_ids
            FROM mods m
            LEFT JOIN mod_webhook_assignments a ON a.mod_id = m.id
            WHERE m.id = ?
            GROUP BY m.id
            "#,
        )
        .bind(mod_id)
        .fetch_optional(&self.pool)
        .await?
        .map(TrackedMod::from)
        .ok_or_else(|| Error::not_found("Mod", mod_id.to_string()))
    }

    /// Whether a mod with this CurseForge id is already tracked.
    pub async fn is_tracked(&self, curseforge_id: i64) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM mods WHERE curseforge_id = ?")
            .bind(curseforge_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Start tracking a mod. Returns the new local id.
    pub async fn insert_mod(&self, tracked: &TrackedMod) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO mods (curseforge_id, name, game_name, last_updated, page_url)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(tracked.curseforge_id)
        .bind(&tracked.name)
        .bind(&tracked.game_name)
        .bind(&tracked.last_updated)
        .bind(&tracked.page_url)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Stop tracking a mod. Assignments go with it.
    pub async fn delete_mod(&self, mod_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM mods WHERE id = ?")
            .bind(mod_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("Mod", mod_id.to_string()));
        }
        Ok(())
    }

    pub async fn assign_webhook(&self, mod_id: i64, webhook_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO mod_webhook_assignments (mod_id, webhook_id) VALUES (?, ?)",
        )
        .bind(mod_id)
        .bind(webhook_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn unassign_webhook(&self, mod_id: i64, webhook_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM mod_webhook_assignments WHERE mod_id = ? AND webhook_id = ?")
            .bind(mod_id)
            .bind(webhook_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ModRepository for SqlxModRepository {
    async fn list_mods(&self) -> Result<Vec<TrackedMod>> {
        let rows = sqlx::query_as::<_, ModRow>(
            r#"
            SELECT m.id, m.curseforge_id, m.name, m.game_name, m.last_updated, m.page_url,
                   GROUP_CONCAT(a.webhook_id) AS webhook_ids
            FROM mods m
            LEFT JOIN mod_webhook_assignments a ON a.mod_id = m.id
            GROUP BY m.id
            ORDER BY m.game_name, m.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TrackedMod::from).collect())
    }

    async fn get_assigned_webhooks(&self, mod_id: i64) -> Result<Vec<Webhook>> {
        let rows = sqlx::query_as::<_, WebhookRow>(
            r#"
            SELECT w.id, w.name, w.url, w.avatar_url, w.username, w.enabled, w.use_custom_template
            FROM webhooks w
            INNER JOIN mod_webhook_assignments a ON a.webhook_id = w.id
            WHERE a.mod_id = ?
            ORDER BY w.name
            "#,
        )
        .bind(mod_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Webhook::from).collect())
    }

    async fn update_last_updated(&self, mod_id: i64, last_updated: &str) -> Result<()> {
        let result = sqlx::query("UPDATE mods SET last_updated = ? WHERE id = ?")
            .bind(last_updated)
            .bind(mod_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("Mod", mod_id.to_string()));
        }
        Ok(())
    }
}
