//! Webhook and template repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::{EmbedField, Webhook, WebhookTemplate};
use crate::{Error, Result};

/// Webhook repository trait.
#[async_trait]
pub trait WebhookRepository: Send + Sync {
    async fn get_webhook(&self, id: i64) -> Result<Webhook>;
    async fn list_webhooks(&self) -> Result<Vec<Webhook>>;
    /// Template for a webhook, or the default template for `None`.
    ///
    /// A webhook without its own template falls back to the default one.
    async fn get_template(&self, webhook_id: Option<i64>) -> Result<WebhookTemplate>;
}

#[derive(sqlx::FromRow)]
pub(crate) struct WebhookRow {
    id: i64,
    name: String,
    url: String,
    avatar_url: Option<String>,
    username: Option<String>,
    enabled: bool,
    use_custom_template: bool,
}

impl From<WebhookRow> for Webhook {
    fn from(row: WebhookRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            url: row.url,
            avatar_url: row.avatar_url,
            username: row.username,
            enabled: row.enabled,
            use_custom_template: row.use_custom_template,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TemplateRow {
    webhook_id: Option<i64>,
    title: String,
    color: i64,
    content: Option<String>,
    use_embed: bool,
    author_name: Option<String>,
    author_icon_url: Option<String>,
    footer_text: Option<String>,
    footer_icon_url: Option<String>,
    include_timestamp: bool,
    embed_fields: String,
}

impl TryFrom<TemplateRow> for WebhookTemplate {
    type Error = Error;

    fn try_from(row: TemplateRow) -> Result<Self> {
        let embed_fields: Vec<EmbedField> = serde_json::from_str(&row.embed_fields)?;
        let color = u32::try_from(row.color)
            .map_err(|_| Error::validation(format!("embed color out of range: {}", row.color)))?;
        Ok(Self {
            webhook_id: row.webhook_id,
            title: row.title,
            color,
            content: row.content,
            use_embed: row.use_embed,
            author_name: row.author_name,
            author_icon_url: row.author_icon_url,
            footer_text: row.footer_text,
            footer_icon_url: row.footer_icon_url,
            include_timestamp: row.include_timestamp,
            embed_fields,
        })
    }
}

const TEMPLATE_COLUMNS: &str = "webhook_id, title, color, content, use_embed, author_name, \
     author_icon_url, footer_text, footer_icon_url, include_timestamp, embed_fields";

/// SQLx implementation of WebhookRepository.
pub struct SqlxWebhookRepository {
    pool: SqlitePool,
}

impl SqlxWebhookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a webhook. Returns the new id.
    pub async fn insert_webhook(&self, webhook: &Webhook) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhooks (name, url, avatar_url, username, enabled, use_custom_template)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&webhook.name)
        .bind(&webhook.url)
        .bind(&webhook.avatar_url)
        .bind(&webhook.username)
        .bind(webhook.enabled)
        .bind(webhook.use_custom_template)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn set_enabled(&self, id: i64, enabled: bool) -> Result<()> {
        let result = sqlx::query("UPDATE webhooks SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("Webhook", id.to_string()));
        }
        Ok(())
    }

    /// Remove a webhook together with its assignments and custom template.
    pub async fn delete_webhook(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM webhooks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("Webhook", id.to_string()));
        }
        Ok(())
    }

    pub async fn set_use_custom_template(&self, id: i64, use_custom: bool) -> Result<()> {
        let result = sqlx::query("UPDATE webhooks SET use_custom_template = ? WHERE id = ?")
            .bind(use_custom)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("Webhook", id.to_string()));
        }
        Ok(())
    }

    /// Drop a webhook's own template. The default template cannot be deleted.
    pub async fn delete_custom_template(&self, webhook_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM webhook_templates WHERE webhook_id = ? AND is_default = 0")
            .bind(webhook_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Save a template. `webhook_id == None` overwrites the default template.
    pub async fn upsert_template(&self, template: &WebhookTemplate) -> Result<()> {
        let fields = serde_json::to_string(&template.embed_fields)?;

        let existing: Option<(i64,)> = match template.webhook_id {
            Some(id) => {
                sqlx::query_as("SELECT id FROM webhook_templates WHERE webhook_id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT id FROM webhook_templates WHERE is_default = 1")
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        match existing {
            Some((row_id,)) => {
                sqlx::query(
                    r#"
                    UPDATE webhook_templates SET
                        title = ?, color = ?, content = ?, use_embed = ?,
                        author_name = ?, author_icon_url = ?, footer_text = ?,
                        footer_icon_url = ?, include_timestamp = ?, embed_fields = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&template.title)
                .bind(i64::from(template.color))
                .bind(&template.content)
                .bind(template.use_embed)
                .bind(&template.author_name)
                .bind(&template.author_icon_url)
                .bind(&template.footer_text)
                .bind(&template.footer_icon_url)
                .bind(template.include_timestamp)
                .bind(&fields)
                .bind(row_id)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO webhook_templates (
                        is_default, webhook_id, title, color, content, use_embed,
                        author_name, author_icon_url, footer_text, footer_icon_url,
                        include_timestamp, embed_fields
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(template.webhook_id.is_none())
                .bind(template.webhook_id)
                .bind(&template.title)
                .bind(i64::from(template.color))
                .bind(&template.content)
                .bind(template.use_embed)
                .bind(&template.author_name)
                .bind(&template.author_icon_url)
                .bind(&template.footer_text)
                .bind(&template.footer_icon_url)
                .bind(template.include_timestamp)
                .bind(&fields)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    async fn default_template(&self) -> Result<WebhookTemplate> {
        let sql = format!(
            "SELECT {} FROM webhook_templates WHERE is_default = 1 LIMIT 1",
            TEMPLATE_COLUMNS
        );
        match sqlx::query_as::<_, TemplateRow>(&sql)
            .fetch_optional(&self.pool)
            .await?
        {
            Some(row) => row.try_into(),
            None => Ok(WebhookTemplate::default()),
        }
    }
}

#[async_trait]
impl WebhookRepository for SqlxWebhookRepository {
    async fn get_webhook(&self, id: i64) -> Result<Webhook> {
        sqlx::query_as::<_, WebhookRow>(
            r#"
            SELECT id, name, url, avatar_url, username, enabled, use_custom_template
            FROM webhooks WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Webhook::from)
        .ok_or_else(|| Error::not_found("Webhook", id.to_string()))
    }

    async fn list_webhooks(&self) -> Result<Vec<Webhook>> {
        let rows = sqlx::query_as::<_, WebhookRow>(
            r#"
            SELECT id, name, url, avatar_url, username, enabled, use_custom_template
            FROM webhooks ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Webhook::from).collect())
    }

    async fn get_template(&self, webhook_id: Option<i64>) -> Result<WebhookTemplate> {
        let Some(id) = webhook_id else {
            return self.default_template().await;
        };

        let sql = format!(
            "SELECT {} FROM webhook_templates WHERE webhook_id = ?",
            TEMPLATE_COLUMNS
        );
        match sqlx::query_as::<_, TemplateRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        {
            Some(row) => row.try_into(),
            None => self.default_template().await,
        }
    }
}
