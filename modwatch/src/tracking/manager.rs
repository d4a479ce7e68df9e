//! Tracking manager implementation.
//!
//! Every change is written to the database first and then recorded in the
//! activity log. Activity logging failures are reported but never undo the
//! change.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use url::Url;

use crate::catalog::{Credential, ModLookup};
use crate::database::repositories::{
    ActivityRepository, ModRepository, NewActivity, SettingsRepository, SqlxActivityRepository,
    SqlxModRepository, SqlxWebhookRepository, WebhookRepository, kind,
};
use crate::domain::{TrackedMod, Webhook, WebhookTemplate};
use crate::{Error, Result};

/// Adds, removes and links the things the update pipeline works on.
pub struct TrackingManager {
    mods: Arc<SqlxModRepository>,
    webhooks: Arc<SqlxWebhookRepository>,
    activities: Arc<SqlxActivityRepository>,
    settings: Arc<dyn SettingsRepository>,
    lookup: Arc<dyn ModLookup>,
}

impl TrackingManager {
    pub fn new(
        mods: Arc<SqlxModRepository>,
        webhooks: Arc<SqlxWebhookRepository>,
        activities: Arc<SqlxActivityRepository>,
        settings: Arc<dyn SettingsRepository>,
        lookup: Arc<dyn ModLookup>,
    ) -> Self {
        Self {
            mods,
            webhooks,
            activities,
            settings,
            lookup,
        }
    }

    pub async fn list_mods(&self) -> Result<Vec<TrackedMod>> {
        self.mods.list_mods().await
    }

    pub async fn list_webhooks(&self) -> Result<Vec<Webhook>> {
        self.webhooks.list_webhooks().await
    }

    /// Start tracking a CurseForge mod.
    ///
    /// The current release becomes the baseline, so only later releases are
    /// announced. A mod already tracked is rejected before the catalog is
    /// asked.
    pub async fn add_mod(&self, curseforge_id: i64) -> Result<TrackedMod> {
        if self.mods.is_tracked(curseforge_id).await? {
            return Err(Error::validation(format!(
                "A mod with CurseForge ID {} is already tracked",
                curseforge_id
            )));
        }

        let credential = self
            .settings
            .get_api_key()
            .await?
            .map(Credential::new)
            .ok_or(Error::MissingCredential)?;

        let mut tracked = self.lookup.lookup_mod(curseforge_id, &credential).await?;
        tracked.id = self.mods.insert_mod(&tracked).await?;
        info!(mod_id = tracked.id, curseforge_id, "Now tracking {}", tracked.name);

        self.record(
            NewActivity::new(kind::MOD_ADDED, format!("Added mod \"{}\"", tracked.name))
                .with_mod(tracked.id, tracked.name.clone())
                .with_metadata(json!({
                    "game": tracked.game_name,
                    "curseforge_id": curseforge_id,
                    "initial_version_date": tracked.last_updated,
                    "page_url": tracked.page_url,
                })),
        )
        .await;
        Ok(tracked)
    }

    /// Stop tracking a mod. Returns what was removed.
    pub async fn remove_mod(&self, mod_id: i64) -> Result<TrackedMod> {
        let tracked = self.mods.get_mod(mod_id).await?;
        self.mods.delete_mod(mod_id).await?;
        info!(mod_id, "Stopped tracking {}", tracked.name);

        // The row is gone, so only the name can be kept on the entry.
        let mut activity =
            NewActivity::new(kind::MOD_REMOVED, format!("Removed mod \"{}\"", tracked.name))
                .with_metadata(json!({ "curseforge_id": tracked.curseforge_id }));
        activity.mod_name = Some(tracked.name.clone());
        self.record(activity).await;
        Ok(tracked)
    }

    /// Register a webhook. Only http(s) URLs are accepted.
    pub async fn add_webhook(&self, mut webhook: Webhook) -> Result<Webhook> {
        if webhook.name.trim().is_empty() {
            return Err(Error::validation("Webhook name must not be empty"));
        }
        let url = Url::parse(&webhook.url)
            .map_err(|e| Error::validation(format!("invalid webhook url '{}': {}", webhook.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::validation(format!(
                "webhook url must be http or https, got '{}'",
                url.scheme()
            )));
        }

        webhook.id = self.webhooks.insert_webhook(&webhook).await?;
        info!(webhook_id = webhook.id, "Added webhook {}", webhook.name);
        self.record(
            NewActivity::new(kind::WEBHOOK_ADDED, format!("Added webhook \"{}\"", webhook.name))
                .with_metadata(json!({
                    "webhook_name": webhook.name,
                    "webhook_id": webhook.id,
                })),
        )
        .await;
        Ok(webhook)
    }

    /// Remove a webhook with its assignments and custom template.
    pub async fn remove_webhook(&self, webhook_id: i64) -> Result<Webhook> {
        let webhook = self.webhooks.get_webhook(webhook_id).await?;
        self.webhooks.delete_webhook(webhook_id).await?;
        info!(webhook_id, "Removed webhook {}", webhook.name);
        self.record(
            NewActivity::new(
                kind::WEBHOOK_REMOVED,
                format!("Removed webhook \"{}\"", webhook.name),
            )
            .with_metadata(json!({
                "webhook_name": webhook.name,
                "webhook_id": webhook_id,
            })),
        )
        .await;
        Ok(webhook)
    }

    pub async fn set_webhook_enabled(&self, webhook_id: i64, enabled: bool) -> Result<()> {
        self.webhooks.set_enabled(webhook_id, enabled).await?;
        info!(webhook_id, enabled, "Webhook toggled");
        Ok(())
    }

    /// Announce updates of `mod_id` on `webhook_id`. Assigning twice is a no-op.
    pub async fn assign(&self, mod_id: i64, webhook_id: i64) -> Result<()> {
        let tracked = self.mods.get_mod(mod_id).await?;
        let webhook = self.webhooks.get_webhook(webhook_id).await?;
        self.mods.assign_webhook(mod_id, webhook_id).await?;
        self.record(
            NewActivity::new(
                kind::WEBHOOK_ASSIGNED,
                format!(
                    "Assigned webhook \"{}\" to mod \"{}\"",
                    webhook.name, tracked.name
                ),
            )
            .with_mod(mod_id, tracked.name)
            .with_metadata(json!({
                "webhook_name": webhook.name,
                "webhook_id": webhook_id,
            })),
        )
        .await;
        Ok(())
    }

    pub async fn unassign(&self, mod_id: i64, webhook_id: i64) -> Result<()> {
        let tracked = self.mods.get_mod(mod_id).await?;
        let webhook = self.webhooks.get_webhook(webhook_id).await?;
        self.mods.unassign_webhook(mod_id, webhook_id).await?;
        self.record(
            NewActivity::new(
                kind::WEBHOOK_UNASSIGNED,
                format!(
                    "Removed webhook \"{}\" from mod \"{}\"",
                    webhook.name, tracked.name
                ),
            )
            .with_mod(mod_id, tracked.name)
            .with_metadata(json!({
                "webhook_name": webhook.name,
                "webhook_id": webhook_id,
            })),
        )
        .await;
        Ok(())
    }

    /// Save a template. A template bound to a webhook also switches that
    /// webhook over to it.
    pub async fn set_template(&self, template: &WebhookTemplate) -> Result<()> {
        if template.title.trim().is_empty() {
            return Err(Error::validation("Template title must not be empty"));
        }
        if let Some(webhook_id) = template.webhook_id {
            self.webhooks.get_webhook(webhook_id).await?;
        }
        self.webhooks.upsert_template(template).await?;
        if let Some(webhook_id) = template.webhook_id {
            self.webhooks.set_use_custom_template(webhook_id, true).await?;
        }
        Ok(())
    }

    /// Drop a webhook's own template; it goes back to the default one.
    pub async fn reset_template(&self, webhook_id: i64) -> Result<()> {
        self.webhooks.set_use_custom_template(webhook_id, false).await?;
        self.webhooks.delete_custom_template(webhook_id).await
    }

    /// Clear the activity log. Returns the number of removed entries.
    pub async fn clear_activity(&self) -> Result<u64> {
        let removed = self.activities.clear_activities().await?;
        info!(removed, "Activity history cleared");
        Ok(removed)
    }

    async fn record(&self, activity: NewActivity) {
        if let Err(e) = self.activities.add_activity(activity).await {
            warn!(error = %e, "Failed to record activity");
        }
    }
}
