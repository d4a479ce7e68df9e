mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use modwatch::catalog::CurseForgeUpdateSource;
use modwatch::config::AppConfig;
use modwatch::database::repositories::{
    ActivityRepository, SettingsRepository, SqlxActivityRepository, SqlxModRepository,
    SqlxSettingsRepository, SqlxStateStore, SqlxWebhookRepository, WebhookRepository,
};
use modwatch::database::{self, DbPool};
use modwatch::domain::{Webhook, WebhookTemplate};
use modwatch::logging;
use modwatch::monitor::{
    CheckEventBroadcaster, CheckOrchestrator, CooldownGate, EventDedup, SweepOutcome, TokioPacer,
    UpdateEvaluator, UpdateScheduler, UpdateService,
};
use modwatch::notification::{DiscordChannel, NotificationDispatcher};
use modwatch::tracking::TrackingManager;
use modwatch::utils::http_client;

use crate::cli::{Args, Commands};

struct App {
    config: AppConfig,
    pool: DbPool,
    settings: Arc<SqlxSettingsRepository>,
    webhooks: Arc<SqlxWebhookRepository>,
    activities: Arc<SqlxActivityRepository>,
    state: Arc<SqlxStateStore>,
    channel: Arc<DiscordChannel>,
    orchestrator: Arc<CheckOrchestrator>,
    tracking: TrackingManager,
}

impl App {
    async fn build(config: AppConfig) -> anyhow::Result<Self> {
        let pool = database::connect(&config.database_url)
            .await
            .context("failed to open database")?;

        let mods = Arc::new(SqlxModRepository::new(pool.clone()));
        let webhooks = Arc::new(SqlxWebhookRepository::new(pool.clone()));
        let settings = Arc::new(SqlxSettingsRepository::new(pool.clone()));
        let activities = Arc::new(SqlxActivityRepository::new(pool.clone()));
        let state = Arc::new(SqlxStateStore::new(pool.clone()));

        let client = http_client::build_client(config.request_timeout)?;
        let source = Arc::new(CurseForgeUpdateSource::new(
            client.clone(),
            config.catalog_base_url.clone(),
            mods.clone(),
            activities.clone(),
        ));
        let channel = Arc::new(DiscordChannel::new(client, webhooks.clone()));
        let dispatcher = NotificationDispatcher::new(
            channel.clone(),
            Arc::new(TokioPacer),
            config.pacing,
        )
        .with_activity_log(activities.clone());

        let orchestrator = Arc::new(
            CheckOrchestrator::new(
                mods.clone(),
                settings.clone(),
                UpdateEvaluator::new(source.clone()),
                Arc::new(dispatcher),
                CheckEventBroadcaster::new(),
            )
            .with_lease(state.clone(), config.sweep_lease_ttl),
        );

        let tracking = TrackingManager::new(
            mods,
            webhooks.clone(),
            activities.clone(),
            settings.clone(),
            source,
        );

        Ok(Self {
            config,
            pool,
            settings,
            webhooks,
            activities,
            state,
            channel,
            orchestrator,
            tracking,
        })
    }

    fn service(&self) -> UpdateService {
        UpdateService::new(
            self.orchestrator.clone(),
            self.settings.clone(),
            self.state.clone(),
            CooldownGate::new(self.state.clone(), self.config.manual_cooldown),
        )
    }

    async fn run(&self) -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        logging::start_retention_cleanup(&self.config.log_dir, cancel.clone());

        let scheduler = UpdateScheduler::new(
            self.orchestrator.clone(),
            self.settings.clone(),
            self.state.clone(),
            Arc::new(EventDedup::new(self.config.event_dedup_window)),
        );
        let scheduler_cancel = cancel.clone();
        let handle = tokio::spawn(async move { scheduler.run(scheduler_cancel).await });

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        info!("Shutdown requested");
        cancel.cancel();
        handle.await.context("scheduler task panicked")?;
        Ok(())
    }

    async fn check(&self) -> anyhow::Result<()> {
        match self.service().check_now().await? {
            SweepOutcome::Completed(summary) => {
                let delivered: usize = summary.dispatches.iter().map(|d| d.delivered_count()).sum();
                let failed: usize = summary.dispatches.iter().map(|d| d.failed_count()).sum();
                println!(
                    "Checked {} mods: {}, {} notifications sent, {} failed, {} mods could not be checked",
                    summary.evaluated,
                    if summary.updates_found { "updates found" } else { "no updates" },
                    delivered,
                    failed,
                    summary.failed_items.len(),
                );
            }
            SweepOutcome::AlreadyRunning => println!("A check is already running"),
            SweepOutcome::Failed(e) => anyhow::bail!("check failed: {}", e),
        }
        Ok(())
    }

    async fn list_mods(&self) -> anyhow::Result<()> {
        for tracked in self.tracking.list_mods().await? {
            let webhooks: Vec<String> = tracked.webhook_ids.iter().map(i64::to_string).collect();
            println!(
                "{:>4}  {:<32} {:<16} cf:{:<8} released {}  webhooks [{}]",
                tracked.id,
                tracked.name,
                tracked.game_name,
                tracked.curseforge_id,
                tracked.last_updated,
                webhooks.join(", ")
            );
        }
        Ok(())
    }

    async fn list_webhooks(&self) -> anyhow::Result<()> {
        for webhook in self.tracking.list_webhooks().await? {
            println!(
                "{:>4}  {:<24} {:<8} {:<8} {}",
                webhook.id,
                webhook.name,
                if webhook.enabled { "enabled" } else { "disabled" },
                if webhook.use_custom_template { "custom" } else { "default" },
                webhook.url
            );
        }
        Ok(())
    }

    async fn test_webhook(&self, webhook_id: i64) -> anyhow::Result<()> {
        let webhook = self.webhooks.get_webhook(webhook_id).await?;
        self.channel
            .send_test(&webhook)
            .await
            .with_context(|| format!("test message to \"{}\" failed", webhook.name))?;
        println!("Test message sent to \"{}\"", webhook.name);
        Ok(())
    }

    async fn set_template(&self, file: &Path, webhook: Option<i64>) -> anyhow::Result<()> {
        let raw = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("failed to read {}", file.display()))?;
        let mut template: WebhookTemplate = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a valid template", file.display()))?;
        if webhook.is_some() {
            template.webhook_id = webhook;
        }
        self.tracking.set_template(&template).await?;
        match template.webhook_id {
            Some(id) => println!("Custom template saved for webhook {}", id),
            None => println!("Default template saved"),
        }
        Ok(())
    }

    async fn activity(&self, limit: i64) -> anyhow::Result<()> {
        for entry in self.activities.recent_activities(limit).await? {
            println!(
                "{}  {:<18} {}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.activity_type,
                entry.description
            );
        }
        Ok(())
    }

    async fn execute(&self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Run => self.run().await?,
            Commands::Check => self.check().await?,
            Commands::SetInterval { minutes } => {
                self.service().set_update_interval(minutes).await?;
                println!("Update interval set to {} minutes", minutes);
            }
            Commands::SetApiKey { key } => {
                self.settings.set_api_key(&key).await?;
                println!("API key saved");
            }
            Commands::Mods => self.list_mods().await?,
            Commands::AddMod { curseforge_id } => {
                let tracked = self.tracking.add_mod(curseforge_id).await?;
                println!(
                    "Tracking \"{}\" ({}) as mod {}",
                    tracked.name, tracked.game_name, tracked.id
                );
            }
            Commands::RemoveMod { mod_id } => {
                let tracked = self.tracking.remove_mod(mod_id).await?;
                println!("Stopped tracking \"{}\"", tracked.name);
            }
            Commands::Webhooks => self.list_webhooks().await?,
            Commands::AddWebhook {
                name,
                url,
                username,
                avatar_url,
                disabled,
            } => {
                let mut webhook = Webhook::new(0, name, url);
                webhook.username = username;
                webhook.avatar_url = avatar_url;
                webhook.enabled = !disabled;
                let webhook = self.tracking.add_webhook(webhook).await?;
                println!("Added webhook \"{}\" as {}", webhook.name, webhook.id);
            }
            Commands::RemoveWebhook { webhook_id } => {
                let webhook = self.tracking.remove_webhook(webhook_id).await?;
                println!("Removed webhook \"{}\"", webhook.name);
            }
            Commands::TestWebhook { webhook_id } => self.test_webhook(webhook_id).await?,
            Commands::EnableWebhook { webhook_id } => {
                self.tracking.set_webhook_enabled(webhook_id, true).await?;
                println!("Webhook {} enabled", webhook_id);
            }
            Commands::DisableWebhook { webhook_id } => {
                self.tracking.set_webhook_enabled(webhook_id, false).await?;
                println!("Webhook {} disabled", webhook_id);
            }
            Commands::Assign { mod_id, webhook_id } => {
                self.tracking.assign(mod_id, webhook_id).await?;
                println!("Mod {} now announces on webhook {}", mod_id, webhook_id);
            }
            Commands::Unassign { mod_id, webhook_id } => {
                self.tracking.unassign(mod_id, webhook_id).await?;
                println!("Mod {} no longer announces on webhook {}", mod_id, webhook_id);
            }
            Commands::SetTemplate { file, webhook } => self.set_template(&file, webhook).await?,
            Commands::ResetTemplate { webhook_id } => {
                self.tracking.reset_template(webhook_id).await?;
                println!("Webhook {} uses the default template again", webhook_id);
            }
            Commands::Activity { limit } => self.activity(limit).await?,
            Commands::ClearActivity => {
                let removed = self.tracking.clear_activity().await?;
                println!("Removed {} activity entries", removed);
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::load();

    let config = AppConfig::from_env_or_default()?;
    let _guard = logging::init_logging(&config.log_dir)?;

    let app = App::build(config).await?;
    let result = app.execute(args.command).await;

    if let Err(e) = &result {
        error!("Application error: {:#}", e);
    }
    app.pool.close().await;
    result
}
