//! Integration tests for the SQLite repositories.
//!
//! Each test runs against a fresh database file with migrations applied.

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use tempfile::TempDir;

use modwatch::Error;
use modwatch::database::repositories::{
    ActivityRepository, MAX_ACTIVITIES, ModRepository, NewActivity, SettingsRepository,
    SqlxActivityRepository, SqlxModRepository, SqlxSettingsRepository, SqlxStateStore,
    SqlxWebhookRepository, StateStore, WebhookRepository,
};
use modwatch::database::{DbPool, connect};
use modwatch::domain::webhook::{DEFAULT_EMBED_COLOR, DEFAULT_TITLE};
use modwatch::domain::{EmbedField, TrackedMod, Webhook, WebhookTemplate};

/// Helper to create a test database with migrations applied.
async fn setup_test_db() -> (TempDir, DbPool) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("test.db").display());
    let pool = connect(&url).await.expect("Failed to open test database");
    (dir, pool)
}

fn tracked(curseforge_id: i64, name: &str, game: &str) -> TrackedMod {
    let mut m = TrackedMod::new(0, curseforge_id, name, "2026-10-01T08:00:00Z");
    m.game_name = game.to_string();
    m
}

mod schema_tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let (_dir, pool) = setup_test_db().await;

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .expect("Failed to query tables");
        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();

        for table in [
            "mods",
            "webhooks",
            "mod_webhook_assignments",
            "webhook_templates",
            "settings",
            "activities",
            "app_state",
            "sweep_leases",
        ] {
            assert!(names.contains(&table), "{} table missing", table);
        }
    }

    #[tokio::test]
    async fn test_wal_mode_enabled() {
        let (_dir, pool) = setup_test_db().await;
        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}

mod mod_repository_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_mods_orders_and_collects_webhooks() {
        let (_dir, pool) = setup_test_db().await;
        let mods = SqlxModRepository::new(pool.clone());
        let webhooks = SqlxWebhookRepository::new(pool.clone());

        let zeta = mods.insert_mod(&tracked(1, "Zeta", "Minecraft")).await.unwrap();
        let alpha = mods.insert_mod(&tracked(2, "Alpha", "Minecraft")).await.unwrap();
        let other = mods.insert_mod(&tracked(3, "Beta", "Ark")).await.unwrap();

        let hook_a = webhooks
            .insert_webhook(&Webhook::new(0, "A", "https://discord.test/a"))
            .await
            .unwrap();
        let hook_b = webhooks
            .insert_webhook(&Webhook::new(0, "B", "https://discord.test/b"))
            .await
            .unwrap();
        mods.assign_webhook(alpha, hook_a).await.unwrap();
        mods.assign_webhook(alpha, hook_b).await.unwrap();
        mods.assign_webhook(alpha, hook_b).await.unwrap();

        let listed = mods.list_mods().await.unwrap();
        let ids: Vec<i64> = listed.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![other, alpha, zeta]);

        let mut alpha_hooks = listed[1].webhook_ids.clone();
        alpha_hooks.sort();
        assert_eq!(alpha_hooks, vec![hook_a, hook_b]);
        assert!(listed[0].webhook_ids.is_empty());
    }

    #[tokio::test]
    async fn test_assigned_webhooks_ordered_by_name() {
        let (_dir, pool) = setup_test_db().await;
        let mods = SqlxModRepository::new(pool.clone());
        let webhooks = SqlxWebhookRepository::new(pool.clone());

        let mod_id = mods.insert_mod(&tracked(1, "Mod", "Game")).await.unwrap();
        let second = webhooks
            .insert_webhook(&Webhook::new(0, "second", "https://discord.test/2"))
            .await
            .unwrap();
        let first = webhooks
            .insert_webhook(&Webhook::new(0, "first", "https://discord.test/1"))
            .await
            .unwrap();
        webhooks.set_enabled(second, false).await.unwrap();
        mods.assign_webhook(mod_id, second).await.unwrap();
        mods.assign_webhook(mod_id, first).await.unwrap();

        let assigned = mods.get_assigned_webhooks(mod_id).await.unwrap();
        assert_eq!(assigned.len(), 2);
        assert_eq!(assigned[0].id, first);
        assert!(assigned[0].enabled);
        assert_eq!(assigned[1].id, second);
        assert!(!assigned[1].enabled);
    }

    #[tokio::test]
    async fn test_update_last_updated() {
        let (_dir, pool) = setup_test_db().await;
        let mods = SqlxModRepository::new(pool.clone());
        let id = mods.insert_mod(&tracked(1, "Mod", "Game")).await.unwrap();

        mods.update_last_updated(id, "2026-10-19T14:05:00Z").await.unwrap();
        assert_eq!(
            mods.list_mods().await.unwrap()[0].last_updated,
            "2026-10-19T14:05:00Z"
        );

        let err = mods.update_last_updated(9999, "x").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_mod_cascades_assignments() {
        let (_dir, pool) = setup_test_db().await;
        let mods = SqlxModRepository::new(pool.clone());
        let webhooks = SqlxWebhookRepository::new(pool.clone());

        let id = mods.insert_mod(&tracked(1, "Mod", "Game")).await.unwrap();
        let hook = webhooks
            .insert_webhook(&Webhook::new(0, "A", "https://discord.test/a"))
            .await
            .unwrap();
        mods.assign_webhook(id, hook).await.unwrap();
        mods.delete_mod(id).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM mod_webhook_assignments")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}

mod webhook_repository_tests {
    use super::*;

    #[tokio::test]
    async fn test_default_template_is_seeded() {
        let (_dir, pool) = setup_test_db().await;
        let webhooks = SqlxWebhookRepository::new(pool);

        let template = webhooks.get_template(None).await.unwrap();
        assert_eq!(template.title, DEFAULT_TITLE);
        assert_eq!(template.color, DEFAULT_EMBED_COLOR);
        assert_eq!(template, WebhookTemplate::default());
    }

    #[tokio::test]
    async fn test_custom_template_with_fallback() {
        let (_dir, pool) = setup_test_db().await;
        let webhooks = SqlxWebhookRepository::new(pool);
        let custom_id = webhooks
            .insert_webhook(&Webhook::new(0, "custom", "https://discord.test/c"))
            .await
            .unwrap();
        let plain_id = webhooks
            .insert_webhook(&Webhook::new(0, "plain", "https://discord.test/p"))
            .await
            .unwrap();

        let custom = WebhookTemplate {
            webhook_id: Some(custom_id),
            title: "{modName} updated".to_string(),
            color: 0xff0000,
            use_embed: false,
            content: Some("{everyone} {modName}".to_string()),
            embed_fields: vec![EmbedField::inline("File", "{latestModFileName}")],
            ..WebhookTemplate::default()
        };
        webhooks.upsert_template(&custom).await.unwrap();

        assert_eq!(webhooks.get_template(Some(custom_id)).await.unwrap(), custom);
        assert_eq!(
            webhooks.get_template(Some(plain_id)).await.unwrap(),
            WebhookTemplate::default()
        );

        let updated = WebhookTemplate {
            title: "changed".to_string(),
            ..custom.clone()
        };
        webhooks.upsert_template(&updated).await.unwrap();
        assert_eq!(
            webhooks.get_template(Some(custom_id)).await.unwrap().title,
            "changed"
        );
    }

    #[tokio::test]
    async fn test_get_missing_webhook() {
        let (_dir, pool) = setup_test_db().await;
        let webhooks = SqlxWebhookRepository::new(pool);
        assert!(matches!(
            webhooks.get_webhook(42).await,
            Err(Error::NotFound { .. })
        ));
        assert!(webhooks.list_webhooks().await.unwrap().is_empty());
    }
}

mod settings_tests {
    use super::*;

    #[tokio::test]
    async fn test_api_key_and_interval() {
        let (_dir, pool) = setup_test_db().await;
        let settings = SqlxSettingsRepository::new(pool);

        assert_eq!(settings.get_api_key().await.unwrap(), None);
        assert_eq!(settings.get_update_interval().await.unwrap(), 30);

        settings.set_api_key("  abc123  ").await.unwrap();
        assert_eq!(settings.get_api_key().await.unwrap().as_deref(), Some("abc123"));
        assert!(matches!(
            settings.set_api_key("   ").await,
            Err(Error::Validation(_))
        ));

        settings.set_update_interval(45).await.unwrap();
        assert_eq!(settings.get_update_interval().await.unwrap(), 45);
        assert!(settings.set_update_interval(0).await.is_err());
    }
}

mod activity_tests {
    use super::*;

    #[tokio::test]
    async fn test_activity_log_is_capped() {
        let (_dir, pool) = setup_test_db().await;
        let activities = SqlxActivityRepository::new(pool);

        for i in 0..(MAX_ACTIVITIES + 5) {
            activities
                .add_activity(
                    NewActivity::new("notification_sent", format!("entry {}", i))
                        .with_metadata(json!({ "n": i })),
                )
                .await
                .unwrap();
        }

        let recent = activities.recent_activities(100).await.unwrap();
        assert_eq!(recent.len() as i64, MAX_ACTIVITIES);
        assert_eq!(recent[0].description, format!("entry {}", MAX_ACTIVITIES + 4));
        assert_eq!(recent.last().unwrap().description, "entry 5");
        assert!(recent[0].metadata.as_deref().unwrap().contains("\"n\""));
    }
}

mod state_tests {
    use super::*;

    #[tokio::test]
    async fn test_timestamps_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("state.db").display());
        let deadline = Utc::now() + ChronoDuration::seconds(30);

        {
            let pool = connect(&url).await.unwrap();
            let store = SqlxStateStore::new(pool.clone());
            store.set_timestamp("update_check_cooldown", deadline).await.unwrap();
            pool.close().await;
        }

        let pool = connect(&url).await.unwrap();
        let store = SqlxStateStore::new(pool);
        let loaded = store
            .get_timestamp("update_check_cooldown")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.timestamp_micros(), deadline.timestamp_micros());

        store.clear("update_check_cooldown").await.unwrap();
        assert_eq!(store.get_timestamp("update_check_cooldown").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sweep_lease_across_connections() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("lease.db").display());
        // Two pools on one file, like a daemon and a one-off command.
        let daemon = SqlxStateStore::new(connect(&url).await.unwrap());
        let manual = SqlxStateStore::new(connect(&url).await.unwrap());
        let ttl = std::time::Duration::from_secs(60);
        let now = Utc::now();

        assert!(daemon.try_acquire_lease("update_sweep", "daemon", now, ttl).await.unwrap());
        assert!(!manual.try_acquire_lease("update_sweep", "manual", now, ttl).await.unwrap());
        assert!(daemon.renew_lease("update_sweep", "daemon", now, ttl).await.unwrap());
        assert!(!manual.renew_lease("update_sweep", "manual", now, ttl).await.unwrap());

        // Not the holder: nothing happens.
        manual.release_lease("update_sweep", "manual").await.unwrap();
        assert!(!manual.try_acquire_lease("update_sweep", "manual", now, ttl).await.unwrap());

        daemon.release_lease("update_sweep", "daemon").await.unwrap();
        assert!(manual.try_acquire_lease("update_sweep", "manual", now, ttl).await.unwrap());

        // A holder that never released is overtaken once its lease lapsed.
        let after_expiry = now + ChronoDuration::seconds(61);
        assert!(!daemon.try_acquire_lease("update_sweep", "daemon", now, ttl).await.unwrap());
        assert!(daemon
            .try_acquire_lease("update_sweep", "daemon", after_expiry, ttl)
            .await
            .unwrap());
    }
}
