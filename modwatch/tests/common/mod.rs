//! In-memory collaborators for pipeline tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

use modwatch::catalog::{CatalogError, Credential, UpdateSource};
use modwatch::database::repositories::{
    MemoryStateStore, ModRepository, SettingsRepository, StateStore,
};
use modwatch::domain::{ModUpdate, TrackedMod, Webhook};
use modwatch::monitor::{
    CheckEventBroadcaster, CheckOrchestrator, Pacer, PacingPolicy, UpdateEvaluator,
};
use modwatch::notification::{DeliveryChannel, DeliveryError, NotificationDispatcher};
use modwatch::{Error, Result};

pub const OLD_DATE: &str = "2026-10-01T08:00:00Z";
pub const NEW_DATE: &str = "2026-10-19T14:05:00Z";

/// Mod store; the listing order is insertion order.
#[derive(Default)]
pub struct FakeMods {
    mods: Mutex<Vec<TrackedMod>>,
    webhooks: Mutex<HashMap<i64, Vec<Webhook>>>,
}

impl FakeMods {
    pub fn add(&self, id: i64, name: &str) {
        self.mods
            .lock()
            .push(TrackedMod::new(id, id * 100, name, OLD_DATE));
    }

    pub fn assign(&self, mod_id: i64, webhook: Webhook) {
        self.webhooks.lock().entry(mod_id).or_default().push(webhook);
    }

    pub fn last_updated(&self, mod_id: i64) -> Option<String> {
        self.mods
            .lock()
            .iter()
            .find(|m| m.id == mod_id)
            .map(|m| m.last_updated.clone())
    }
}

#[async_trait]
impl ModRepository for FakeMods {
    async fn list_mods(&self) -> Result<Vec<TrackedMod>> {
        Ok(self.mods.lock().clone())
    }

    async fn get_assigned_webhooks(&self, mod_id: i64) -> Result<Vec<Webhook>> {
        Ok(self.webhooks.lock().get(&mod_id).cloned().unwrap_or_default())
    }

    async fn update_last_updated(&self, mod_id: i64, last_updated: &str) -> Result<()> {
        let mut mods = self.mods.lock();
        let mut found = false;
        for tracked in mods.iter_mut().filter(|m| m.id == mod_id) {
            tracked.last_updated = last_updated.to_string();
            found = true;
        }
        if found {
            Ok(())
        } else {
            Err(Error::not_found("Mod", mod_id.to_string()))
        }
    }
}

pub struct FakeSettings {
    api_key: Mutex<Option<String>>,
    interval: Mutex<u32>,
}

impl FakeSettings {
    pub fn with_key(key: Option<&str>) -> Self {
        Self {
            api_key: Mutex::new(key.map(str::to_string)),
            interval: Mutex::new(30),
        }
    }
}

#[async_trait]
impl SettingsRepository for FakeSettings {
    async fn get_api_key(&self) -> Result<Option<String>> {
        Ok(self.api_key.lock().clone())
    }

    async fn set_api_key(&self, key: &str) -> Result<()> {
        *self.api_key.lock() = Some(key.to_string());
        Ok(())
    }

    async fn get_update_interval(&self) -> Result<u32> {
        Ok(*self.interval.lock())
    }

    async fn set_update_interval(&self, minutes: u32) -> Result<()> {
        *self.interval.lock() = minutes;
        Ok(())
    }
}

/// Pauses the first evaluation until released.
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// Catalog that reports `NEW_DATE` for mods listed in `pending` and persists
/// it like the real source does.
pub struct FakeSource {
    mods: Arc<FakeMods>,
    pending: Mutex<Vec<i64>>,
    failing: Mutex<Vec<i64>>,
    gate: Mutex<Option<Arc<Gate>>>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(mods: Arc<FakeMods>) -> Self {
        Self {
            mods,
            pending: Mutex::new(Vec::new()),
            failing: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn release_update(&self, mod_id: i64) {
        self.pending.lock().push(mod_id);
    }

    pub fn fail_for(&self, mod_id: i64) {
        self.failing.lock().push(mod_id);
    }

    pub fn install_gate(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate {
            entered: Notify::new(),
            release: Notify::new(),
        });
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpdateSource for FakeSource {
    async fn check_mod_update(
        &self,
        tracked: &TrackedMod,
        _credential: &Credential,
    ) -> Result<Option<ModUpdate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if self.failing.lock().contains(&tracked.id) {
            return Err(CatalogError::Transport("connection reset".to_string()).into());
        }
        if !self.pending.lock().contains(&tracked.id) || tracked.last_updated == NEW_DATE {
            return Ok(None);
        }

        self.mods.update_last_updated(tracked.id, NEW_DATE).await?;
        Ok(Some(ModUpdate {
            mod_id: tracked.id,
            curseforge_id: tracked.curseforge_id,
            name: tracked.name.clone(),
            author: "tester".to_string(),
            old_update_time: tracked.last_updated.clone(),
            new_update_time: NEW_DATE.to_string(),
            latest_file_name: format!("{}.jar", tracked.name),
            logo_url: None,
            page_url: None,
            changelog: None,
        }))
    }
}

/// Records every delivery attempt; scripted failures are consumed in order.
#[derive(Default)]
pub struct RecordingChannel {
    attempts: Mutex<Vec<(i64, i64)>>,
    scripts: Mutex<HashMap<i64, VecDeque<DeliveryError>>>,
}

impl RecordingChannel {
    pub fn fail_next(&self, webhook_id: i64, error: DeliveryError) {
        self.scripts.lock().entry(webhook_id).or_default().push_back(error);
    }

    /// `(mod_id, webhook_id)` per attempt.
    pub fn attempts(&self) -> Vec<(i64, i64)> {
        self.attempts.lock().clone()
    }

    pub fn webhook_attempts(&self) -> Vec<i64> {
        self.attempts.lock().iter().map(|(_, w)| *w).collect()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn deliver(&self, webhook: &Webhook, update: &ModUpdate) -> std::result::Result<(), DeliveryError> {
        self.attempts.lock().push((update.mod_id, webhook.id));
        match self.scripts.lock().get_mut(&webhook.id).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct RecordingPacer {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().clone()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn wait(&self, duration: Duration) {
        self.waits.lock().push(duration);
    }
}

/// State store that remembers every timestamp written through it.
#[derive(Default)]
pub struct RecordingState {
    inner: MemoryStateStore,
    writes: Mutex<Vec<(String, DateTime<Utc>)>>,
}

impl RecordingState {
    pub fn writes(&self, key: &str) -> Vec<DateTime<Utc>> {
        self.writes
            .lock()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl StateStore for RecordingState {
    async fn get_timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        self.inner.get_timestamp(key).await
    }

    async fn set_timestamp(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        self.writes.lock().push((key.to_string(), at));
        self.inner.set_timestamp(key, at).await
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.inner.clear(key).await
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool> {
        self.inner.try_acquire_lease(name, holder, now, ttl).await
    }

    async fn renew_lease(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool> {
        self.inner.renew_lease(name, holder, now, ttl).await
    }

    async fn release_lease(&self, name: &str, holder: &str) -> Result<()> {
        self.inner.release_lease(name, holder).await
    }
}

pub const LEASE_TTL: Duration = Duration::from_secs(60);

pub struct Harness {
    pub mods: Arc<FakeMods>,
    pub settings: Arc<FakeSettings>,
    pub source: Arc<FakeSource>,
    pub channel: Arc<RecordingChannel>,
    pub pacer: Arc<RecordingPacer>,
    pub events: CheckEventBroadcaster,
    pub orchestrator: Arc<CheckOrchestrator>,
    lease: Option<Arc<dyn StateStore>>,
}

impl Harness {
    pub fn new(api_key: Option<&str>) -> Self {
        Self::build(api_key, None)
    }

    /// Orchestrators of this harness also contend for the lease in `store`.
    pub fn with_lease(api_key: Option<&str>, store: Arc<dyn StateStore>) -> Self {
        Self::build(api_key, Some(store))
    }

    fn build(api_key: Option<&str>, lease: Option<Arc<dyn StateStore>>) -> Self {
        let mods = Arc::new(FakeMods::default());
        let settings = Arc::new(FakeSettings::with_key(api_key));
        let source = Arc::new(FakeSource::new(mods.clone()));
        let channel = Arc::new(RecordingChannel::default());
        let pacer = Arc::new(RecordingPacer::default());
        let events = CheckEventBroadcaster::new();

        let parts = Parts {
            mods: &mods,
            settings: &settings,
            source: &source,
            channel: &channel,
            pacer: &pacer,
            lease: lease.as_ref(),
        };
        let orchestrator = parts.orchestrator(events.clone());

        Self {
            mods,
            settings,
            source,
            channel,
            pacer,
            events,
            orchestrator,
            lease,
        }
    }

    /// A second orchestrator over the same mods, catalog and webhooks, with its
    /// own event channel. Stands in for another process on the same database.
    pub fn peer(&self) -> Arc<CheckOrchestrator> {
        self.parts().orchestrator(CheckEventBroadcaster::new())
    }

    fn parts(&self) -> Parts<'_> {
        Parts {
            mods: &self.mods,
            settings: &self.settings,
            source: &self.source,
            channel: &self.channel,
            pacer: &self.pacer,
            lease: self.lease.as_ref(),
        }
    }
}

struct Parts<'a> {
    mods: &'a Arc<FakeMods>,
    settings: &'a Arc<FakeSettings>,
    source: &'a Arc<FakeSource>,
    channel: &'a Arc<RecordingChannel>,
    pacer: &'a Arc<RecordingPacer>,
    lease: Option<&'a Arc<dyn StateStore>>,
}

impl Parts<'_> {
    fn orchestrator(&self, events: CheckEventBroadcaster) -> Arc<CheckOrchestrator> {
        let dispatcher = NotificationDispatcher::new(
            self.channel.clone(),
            self.pacer.clone(),
            PacingPolicy::default(),
        );
        let orchestrator = CheckOrchestrator::new(
            self.mods.clone(),
            self.settings.clone(),
            UpdateEvaluator::new(self.source.clone()),
            Arc::new(dispatcher),
            events,
        );
        Arc::new(match self.lease {
            Some(store) => orchestrator.with_lease(store.clone(), LEASE_TTL),
            None => orchestrator,
        })
    }
}

pub fn webhook(id: i64) -> Webhook {
    Webhook::new(id, format!("hook-{}", id), format!("https://discord.test/api/webhooks/{}", id))
}
