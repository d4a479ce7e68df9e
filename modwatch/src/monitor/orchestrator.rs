//! Sweep orchestration.
//!
//! A sweep reads every tracked mod, evaluates them in listing order and
//! dispatches notifications for the ones that changed. Only one sweep runs at a
//! time; a request that arrives while one is active is a successful no-op.
//!
//! Within a process the guard is an atomic flag. Processes sharing a database
//! also contend for a lease row, renewed after every mod and released when
//! the sweep ends; a crashed holder's lease lapses after its ttl.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dedup::{DedupKey, SessionDedup};
use super::evaluator::UpdateEvaluator;
use super::events::{CheckEvent, CheckEventBroadcaster};
use crate::Error;
use crate::catalog::Credential;
use crate::database::repositories::{
    DEFAULT_UPDATE_INTERVAL_MINUTES, ModRepository, SettingsRepository, StateStore,
};
use crate::domain::TrackedMod;
use crate::notification::{DispatchReport, NotificationDispatcher};

/// Name of the lease row guarding sweeps.
pub const SWEEP_LEASE: &str = "update_sweep";

/// Default lease lifetime without renewal.
pub const DEFAULT_SWEEP_LEASE_TTL: Duration = Duration::from_secs(600);

/// Aggregated result of a completed sweep.
#[derive(Debug, Clone)]
pub struct SweepSummary {
    /// Monotonic sweep number within this process.
    pub session: u64,
    /// Tracked mods as stored after the sweep.
    pub mods: Vec<TrackedMod>,
    pub updates_found: bool,
    pub completed_at: DateTime<Utc>,
    pub interval_minutes: u32,
    /// Id carried by the `CheckCompleted` event of this sweep.
    pub event_id: String,
    /// Number of evaluations performed.
    pub evaluated: usize,
    /// Mods whose evaluation or webhook lookup failed.
    pub failed_items: Vec<i64>,
    pub dispatches: Vec<DispatchReport>,
}

/// Result of a sweep request.
#[derive(Debug)]
pub enum SweepOutcome {
    Completed(SweepSummary),
    /// Another sweep was active; nothing was done.
    AlreadyRunning,
    /// The sweep aborted before evaluating anything.
    Failed(Error),
}

impl SweepOutcome {
    /// Whether the request succeeded. A skipped request counts as success.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    pub fn updates_found(&self) -> bool {
        matches!(self, Self::Completed(summary) if summary.updates_found)
    }

    pub fn summary(&self) -> Option<&SweepSummary> {
        match self {
            Self::Completed(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Clears the running flag when dropped.
struct RunningGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives update sweeps.
pub struct CheckOrchestrator {
    mods: Arc<dyn ModRepository>,
    settings: Arc<dyn SettingsRepository>,
    evaluator: UpdateEvaluator,
    dispatcher: Arc<NotificationDispatcher>,
    events: CheckEventBroadcaster,
    dedup: SessionDedup,
    running: AtomicBool,
    session: AtomicU64,
    lease: Option<SweepLease>,
}

struct SweepLease {
    store: Arc<dyn StateStore>,
    holder: String,
    ttl: Duration,
}

impl CheckOrchestrator {
    pub fn new(
        mods: Arc<dyn ModRepository>,
        settings: Arc<dyn SettingsRepository>,
        evaluator: UpdateEvaluator,
        dispatcher: Arc<NotificationDispatcher>,
        events: CheckEventBroadcaster,
    ) -> Self {
        Self {
            mods,
            settings,
            evaluator,
            dispatcher,
            events,
            dedup: SessionDedup::new(),
            running: AtomicBool::new(false),
            session: AtomicU64::new(0),
            lease: None,
        }
    }

    /// Also require the shared sweep lease in `store` before sweeping.
    pub fn with_lease(mut self, store: Arc<dyn StateStore>, ttl: Duration) -> Self {
        self.lease = Some(SweepLease {
            store,
            holder: Uuid::new_v4().to_string(),
            ttl,
        });
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn events(&self) -> &CheckEventBroadcaster {
        &self.events
    }

    /// Run a sweep. `interval_hint` is reported in the completion event instead
    /// of the stored interval.
    pub async fn run_sweep(&self, interval_hint: Option<u32>) -> SweepOutcome {
        self.run_sweep_with(interval_hint, |_| {}).await
    }

    /// Like [`run_sweep`](Self::run_sweep), calling `on_success` with the
    /// summary once the sweep completes.
    pub async fn run_sweep_with<F>(&self, interval_hint: Option<u32>, on_success: F) -> SweepOutcome
    where
        F: FnOnce(&SweepSummary) + Send,
    {
        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            debug!("Sweep already running, ignoring request");
            return SweepOutcome::AlreadyRunning;
        };

        match self.acquire_lease().await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Sweep running in another process, ignoring request");
                return SweepOutcome::AlreadyRunning;
            }
            Err(e) => {
                warn!(error = %e, "Failed to take sweep lease, aborting sweep");
                return SweepOutcome::Failed(e);
            }
        }

        let outcome = self.sweep(interval_hint, on_success).await;
        self.release_lease().await;
        outcome
    }

    async fn sweep<F>(&self, interval_hint: Option<u32>, on_success: F) -> SweepOutcome
    where
        F: FnOnce(&SweepSummary) + Send,
    {
        let session = self.session.fetch_add(1, Ordering::Relaxed) + 1;
        self.dedup.begin_session();
        let started_at = Utc::now();

        let credential = match self.settings.get_api_key().await {
            Ok(Some(key)) => Credential::new(key),
            Ok(None) => {
                warn!(session, "No API key configured, aborting sweep");
                return SweepOutcome::Failed(Error::MissingCredential);
            }
            Err(e) => {
                warn!(session, error = %e, "Failed to read API key, aborting sweep");
                return SweepOutcome::Failed(e);
            }
        };

        let snapshot = match self.mods.list_mods().await {
            Ok(mods) => mods,
            Err(e) => {
                warn!(session, error = %e, "Failed to list tracked mods, aborting sweep");
                return SweepOutcome::Failed(e);
            }
        };

        info!(session, mods = snapshot.len(), "Starting update sweep");

        let mut updates_found = false;
        let mut failed_items = Vec::new();
        let mut dispatches = Vec::new();

        for tracked in &snapshot {
            self.renew_lease().await;
            let update = match self.evaluator.evaluate(tracked, &credential).await {
                Ok(Some(update)) => update,
                Ok(None) => continue,
                Err(_) => {
                    failed_items.push(tracked.id);
                    continue;
                }
            };
            updates_found = true;

            let key = DedupKey::new(tracked.id, started_at);
            if !self.dedup.try_claim(key) {
                debug!(session, mod_id = tracked.id, key = %key, "Update already dispatched this sweep");
                continue;
            }

            let destinations = match self.mods.get_assigned_webhooks(tracked.id).await {
                Ok(destinations) => destinations,
                Err(e) => {
                    warn!(session, mod_id = tracked.id, error = %e, "Failed to load webhooks");
                    failed_items.push(tracked.id);
                    continue;
                }
            };

            dispatches.push(self.dispatcher.dispatch(&update, &destinations).await);
        }

        let interval_minutes = match interval_hint {
            Some(minutes) => minutes,
            None => self.settings.get_update_interval().await.unwrap_or_else(|e| {
                warn!(error = %e, "Failed to read update interval, using default");
                DEFAULT_UPDATE_INTERVAL_MINUTES
            }),
        };

        let completed_at = Utc::now();
        let event_id = Uuid::new_v4().to_string();
        self.events.publish(CheckEvent::CheckCompleted {
            timestamp: completed_at,
            interval_minutes,
            event_id: event_id.clone(),
        });

        let mods = match self.mods.list_mods().await {
            Ok(mods) => mods,
            Err(e) => {
                warn!(session, error = %e, "Failed to refresh tracked mods");
                snapshot.clone()
            }
        };

        info!(
            session,
            evaluated = snapshot.len(),
            updates_found,
            failed = failed_items.len(),
            event_id = %event_id,
            "Update sweep completed"
        );

        let summary = SweepSummary {
            session,
            mods,
            updates_found,
            completed_at,
            interval_minutes,
            event_id,
            evaluated: snapshot.len(),
            failed_items,
            dispatches,
        };
        on_success(&summary);
        SweepOutcome::Completed(summary)
    }

    async fn acquire_lease(&self) -> crate::Result<bool> {
        match &self.lease {
            Some(lease) => {
                lease
                    .store
                    .try_acquire_lease(SWEEP_LEASE, &lease.holder, Utc::now(), lease.ttl)
                    .await
            }
            None => Ok(true),
        }
    }

    async fn renew_lease(&self) {
        let Some(lease) = &self.lease else {
            return;
        };
        match lease
            .store
            .renew_lease(SWEEP_LEASE, &lease.holder, Utc::now(), lease.ttl)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!("Sweep lease lapsed while sweeping"),
            Err(e) => warn!(error = %e, "Failed to renew sweep lease"),
        }
    }

    async fn release_lease(&self) {
        let Some(lease) = &self.lease else {
            return;
        };
        if let Err(e) = lease.store.release_lease(SWEEP_LEASE, &lease.holder).await {
            warn!(error = %e, "Failed to release sweep lease, it will expire");
        }
    }
}
