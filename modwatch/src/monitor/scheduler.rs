//! Interval-driven sweeps.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dedup::EventDedup;
use super::events::CheckEvent;
use super::orchestrator::{CheckOrchestrator, SweepOutcome};
use crate::database::repositories::{DEFAULT_UPDATE_INTERVAL_MINUTES, SettingsRepository, StateStore};

/// State key holding the next scheduled check.
pub const NEXT_CHECK_KEY: &str = "next_check_time";

/// Runs a sweep every configured interval.
///
/// The next check time is persisted so a restart resumes the schedule; a due or
/// missing time triggers a sweep right away. Interval changes and completed
/// manual checks push the next check to `now + interval`. Before sweeping, the
/// stored time is read again so a manual check made by another process
/// postpones the sweep as well.
pub struct UpdateScheduler {
    orchestrator: Arc<CheckOrchestrator>,
    settings: Arc<dyn SettingsRepository>,
    state: Arc<dyn StateStore>,
    seen_events: Arc<EventDedup>,
}

impl UpdateScheduler {
    pub fn new(
        orchestrator: Arc<CheckOrchestrator>,
        settings: Arc<dyn SettingsRepository>,
        state: Arc<dyn StateStore>,
        seen_events: Arc<EventDedup>,
    ) -> Self {
        Self {
            orchestrator,
            settings,
            state,
            seen_events,
        }
    }

    /// Run until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut events = self.orchestrator.events().subscribe();
        let mut next_check = self.initial_deadline().await;
        info!(next_check = %next_check, "Update scheduler started");

        loop {
            let wait = (next_check - Utc::now()).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Update scheduler stopped");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    next_check = self.on_deadline().await;
                }
                event = events.recv() => match event {
                    Ok(CheckEvent::IntervalChanged { interval_minutes }) => {
                        debug!(interval_minutes, "Rescheduling after interval change");
                        next_check = self.schedule_in(interval_minutes).await;
                    }
                    Ok(CheckEvent::CheckCompleted { event_id, interval_minutes, .. }) => {
                        if self.seen_events.first_seen(&event_id) {
                            debug!(event_id = %event_id, "Rescheduling after completed check");
                            next_check = self.schedule_in(interval_minutes).await;
                        } else {
                            debug!(event_id = %event_id, "Ignoring duplicate completion event");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Scheduler lagged behind check events");
                    }
                    Err(RecvError::Closed) => {
                        warn!("Check event channel closed, stopping scheduler");
                        break;
                    }
                },
            }
        }
    }

    async fn initial_deadline(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.state.get_timestamp(NEXT_CHECK_KEY).await {
            Ok(Some(at)) if at > now => at,
            Ok(_) => now,
            Err(e) => {
                warn!(error = %e, "Failed to read next check time, checking now");
                now
            }
        }
    }

    /// Sweep, unless the stored next check was pushed into the future.
    async fn on_deadline(&self) -> DateTime<Utc> {
        match self.state.get_timestamp(NEXT_CHECK_KEY).await {
            Ok(Some(at)) if at > Utc::now() => {
                debug!(next_check = %at, "Next check was postponed, waiting");
                at
            }
            Ok(_) => self.run_scheduled().await,
            Err(e) => {
                warn!(error = %e, "Failed to read next check time, checking now");
                self.run_scheduled().await
            }
        }
    }

    async fn run_scheduled(&self) -> DateTime<Utc> {
        let interval = self.interval().await;
        let seen_events = self.seen_events.clone();

        let outcome = self
            .orchestrator
            .run_sweep_with(Some(interval), move |summary| {
                seen_events.mark_seen(&summary.event_id);
            })
            .await;

        match outcome {
            SweepOutcome::Completed(summary) => {
                debug!(session = summary.session, "Scheduled sweep finished");
            }
            SweepOutcome::AlreadyRunning => debug!("Scheduled sweep skipped, one is running"),
            SweepOutcome::Failed(e) => warn!(error = %e, "Scheduled sweep failed"),
        }

        self.schedule_in(interval).await
    }

    async fn interval(&self) -> u32 {
        self.settings.get_update_interval().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read update interval, using default");
            DEFAULT_UPDATE_INTERVAL_MINUTES
        })
    }

    async fn schedule_in(&self, minutes: u32) -> DateTime<Utc> {
        persist_next_check(self.state.as_ref(), Utc::now(), minutes).await
    }
}

/// Persist and return `from + minutes` as the next scheduled check.
pub(crate) async fn persist_next_check(
    state: &dyn StateStore,
    from: DateTime<Utc>,
    minutes: u32,
) -> DateTime<Utc> {
    let next = from + Duration::from_secs(u64::from(minutes.max(1)) * 60);
    if let Err(e) = state.set_timestamp(NEXT_CHECK_KEY, next).await {
        warn!(error = %e, "Failed to persist next check time");
    }
    info!(next_check = %next, "Next update check scheduled");
    next
}
