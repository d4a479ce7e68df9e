//! Caller-facing check operations.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use super::cooldown::CooldownGate;
use super::events::{CheckEvent, CheckEventBroadcaster};
use super::orchestrator::{CheckOrchestrator, SweepOutcome};
use super::scheduler::persist_next_check;
use crate::database::repositories::{SettingsRepository, StateStore};
use crate::{Error, Result};

/// Manual checks and interval settings.
///
/// Manual checks are rate limited by a [`CooldownGate`]; scheduled sweeps go
/// straight to the orchestrator and are not. A completed manual check moves
/// the persisted next scheduled check to one interval after it.
pub struct UpdateService {
    orchestrator: Arc<CheckOrchestrator>,
    settings: Arc<dyn SettingsRepository>,
    state: Arc<dyn StateStore>,
    cooldown: CooldownGate,
    events: CheckEventBroadcaster,
}

impl UpdateService {
    pub fn new(
        orchestrator: Arc<CheckOrchestrator>,
        settings: Arc<dyn SettingsRepository>,
        state: Arc<dyn StateStore>,
        cooldown: CooldownGate,
    ) -> Self {
        let events = orchestrator.events().clone();
        Self {
            orchestrator,
            settings,
            state,
            cooldown,
            events,
        }
    }

    /// Run a manual check.
    ///
    /// Fails with [`Error::CoolingDown`] while a previous manual check's window
    /// is still open. A completed sweep opens a new window.
    pub async fn check_now(&self) -> Result<SweepOutcome> {
        if let Some(remaining) = self.cooldown.remaining(Utc::now()).await? {
            return Err(Error::CoolingDown { remaining });
        }

        let outcome = self.orchestrator.run_sweep(None).await;
        if let SweepOutcome::Completed(summary) = &outcome {
            let deadline = self.cooldown.start(summary.completed_at).await?;
            info!(until = %deadline, "Manual check cooldown started");
            persist_next_check(
                self.state.as_ref(),
                summary.completed_at,
                summary.interval_minutes,
            )
            .await;
        }
        Ok(outcome)
    }

    pub async fn cooldown_remaining(&self) -> Result<Option<Duration>> {
        self.cooldown.remaining(Utc::now()).await
    }

    pub async fn update_interval(&self) -> Result<u32> {
        self.settings.get_update_interval().await
    }

    /// Store a new interval and tell the scheduler.
    pub async fn set_update_interval(&self, minutes: u32) -> Result<()> {
        if minutes == 0 {
            return Err(Error::validation("Update interval must be at least one minute"));
        }
        self.settings.set_update_interval(minutes).await?;
        self.events.publish(CheckEvent::IntervalChanged {
            interval_minutes: minutes,
        });
        info!(interval_minutes = minutes, "Update interval changed");
        Ok(())
    }
}
