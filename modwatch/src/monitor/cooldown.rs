//! Manual check cooldown.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::Result;
use crate::database::repositories::StateStore;

/// State key holding the cooldown deadline.
pub const COOLDOWN_KEY: &str = "update_check_cooldown";

/// Persisted deadline before which manual checks are refused.
///
/// The deadline is only ever set by [`start`](Self::start); a refused check
/// leaves it untouched, so the remaining time can only shrink.
#[derive(Clone)]
pub struct CooldownGate {
    store: Arc<dyn StateStore>,
    window: Duration,
}

impl CooldownGate {
    pub fn new(store: Arc<dyn StateStore>, window: Duration) -> Self {
        Self { store, window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Time left at `now`, or `None` when checks are allowed.
    ///
    /// An elapsed deadline is cleared from the store.
    pub async fn remaining(&self, now: DateTime<Utc>) -> Result<Option<Duration>> {
        let Some(deadline) = self.store.get_timestamp(COOLDOWN_KEY).await? else {
            return Ok(None);
        };

        match (deadline - now).to_std() {
            Ok(left) if !left.is_zero() => Ok(Some(left)),
            _ => {
                self.store.clear(COOLDOWN_KEY).await?;
                Ok(None)
            }
        }
    }

    /// Begin a cooldown window at `now`. Returns the deadline.
    pub async fn start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let deadline = now + self.window;
        self.store.set_timestamp(COOLDOWN_KEY, deadline).await?;
        Ok(deadline)
    }
}
