//! Sequential webhook fan-out.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use super::channels::{DeliveryChannel, DeliveryError};
use crate::database::repositories::{ActivityRepository, NewActivity, kind};
use crate::domain::{ModUpdate, Webhook};
use crate::monitor::{Pacer, PacingPolicy};

/// Result of delivering to one webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Failed { attempts: u32, error: DeliveryError },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Delivered { attempts } | Self::Failed { attempts, .. } => *attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationOutcome {
    pub webhook_id: i64,
    pub webhook_name: String,
    pub outcome: DeliveryOutcome,
}

/// What happened during one dispatch call, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub mod_id: i64,
    pub outcomes: Vec<DestinationOutcome>,
    /// Webhooks skipped because they are disabled.
    pub skipped_disabled: Vec<i64>,
    /// Webhooks listed more than once; only the first listing is used.
    pub skipped_duplicates: Vec<i64>,
}

impl DispatchReport {
    pub fn delivered_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome.is_delivered())
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.delivered_count()
    }

    pub fn total_attempts(&self) -> u32 {
        self.outcomes.iter().map(|o| o.outcome.attempts()).sum()
    }
}

/// Delivers an update to its webhooks one at a time.
///
/// Every attempt is preceded by the standard delivery delay. A rate-limited
/// attempt is retried exactly once after the backoff; any other failure, or a
/// failed retry, abandons that webhook for this call. Per-webhook failures
/// never stop the remaining deliveries.
pub struct NotificationDispatcher {
    channel: Arc<dyn DeliveryChannel>,
    pacer: Arc<dyn Pacer>,
    policy: PacingPolicy,
    activities: Option<Arc<dyn ActivityRepository>>,
}

impl NotificationDispatcher {
    pub fn new(channel: Arc<dyn DeliveryChannel>, pacer: Arc<dyn Pacer>, policy: PacingPolicy) -> Self {
        Self {
            channel,
            pacer,
            policy,
            activities: None,
        }
    }

    /// Record `notification_sent` / `webhook_error` activities.
    pub fn with_activity_log(mut self, activities: Arc<dyn ActivityRepository>) -> Self {
        self.activities = Some(activities);
        self
    }

    pub fn policy(&self) -> PacingPolicy {
        self.policy
    }

    pub async fn dispatch(&self, update: &ModUpdate, destinations: &[Webhook]) -> DispatchReport {
        let mut report = DispatchReport {
            mod_id: update.mod_id,
            ..DispatchReport::default()
        };
        let mut seen = HashSet::new();

        for webhook in destinations {
            if !webhook.enabled {
                debug!(webhook_id = webhook.id, "Skipping disabled webhook");
                report.skipped_disabled.push(webhook.id);
                continue;
            }
            if !seen.insert(webhook.id) {
                debug!(webhook_id = webhook.id, "Skipping duplicate webhook");
                report.skipped_duplicates.push(webhook.id);
                continue;
            }

            let outcome = self.deliver_with_retry(webhook, update).await;
            self.record_activity(webhook, update, &outcome).await;

            report.outcomes.push(DestinationOutcome {
                webhook_id: webhook.id,
                webhook_name: webhook.name.clone(),
                outcome,
            });
        }

        info!(
            mod_id = update.mod_id,
            delivered = report.delivered_count(),
            failed = report.failed_count(),
            "Dispatched update for {}",
            update.name
        );
        report
    }

    async fn deliver_with_retry(&self, webhook: &Webhook, update: &ModUpdate) -> DeliveryOutcome {
        self.pacer.wait(self.policy.delivery_delay).await;

        let error = match self.channel.deliver(webhook, update).await {
            Ok(()) => return DeliveryOutcome::Delivered { attempts: 1 },
            Err(e) => e,
        };

        if !error.is_rate_limited() {
            warn!(webhook_id = webhook.id, attempt = 1, error = %error, "Delivery failed");
            return DeliveryOutcome::Failed { attempts: 1, error };
        }

        let backoff = self.policy.backoff_for(error.retry_after());
        warn!(
            webhook_id = webhook.id,
            attempt = 1,
            ?backoff,
            "Delivery rate limited, retrying once"
        );
        self.pacer.wait(backoff).await;

        match self.channel.deliver(webhook, update).await {
            Ok(()) => DeliveryOutcome::Delivered { attempts: 2 },
            Err(error) => {
                warn!(webhook_id = webhook.id, attempt = 2, error = %error, "Retry failed, giving up");
                DeliveryOutcome::Failed { attempts: 2, error }
            }
        }
    }

    async fn record_activity(&self, webhook: &Webhook, update: &ModUpdate, outcome: &DeliveryOutcome) {
        let Some(activities) = &self.activities else {
            return;
        };

        let activity = match outcome {
            DeliveryOutcome::Delivered { attempts } => NewActivity::new(
                kind::NOTIFICATION_SENT,
                format!(
                    "Sent update notification for \"{}\" to webhook \"{}\"",
                    update.name, webhook.name
                ),
            )
            .with_metadata(json!({
                "webhook_id": webhook.id,
                "webhook_name": webhook.name,
                "attempts": attempts,
            })),
            DeliveryOutcome::Failed { attempts, error } => NewActivity::new(
                kind::WEBHOOK_ERROR,
                format!(
                    "Failed to send update notification for \"{}\" to webhook \"{}\"",
                    update.name, webhook.name
                ),
            )
            .with_metadata(json!({
                "webhook_id": webhook.id,
                "webhook_name": webhook.name,
                "attempts": attempts,
                "error": error.to_string(),
            })),
        }
        .with_mod(update.mod_id, update.name.clone());

        if let Err(e) = activities.add_activity(activity).await {
            warn!(webhook_id = webhook.id, error = %e, "Failed to record delivery activity");
        }
    }
}
