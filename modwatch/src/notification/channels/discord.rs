//! Discord webhook channel.
//!
//! Reports 429 responses as [`DeliveryError::RateLimited`] with the server's
//! retry hint; retrying is left to the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::{DeliveryChannel, DeliveryError};
use crate::database::repositories::WebhookRepository;
use crate::domain::{ModUpdate, Webhook, WebhookTemplate};
use crate::notification::template;

/// Discord notification channel.
pub struct DiscordChannel {
    client: Client,
    templates: Arc<dyn WebhookRepository>,
}

impl DiscordChannel {
    pub fn new(client: Client, templates: Arc<dyn WebhookRepository>) -> Self {
        Self { client, templates }
    }

    async fn template_for(&self, webhook: &Webhook) -> Result<WebhookTemplate, DeliveryError> {
        let key = webhook.use_custom_template.then_some(webhook.id);
        self.templates
            .get_template(key)
            .await
            .map_err(|e| DeliveryError::Template(e.to_string()))
    }

    /// Post the fixed test message to `webhook`.
    pub async fn send_test(&self, webhook: &Webhook) -> Result<(), DeliveryError> {
        let payload = template::test_payload(webhook, Utc::now());
        self.post(webhook, &payload).await
    }

    async fn post(&self, webhook: &Webhook, payload: &serde_json::Value) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&webhook.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(webhook_id = webhook.id, "Discord webhook accepted");
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response.headers());
            debug!(webhook_id = webhook.id, ?retry_after, "Discord rate limited (429)");
            return Err(DeliveryError::RateLimited { retry_after });
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        warn!(webhook_id = webhook.id, %status, "Discord webhook failed: {}", body);
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Parse the retry hint from a 429 response.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    ["Retry-After", "X-RateLimit-Reset-After"]
        .iter()
        .find_map(|name| {
            let secs = headers.get(*name)?.to_str().ok()?.trim().parse::<f64>().ok()?;
            (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
        })
}

#[async_trait]
impl DeliveryChannel for DiscordChannel {
    async fn deliver(&self, webhook: &Webhook, update: &ModUpdate) -> Result<(), DeliveryError> {
        let template = self.template_for(webhook).await?;
        let payload = template::build_payload(&template, webhook, update, Utc::now());
        self.post(webhook, &payload).await
    }
}
