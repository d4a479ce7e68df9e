//! Delivery channels.

mod discord;

pub use discord::DiscordChannel;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ModUpdate, Webhook};

/// Why a delivery attempt failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The provider throttled us (HTTP 429).
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    /// The message could not be built.
    #[error("template error: {0}")]
    Template(String),
}

impl DeliveryError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Makes exactly one delivery attempt of an update to a webhook.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, webhook: &Webhook, update: &ModUpdate) -> Result<(), DeliveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_classification() {
        let limited = DeliveryError::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };
        assert!(limited.is_rate_limited());
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(2)));

        let rejected = DeliveryError::Rejected {
            status: 400,
            body: "bad".to_string(),
        };
        assert!(!rejected.is_rate_limited());
        assert_eq!(rejected.retry_after(), None);
    }
}
