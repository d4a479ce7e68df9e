//! Delivery pacing.
//!
//! Webhook deliveries are spaced by a fixed delay, with a longer backoff before
//! the single retry that follows a rate-limit rejection.

use std::time::Duration;

use async_trait::async_trait;

use crate::{Error, Result};

/// Suspends the caller for at least the given duration.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn wait(&self, duration: Duration);
}

/// [`Pacer`] on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn wait(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Delays applied by the notification dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    /// Wait before every delivery attempt.
    pub delivery_delay: Duration,
    /// Wait before retrying a rate-limited delivery.
    pub rate_limit_backoff: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            delivery_delay: Duration::from_millis(1500),
            rate_limit_backoff: Duration::from_millis(5000),
        }
    }
}

impl PacingPolicy {
    pub fn new(delivery_delay: Duration, rate_limit_backoff: Duration) -> Result<Self> {
        let policy = Self {
            delivery_delay,
            rate_limit_backoff,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// The backoff must be strictly longer than the standard delay.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit_backoff <= self.delivery_delay {
            return Err(Error::config(format!(
                "rate limit backoff ({:?}) must be longer than the delivery delay ({:?})",
                self.rate_limit_backoff, self.delivery_delay
            )));
        }
        Ok(())
    }

    /// Backoff before the retry, honoring a longer server-provided hint.
    pub fn backoff_for(&self, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.max(self.rate_limit_backoff),
            None => self.rate_limit_backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        let policy = PacingPolicy::default();
        assert!(policy.validate().is_ok());
        assert!(policy.rate_limit_backoff > policy.delivery_delay);
    }

    #[test]
    fn test_rejects_short_backoff() {
        let result = PacingPolicy::new(Duration::from_secs(2), Duration::from_secs(1));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_backoff_for() {
        let policy = PacingPolicy::default();
        assert_eq!(policy.backoff_for(None), Duration::from_secs(5));
        assert_eq!(
            policy.backoff_for(Some(Duration::from_millis(200))),
            Duration::from_secs(5)
        );
        assert_eq!(
            policy.backoff_for(Some(Duration::from_secs(12))),
            Duration::from_secs(12)
        );
    }

    #[tokio::test]
    async fn test_tokio_pacer_zero_returns() {
        TokioPacer.wait(Duration::ZERO).await;
    }
}
