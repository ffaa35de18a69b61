//! Confirmation polling
//!
//! Polls a [`TransactionLookup`] until the transaction carries a non-empty
//! `blockHash`. The poll is bounded by a timeout, backs off between
//! attempts, and stops as soon as its cancellation token fires.

use crate::remote::TransactionLookup;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use wallet_bridge_core::PollSettings;

/// Poll timing
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Sleep after the first unconfirmed attempt
    pub interval: Duration,
    /// Growth of the sleep between attempts
    pub backoff_factor: f64,
    /// Upper bound of the sleep
    pub max_interval: Duration,
    /// Give up after this long
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from(&PollSettings::default())
    }
}

impl From<&PollSettings> for PollConfig {
    fn from(settings: &PollSettings) -> Self {
        Self {
            interval: settings.interval(),
            backoff_factor: settings.backoff_factor,
            max_interval: settings.max_interval(),
            timeout: settings.timeout(),
        }
    }
}

impl PollConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff_factor = factor;
        self.max_interval = max_interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sleep following `current`
    fn next_interval(&self, current: Duration) -> Duration {
        let cap = self.max_interval.max(self.interval);
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_factor.max(1.0))
            .map_or(cap, |next| next.min(cap))
    }
}

/// How a poll ended
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// First response with a block hash
    Confirmed(Value),
    TimedOut { attempts: u32 },
    Cancelled,
}

/// Whether a lookup response is mined
pub fn is_confirmed(response: &Value) -> bool {
    match response.get("blockHash") {
        Some(Value::String(hash)) => !hash.is_empty(),
        _ => false,
    }
}

/// Poll `lookup` for `hash` until confirmed, timed out or cancelled
pub async fn poll_confirmation(
    lookup: &dyn TransactionLookup,
    hash: &str,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> PollOutcome {
    let deadline = Instant::now() + config.timeout;
    let mut delay = config.interval;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            response = lookup.transaction_by_hash(hash) => response,
        };

        match response {
            Ok(value) if is_confirmed(&value) => {
                tracing::info!(hash, attempts, "Transaction confirmed");
                return PollOutcome::Confirmed(value);
            }
            Ok(_) => tracing::debug!(hash, attempts, "Transaction not yet mined"),
            Err(e) => tracing::warn!(hash, attempts, error = %e, "Transaction lookup failed, retrying"),
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(hash, attempts, "Confirmation poll timed out");
            return PollOutcome::TimedOut { attempts };
        }

        let sleep = delay.min(deadline - now);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = tokio::time::sleep(sleep) => {}
        }
        delay = config.next_interval(delay);
    }
}
