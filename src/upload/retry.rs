use crate::error::Error;
use std::time::Duration;

/// Bounded exponential backoff for a single chunk.
///
/// Retries network failures, timeouts, 408, 429 and 5xx responses. Other
/// client errors won't resolve with retries and are returned immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// No retries: the first failure of a chunk is terminal.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub const fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::none()
        }
    }

    /// Delay before retry number `attempt` (1-based): 1s, 2s, 4s, ... capped.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempt` failures of `error`.
    #[must_use]
    pub fn should_retry(&self, error: &Error, attempt: u32) -> bool {
        attempt <= self.max_retries && is_transient(error)
    }
}

fn is_transient(error: &Error) -> bool {
    match error {
        Error::ChunkTransport {
            http_status: None, ..
        } => true,
        Error::ChunkTransport {
            http_status: Some(status),
            ..
        } => matches!(status, 408 | 429 | 500..=599),
        _ => false,
    }
}
