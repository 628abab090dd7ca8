use std::time::Duration;

use sidecar_config::{BackoffStrategy, ResilienceConfig};

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Retry { delay: Duration },
    GiveUp,
}

/// Pure restart decision logic.
///
/// `restart_count` passed to [`RestartPolicy::decide`] already includes the
/// failure being decided on. One initial attempt plus `max_restarts` retries
/// are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    max_restarts: u32,
    delay: Duration,
    backoff: BackoffStrategy,
    max_delay: Duration,
}

impl RestartPolicy {
    /// Fixed delay between restarts.
    pub fn new(max_restarts: u32, delay: Duration) -> Self {
        Self {
            max_restarts,
            delay,
            backoff: BackoffStrategy::Fixed,
            max_delay: delay,
        }
    }

    /// Double the delay for each consecutive restart, capped at `max_delay`.
    pub fn with_exponential_backoff(mut self, max_delay: Duration) -> Self {
        self.backoff = BackoffStrategy::Exponential;
        self.max_delay = max_delay;
        self
    }

    pub fn from_config(config: &ResilienceConfig) -> Self {
        let policy = Self::new(config.max_restarts, config.restart_delay());
        match config.backoff {
            BackoffStrategy::Fixed => policy,
            BackoffStrategy::Exponential => policy.with_exponential_backoff(config.max_backoff()),
        }
    }

    pub fn max_restarts(&self) -> u32 {
        self.max_restarts
    }

    pub fn decide(&self, restart_count: u32) -> RestartDecision {
        if restart_count <= self.max_restarts {
            RestartDecision::Retry {
                delay: self.delay_for(restart_count),
            }
        } else {
            RestartDecision::GiveUp
        }
    }

    pub fn delay_for(&self, restart_count: u32) -> Duration {
        match self.backoff {
            BackoffStrategy::Fixed => self.delay,
            BackoffStrategy::Exponential => {
                let exponent = restart_count.saturating_sub(1).min(31);
                self.delay
                    .saturating_mul(1u32 << exponent)
                    .min(self.max_delay)
            }
        }
    }
}
