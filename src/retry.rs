use std::time::Duration;

use crate::ErrorKind;

/// Delay strategy between attempts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Backoff {
    /// Same delay after every failure.
    Fixed(Duration),
    /// `base * attempt`, where `attempt` is the 1-based number of the failed attempt.
    Linear { base: Duration },
    /// `base * 2^(attempt - 1)`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Linear {
            base: Duration::from_millis(1_000),
        }
    }
}

impl Backoff {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear { base } => base.saturating_mul(attempt),
            Backoff::Exponential { base, max } => {
                let exp = (attempt - 1).min(16);
                base.saturating_mul(1u32 << exp).min(max)
            }
        }
    }
}

/// Observable states of one logical operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttemptState {
    Idle,
    Attempting,
    Retrying,
    FallbackAttempting,
    Success,
    Failed,
}

impl AttemptState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AttemptState::Success | AttemptState::Failed)
    }
}

/// What the fetch loop does after a failed attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
    /// Wait, then try the same base URL again.
    Retry { delay: Duration },
    /// Switch to the fallback base URL and try immediately.
    Fallback,
    /// Surface the classified error.
    GiveUp,
}

impl Decision {
    /// State the operation enters when this decision is taken.
    pub fn next_state(self) -> AttemptState {
        match self {
            Decision::Retry { .. } => AttemptState::Retrying,
            Decision::Fallback => AttemptState::FallbackAttempting,
            Decision::GiveUp => AttemptState::Failed,
        }
    }
}

/// Facts about the attempt that just failed.
#[derive(Clone, Copy, Debug)]
pub struct AttemptOutcome {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    /// 1-based number of the failed attempt.
    pub attempt: u32,
    pub fallback_used: bool,
    pub has_fallback: bool,
}

/// Retry rules for one logical operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// HTTP statuses worth another attempt.
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
            retry_statuses: vec![500],
        }
    }
}

impl RetryPolicy {
    pub fn decide(&self, outcome: &AttemptOutcome) -> Decision {
        let attempts_left = outcome.attempt < self.max_attempts;

        match outcome.kind {
            ErrorKind::Blocked => {
                if outcome.attempt == 1 && outcome.has_fallback && !outcome.fallback_used {
                    Decision::Fallback
                } else {
                    Decision::GiveUp
                }
            }
            ErrorKind::Unauthorized | ErrorKind::NotFound | ErrorKind::Unknown => {
                Decision::GiveUp
            }
            ErrorKind::ServerError => {
                let retryable = outcome
                    .status
                    .map_or(true, |status| self.retry_statuses.contains(&status));
                if retryable && attempts_left {
                    self.retry_after(outcome.attempt)
                } else {
                    Decision::GiveUp
                }
            }
            ErrorKind::Timeout | ErrorKind::Network => {
                if attempts_left {
                    self.retry_after(outcome.attempt)
                } else {
                    Decision::GiveUp
                }
            }
        }
    }

    fn retry_after(&self, attempt: u32) -> Decision {
        Decision::Retry {
            delay: self.backoff.delay(attempt),
        }
    }
}
