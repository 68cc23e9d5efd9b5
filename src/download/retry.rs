//! Bounded retry as an explicit attempt state machine.
//!
//! Every fetch walks the states
//!
//! ```text
//! Pending -> Attempting(1) -> Attempting(2) -> ... -> Succeeded | Exhausted
//! ```
//!
//! driven by [`RetryPolicy::transition`]. Reaching `Exhausted` only says that
//! the policy gave up; what that means for the run (abort, or record a
//! failure and continue) is decided separately by [`FailurePolicy`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use waybackdl_core::download::{AttemptEvent, AttemptState, RetryPolicy};
//!
//! let policy = RetryPolicy::new(1, Duration::ZERO);
//! let state = policy.transition(AttemptState::Pending, AttemptEvent::Start);
//! let state = policy.transition(state, AttemptEvent::Failed);
//! assert_eq!(state, AttemptState::Attempting(2));
//! let state = policy.transition(state, AttemptEvent::Failed);
//! assert_eq!(state, AttemptState::Exhausted { attempts: 2 });
//! ```

use std::time::Duration;

use tracing::{debug, warn};

use super::engine::DownloadOutcome;
use super::error::EngineError;

/// Default number of additional attempts after the first failed one.
pub const DEFAULT_MAX_RETRIES: u32 = 0;

/// Default courtesy delay before every attempt.
const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Where a single fetch currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Not started.
    Pending,
    /// Attempt `n` (1-indexed) is in flight.
    Attempting(u32),
    /// An attempt returned a body.
    Succeeded {
        /// Attempts made, including the successful one.
        attempts: u32,
    },
    /// The policy allows no further attempts.
    Exhausted {
        /// Attempts made, all of which failed.
        attempts: u32,
    },
}

impl AttemptState {
    /// Attempts started so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Pending => 0,
            Self::Attempting(n) => *n,
            Self::Succeeded { attempts } | Self::Exhausted { attempts } => *attempts,
        }
    }

    /// Whether no further events can change the state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Exhausted { .. })
    }

    /// Whether the policy gave up.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// What happened to the current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptEvent {
    /// The first attempt is about to be issued.
    Start,
    /// The attempt returned a 2xx body.
    Succeeded,
    /// Transport error or non-2xx status.
    Failed,
}

/// Fixed-delay retry configuration.
///
/// Every attempt, including the first, is preceded by `delay`; there is no
/// backoff and no jitter, so a run never hits the archive faster than one
/// request per `delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failed one.
    max_retries: u32,
    /// Wait before every attempt.
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy allowing `max_retries` retries spaced by `delay`.
    #[must_use]
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Additional attempts after the first failed one.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts allowed, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before every attempt.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Advances the attempt state machine.
    ///
    /// Terminal states absorb every event, and events that make no sense in
    /// the current state (a result before `Start`, a second `Start`) leave it
    /// unchanged.
    #[must_use]
    pub fn transition(&self, state: AttemptState, event: AttemptEvent) -> AttemptState {
        match (state, event) {
            (AttemptState::Pending, AttemptEvent::Start) => AttemptState::Attempting(1),
            (AttemptState::Attempting(n), AttemptEvent::Succeeded) => {
                AttemptState::Succeeded { attempts: n }
            }
            (AttemptState::Attempting(n), AttemptEvent::Failed) if n <= self.max_retries => {
                debug!(
                    attempt = n,
                    next_attempt = n.saturating_add(1),
                    max_attempts = self.max_attempts(),
                    "will retry"
                );
                AttemptState::Attempting(n.saturating_add(1))
            }
            (AttemptState::Attempting(n), AttemptEvent::Failed) => {
                debug!(attempts = n, "max attempts reached");
                AttemptState::Exhausted { attempts: n }
            }
            (state, _) => state,
        }
    }
}

/// Decides whether an unrecoverable item ends the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailurePolicy {
    no_fail: bool,
}

impl FailurePolicy {
    /// `no_fail = true` records failures and keeps going.
    #[must_use]
    pub fn new(no_fail: bool) -> Self {
        Self { no_fail }
    }

    /// Whether failures are downgraded to per-item outcomes.
    #[must_use]
    pub fn no_fail(&self) -> bool {
        self.no_fail
    }

    /// Resolves an item-level failure.
    ///
    /// # Errors
    ///
    /// Returns the error unchanged unless `no_fail` is set, in which case it
    /// becomes [`DownloadOutcome::Failed`].
    pub fn resolve(&self, error: EngineError) -> Result<DownloadOutcome, EngineError> {
        if self.no_fail {
            warn!(error = %error, "download failed, continuing (no-fail)");
            Ok(DownloadOutcome::Failed { error })
        } else {
            Err(error)
        }
    }
}
