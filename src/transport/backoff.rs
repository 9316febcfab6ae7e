//! Reconnect policy and backoff state.
//!
//! Every tunable of the reconnect loop lives in [`ReconnectPolicy`] so tests
//! can inject deterministic delays and attempt caps.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use signalbus::ReconnectPolicy;
//!
//! let policy = ReconnectPolicy::new()
//!     .with_base_delay(Duration::from_millis(10))
//!     .with_max_attempts(5)
//!     .with_jitter(0.0);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use rand::Rng;

// ============================================================================
// Constants
// ============================================================================

/// Delay restored after every successful open.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Factor applied to the delay on every unexpected close.
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Consecutive closes tolerated before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Share of the delay that is randomized.
pub const DEFAULT_JITTER: f64 = 0.3;

/// Interval of the open watchdog.
pub const DEFAULT_OPEN_CHECK_INTERVAL: Duration = Duration::from_secs(2);

/// Interval between flush attempts while frames wait for an open socket.
pub const DEFAULT_SEND_RETRY_DELAY: Duration = Duration::from_millis(5);

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Reconnect and retry timing.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    multiplier: f64,
    max_attempts: u32,
    jitter: f64,
    open_check_interval: Duration,
    send_retry_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconnectPolicy {
    /// Creates a policy with the default timings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            jitter: DEFAULT_JITTER,
            open_check_interval: DEFAULT_OPEN_CHECK_INTERVAL,
            send_retry_delay: DEFAULT_SEND_RETRY_DELAY,
        }
    }

    /// Sets the delay restored after a successful open.
    #[inline]
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the delay multiplier. Values below 1 are raised to 1.
    #[inline]
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Sets how many consecutive closes are retried.
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the randomized share of each delay, clamped to `0.0..=1.0`.
    ///
    /// `0.0` makes every delay equal to its nominal value.
    #[inline]
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_nan() {
            0.0
        } else {
            jitter.clamp(0.0, 1.0)
        };
        self
    }

    /// Sets the open watchdog interval.
    #[inline]
    #[must_use]
    pub fn with_open_check_interval(mut self, interval: Duration) -> Self {
        self.open_check_interval = interval;
        self
    }

    /// Sets the outbox retry interval.
    #[inline]
    #[must_use]
    pub fn with_send_retry_delay(mut self, delay: Duration) -> Self {
        self.send_retry_delay = delay;
        self
    }

    /// Returns the base delay.
    #[inline]
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Returns the attempt cap.
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the open watchdog interval.
    #[inline]
    #[must_use]
    pub fn open_check_interval(&self) -> Duration {
        self.open_check_interval
    }

    /// Returns the outbox retry interval.
    #[inline]
    #[must_use]
    pub fn send_retry_delay(&self) -> Duration {
        self.send_retry_delay
    }
}

// ============================================================================
// Backoff
// ============================================================================

/// Decision taken after an unexpected close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffStep {
    /// Reconnect after `delay`.
    Retry {
        /// 1-based attempt number.
        attempt: u32,
        /// Delay before jitter.
        nominal: Duration,
        /// Delay actually waited.
        delay: Duration,
    },

    /// Attempt cap exceeded; stop reconnecting.
    Exhausted {
        /// Consecutive closes counted.
        attempts: u32,
    },
}

/// Attempt counter and current delay.
///
/// The delay is tracked in fractional milliseconds and rounded to whole
/// microseconds when turned into a [`Duration`].
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    attempt: u32,
    delay_ms: f64,
}

impl Backoff {
    /// Creates a fresh backoff for `policy`.
    #[inline]
    #[must_use]
    pub fn new(policy: &ReconnectPolicy) -> Self {
        Self {
            attempt: 0,
            delay_ms: base_millis(policy),
        }
    }

    /// Returns the number of consecutive closes recorded.
    #[inline]
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the current nominal delay.
    #[inline]
    #[must_use]
    pub fn delay(&self) -> Duration {
        millis_to_duration(self.delay_ms)
    }

    /// Resets to `(0, base_delay)` after a successful open.
    pub fn reset(&mut self, policy: &ReconnectPolicy) {
        self.attempt = 0;
        self.delay_ms = base_millis(policy);
    }

    /// Records an unexpected close using a random jitter sample.
    pub fn record_close(&mut self, policy: &ReconnectPolicy) -> BackoffStep {
        let sample = rand::rng().random::<f64>();
        self.record_close_with(policy, sample)
    }

    /// Records an unexpected close with a caller-supplied sample in `0.0..=1.0`.
    ///
    /// The waited delay is `(1 - j) * delay + j * sample * delay`.
    pub fn record_close_with(&mut self, policy: &ReconnectPolicy, sample: f64) -> BackoffStep {
        self.attempt = self.attempt.saturating_add(1);
        self.delay_ms *= policy.multiplier;

        if self.attempt > policy.max_attempts {
            return BackoffStep::Exhausted {
                attempts: self.attempt,
            };
        }

        let sample = if sample.is_nan() {
            0.0
        } else {
            sample.clamp(0.0, 1.0)
        };
        let actual_ms =
            (1.0 - policy.jitter) * self.delay_ms + policy.jitter * sample * self.delay_ms;

        BackoffStep::Retry {
            attempt: self.attempt,
            nominal: millis_to_duration(self.delay_ms),
            delay: millis_to_duration(actual_ms),
        }
    }
}

fn base_millis(policy: &ReconnectPolicy) -> f64 {
    policy.base_delay.as_micros() as f64 / 1000.0
}

fn millis_to_duration(ms: f64) -> Duration {
    let micros = (ms * 1000.0).round();
    if micros.is_finite() && micros > 0.0 {
        Duration::from_micros(micros.min(u64::MAX as f64) as u64)
    } else {
        Duration::ZERO
    }
}

// ============================================================================
// Tests
// ============================================================================
