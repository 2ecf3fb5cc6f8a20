//! Exponential retry backoff for link reconnects.
//!
//! Each link (WiFi, broker) owns one [`Backoff`]. The first attempt is due
//! immediately; every failure doubles the retry interval up to a cap and
//! bumps the attempt counter; a success resets both.
//!
//! # Example
//!
//! ```rust
//! use room_fx::backoff::Backoff;
//!
//! let mut backoff = Backoff::new(5_000, 60_000, 5);
//! assert!(backoff.is_due(0));
//!
//! backoff.record_attempt(0);
//! backoff.on_failure();
//! assert_eq!(backoff.interval_ms(), 10_000);
//! assert!(!backoff.is_due(9_999));
//! assert!(backoff.is_due(10_000));
//! ```

/// Retry timer with a doubling, capped interval and an attempt budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Backoff {
    base_ms: u32,
    cap_ms: u32,
    interval_ms: u32,
    attempts: u8,
    max_attempts: u8,
    last_attempt_ms: Option<u64>,
}

impl Backoff {
    /// Create a backoff starting at `base_ms`, doubling up to `cap_ms`.
    ///
    /// `max_attempts` of 0 means the budget never runs out.
    pub fn new(base_ms: u32, cap_ms: u32, max_attempts: u8) -> Self {
        Self {
            base_ms,
            cap_ms: cap_ms.max(base_ms),
            interval_ms: base_ms,
            attempts: 0,
            max_attempts,
            last_attempt_ms: None,
        }
    }

    /// True when no attempt has been made yet or the interval has elapsed.
    pub fn is_due(&self, now_ms: u64) -> bool {
        match self.last_attempt_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= u64::from(self.interval_ms),
        }
    }

    /// Stamp the start of an attempt.
    pub fn record_attempt(&mut self, now_ms: u64) {
        self.last_attempt_ms = Some(now_ms);
    }

    /// Register a failed attempt: double the interval (capped) and count it.
    pub fn on_failure(&mut self) {
        self.interval_ms = self.interval_ms.saturating_mul(2).min(self.cap_ms);
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Register a successful attempt: back to the base interval, zero attempts.
    pub fn on_success(&mut self) {
        self.interval_ms = self.base_ms;
        self.attempts = 0;
    }

    /// True once consecutive failures reached the attempt budget.
    pub fn is_exhausted(&self) -> bool {
        self.max_attempts != 0 && self.attempts >= self.max_attempts
    }

    /// Current retry interval.
    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Consecutive failed attempts since the last success.
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Timestamp of the most recent attempt, if any.
    pub fn last_attempt_ms(&self) -> Option<u64> {
        self.last_attempt_ms
    }
}
