//! # Fibonacci Backoff
//!
//! Retry delays for failed reconciliations. Delays grow along the Fibonacci
//! sequence in whole minutes and are capped, so a credential whose database is
//! down for a while is retried at 1m, 1m, 2m, 3m, 5m, 8m, then every 10m.
//!
//! ```rust
//! use sql_credential_controller::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(1, 10);
//! assert_eq!(backoff.next_backoff_seconds(), 60);
//! assert_eq!(backoff.next_backoff_seconds(), 60);
//! assert_eq!(backoff.next_backoff_seconds(), 120);
//! ```

use std::time::Duration;

/// Fibonacci backoff state for one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibonacciBackoff {
    min_minutes: u64,
    max_minutes: u64,
    prev_minutes: u64,
    current_minutes: u64,
}

impl FibonacciBackoff {
    /// A zero minimum is raised to one minute so the sequence always grows.
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        let min_minutes = min_minutes.max(1);
        Self {
            min_minutes,
            max_minutes: max_minutes.max(min_minutes),
            prev_minutes: 0,
            current_minutes: min_minutes,
        }
    }

    /// Current delay in seconds; advances the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let seconds = self.current_minutes.saturating_mul(60);
        let next = self.prev_minutes.saturating_add(self.current_minutes);
        self.prev_minutes = self.current_minutes;
        self.current_minutes = next.min(self.max_minutes);
        seconds
    }

    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Back to the first delay, after a successful pass
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}
