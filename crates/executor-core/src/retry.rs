//! Retry policy for failed execution attempts.
//!
//! Backoff is an explicit delay computation handed to the queue as a
//! re-enqueue deadline; the policy itself never sleeps and never talks to
//! the queue.

use std::time::Duration;

/// Bounded-attempt exponential backoff policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
	/// Total attempts per order, including the first.
	max_attempts: u32,
	/// Delay before the second attempt; doubles for each one after.
	base_delay: Duration,
}

impl RetryPolicy {
	pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
		Self {
			max_attempts,
			base_delay,
		}
	}

	/// Whether another attempt may follow the given failed attempt.
	pub fn should_retry(&self, failed_attempt: u32) -> bool {
		failed_attempt < self.max_attempts
	}

	/// Backoff delay after the given failed attempt:
	/// `base_delay * 2^(failed_attempt - 1)`.
	pub fn backoff_delay(&self, failed_attempt: u32) -> Duration {
		// Attempt counts are bounded by max_attempts; the cap only guards
		// the multiplication.
		let exponent = failed_attempt.saturating_sub(1).min(16);
		self.base_delay * 2u32.pow(exponent)
	}
}
