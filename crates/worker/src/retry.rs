use std::time::Duration;

/// Retry schedule for a failing connection.
///
/// Attempts are counted including the first one, so `max_attempts: 3`
/// means one initial try plus at most two retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
	Never,
	FixedDelay { max_attempts: usize, delay: Duration },
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::FixedDelay {
			max_attempts: 3,
			delay: Duration::from_secs(5),
		}
	}
}

impl RetryPolicy {
	/// Delay before the next attempt, or `None` once `attempts_made` has
	/// used up the budget.
	pub fn next_delay(&self, attempts_made: usize) -> Option<Duration> {
		match self {
			Self::Never => None,
			Self::FixedDelay { max_attempts, delay } => (attempts_made < *max_attempts).then_some(*delay),
		}
	}

	pub fn max_attempts(&self) -> usize {
		match self {
			Self::Never => 1,
			Self::FixedDelay { max_attempts, .. } => *max_attempts,
		}
	}
}
