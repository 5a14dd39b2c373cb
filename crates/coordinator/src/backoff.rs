//! Retry delay policy.

use std::time::Duration;

/// Capped exponential backoff: `delay(n) = min(base * 2^n, cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
	base: Duration,
	cap: Duration,
}

impl BackoffPolicy {
	/// Default base delay.
	pub const DEFAULT_BASE: Duration = Duration::from_millis(1000);
	/// Default ceiling.
	pub const DEFAULT_CAP: Duration = Duration::from_millis(10_000);

	/// Creates a policy from a base delay and a ceiling.
	pub const fn new(base: Duration, cap: Duration) -> Self {
		Self { base, cap }
	}

	/// Base delay multiplied on every step.
	pub const fn base(&self) -> Duration {
		self.base
	}

	/// Upper bound on any single delay.
	pub const fn cap(&self) -> Duration {
		self.cap
	}

	/// Delay to wait before the retry following the `retry`-th consecutive failure.
	///
	/// Saturates instead of overflowing, so the result is monotonically
	/// non-decreasing in `retry`.
	pub fn delay(&self, retry: u32) -> Duration {
		let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
		self.base.saturating_mul(factor).min(self.cap)
	}
}

impl Default for BackoffPolicy {
	fn default() -> Self {
		Self::new(Self::DEFAULT_BASE, Self::DEFAULT_CAP)
	}
}
