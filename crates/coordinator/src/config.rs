//! Coordinator configuration and TOML loading.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::backoff::BackoffPolicy;
use crate::error::ConfigError;

/// What happens to queued operations after a permanent failure of the
/// operation ahead of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueResume {
	/// Keep them queued until the next submission reaches a free slot.
	#[default]
	Hold,
	/// Drain them after the usual inter-queue delay.
	Drain,
}

/// Tunables for one [`SaveCoordinator`](crate::SaveCoordinator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
	/// Debounce quiet period. Zero executes scheduled saves immediately.
	pub interval: Duration,
	/// Retries allowed after the first failed attempt.
	pub max_retries: u32,
	/// Delay policy between retries.
	pub backoff: BackoffPolicy,
	/// Pause between a successful save and the next queued one.
	pub queue_delay: Duration,
	/// Queue handling after a permanent failure.
	pub after_failure: QueueResume,
	/// Capacity of the per-subscriber snapshot buffer.
	pub state_buffer: usize,
}

impl Default for CoordinatorConfig {
	fn default() -> Self {
		Self {
			interval: Duration::from_millis(5000),
			max_retries: 3,
			backoff: BackoffPolicy::default(),
			queue_delay: Duration::from_millis(100),
			after_failure: QueueResume::Hold,
			state_buffer: 64,
		}
	}
}

impl CoordinatorConfig {
	/// Sets the debounce interval.
	#[must_use]
	pub fn interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}

	/// Sets the retry budget.
	#[must_use]
	pub fn max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;
		self
	}

	/// Sets the backoff policy.
	#[must_use]
	pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
		self.backoff = backoff;
		self
	}

	/// Sets the inter-queue delay.
	#[must_use]
	pub fn queue_delay(mut self, queue_delay: Duration) -> Self {
		self.queue_delay = queue_delay;
		self
	}

	/// Sets queue handling after a permanent failure.
	#[must_use]
	pub fn after_failure(mut self, after_failure: QueueResume) -> Self {
		self.after_failure = after_failure;
		self
	}

	/// Sets the per-subscriber snapshot buffer. Zero is raised to one.
	#[must_use]
	pub fn state_buffer(mut self, size: usize) -> Self {
		self.state_buffer = size.max(1);
		self
	}

	/// Parses a TOML document. Missing keys take their defaults.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let file: ConfigFile = toml::from_str(input)?;
		file.into_config()
	}

	/// Reads and parses a TOML file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}
}

/// On-disk shape; durations are integer milliseconds.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
	interval_ms: u64,
	max_retries: u32,
	backoff_base_ms: u64,
	backoff_cap_ms: u64,
	queue_delay_ms: u64,
	after_failure: QueueResume,
	state_buffer: usize,
}

impl Default for ConfigFile {
	fn default() -> Self {
		let defaults = CoordinatorConfig::default();
		Self {
			interval_ms: millis(defaults.interval),
			max_retries: defaults.max_retries,
			backoff_base_ms: millis(defaults.backoff.base()),
			backoff_cap_ms: millis(defaults.backoff.cap()),
			queue_delay_ms: millis(defaults.queue_delay),
			after_failure: defaults.after_failure,
			state_buffer: defaults.state_buffer,
		}
	}
}

impl ConfigFile {
	fn into_config(self) -> Result<CoordinatorConfig, ConfigError> {
		if self.backoff_cap_ms < self.backoff_base_ms {
			return Err(ConfigError::Invalid(format!(
				"backoff_cap_ms ({}) must be >= backoff_base_ms ({})",
				self.backoff_cap_ms, self.backoff_base_ms
			)));
		}
		if self.state_buffer == 0 {
			return Err(ConfigError::Invalid("state_buffer must be > 0".to_string()));
		}
		Ok(CoordinatorConfig {
			interval: Duration::from_millis(self.interval_ms),
			max_retries: self.max_retries,
			backoff: BackoffPolicy::new(Duration::from_millis(self.backoff_base_ms), Duration::from_millis(self.backoff_cap_ms)),
			queue_delay: Duration::from_millis(self.queue_delay_ms),
			after_failure: self.after_failure,
			state_buffer: self.state_buffer,
		})
	}
}

fn millis(d: Duration) -> u64 {
	u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
