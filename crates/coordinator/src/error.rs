//! Error types for the save coordinator.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of one [`SaveOperation`](crate::SaveOperation) attempt.
///
/// Operation failures never propagate to callers of `schedule`/`save_now`.
/// They surface through the configured reporter, the `on_error` hook, and the
/// `is_dirty`/`retry_count` fields of the state snapshot.
#[derive(Debug, Error)]
pub enum SaveError {
	/// Failure that is worth retrying after backoff.
	#[error("{0:#}")]
	Transient(anyhow::Error),

	/// Failure the caller has classified as not worth retrying. Reported as a
	/// permanent failure without consuming the retry budget.
	#[error("{0:#}")]
	Fatal(anyhow::Error),
}

impl SaveError {
	/// Wraps `err` as a retryable failure.
	pub fn transient(err: impl Into<anyhow::Error>) -> Self {
		Self::Transient(err.into())
	}

	/// Wraps `err` as a non-retryable failure.
	pub fn fatal(err: impl Into<anyhow::Error>) -> Self {
		Self::Fatal(err.into())
	}

	/// Builds a retryable failure from a message.
	pub fn msg<M>(message: M) -> Self
	where
		M: fmt::Display + fmt::Debug + Send + Sync + 'static,
	{
		Self::Transient(anyhow::Error::msg(message))
	}

	/// Returns whether the executor may retry after this failure.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Transient(_))
	}

	/// Underlying error.
	pub fn inner(&self) -> &anyhow::Error {
		match self {
			Self::Transient(err) | Self::Fatal(err) => err,
		}
	}
}

impl From<anyhow::Error> for SaveError {
	fn from(err: anyhow::Error) -> Self {
		Self::Transient(err)
	}
}

impl From<std::io::Error> for SaveError {
	fn from(err: std::io::Error) -> Self {
		Self::Transient(err.into())
	}
}

/// Error returned by the coordinator handle itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoordinatorError {
	/// The worker task has stopped and no longer accepts commands.
	#[error("save coordinator is closed")]
	Closed,

	/// The coordinator was spawned outside a Tokio runtime.
	#[error("save coordinator requires a running tokio runtime")]
	NoRuntime,
}

/// Errors that can occur while loading coordinator configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or field types.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// A value parsed but violates a constraint.
	#[error("invalid configuration: {0}")]
	Invalid(String),
}
