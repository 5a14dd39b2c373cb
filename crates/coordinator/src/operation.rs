//! The opaque unit of work the coordinator persists with.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::SaveError;
use crate::token::CancelToken;

/// Completion time reported by a successful save.
pub type Timestamp = DateTime<Utc>;

/// Result of one save attempt.
pub type SaveResult = Result<Timestamp, SaveError>;

type SaveFn = dyn Fn(SaveContext) -> BoxFuture<'static, SaveResult> + Send + Sync;

/// Per-attempt context handed to a [`SaveOperation`].
#[derive(Debug, Clone)]
pub struct SaveContext {
	attempt: u32,
	token: CancelToken,
}

impl SaveContext {
	pub(crate) fn new(attempt: u32, token: CancelToken) -> Self {
		Self { attempt, token }
	}

	/// 1-based attempt number within the current execution cycle.
	pub const fn attempt(&self) -> u32 {
		self.attempt
	}

	/// Token revoked by `cancel_pending`/`clear_queue`.
	pub fn token(&self) -> &CancelToken {
		&self.token
	}

	/// Shorthand for `self.token().is_cancelled()`.
	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}
}

/// Asynchronous persistence call supplied by the caller.
///
/// The closure runs once per attempt; retries invoke it again with a new
/// [`SaveContext`], so it must be re-runnable. The coordinator never inspects
/// what it writes.
#[derive(Clone)]
pub struct SaveOperation {
	label: Arc<str>,
	run: Arc<SaveFn>,
}

impl SaveOperation {
	/// Wraps an async closure yielding the completion timestamp.
	pub fn new<F, Fut>(f: F) -> Self
	where
		F: Fn(SaveContext) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = SaveResult> + Send + 'static,
	{
		Self {
			label: Arc::from("save"),
			run: Arc::new(move |ctx| f(ctx).boxed()),
		}
	}

	/// Wraps an async closure and stamps success with the wall clock.
	pub fn stamped<F, Fut>(f: F) -> Self
	where
		F: Fn(SaveContext) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<(), SaveError>> + Send + 'static,
	{
		Self::new(move |ctx| {
			let fut = f(ctx);
			async move { fut.await.map(|()| Utc::now()) }
		})
	}

	/// Sets the label used in log events and failure reports.
	#[must_use]
	pub fn named(mut self, label: impl Into<Arc<str>>) -> Self {
		self.label = label.into();
		self
	}

	/// Label used in log events and failure reports.
	pub fn label(&self) -> &str {
		&self.label
	}

	pub(crate) fn run(&self, ctx: SaveContext) -> BoxFuture<'static, SaveResult> {
		(self.run)(ctx)
	}
}

impl fmt::Debug for SaveOperation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SaveOperation").field("label", &self.label).finish_non_exhaustive()
	}
}
