//! Failure reporting and completion hooks.

use std::sync::Arc;

use crate::error::SaveError;
use crate::operation::Timestamp;

/// Whether a reported failure will be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
	/// The executor will retry after backoff.
	Retryable,
	/// Retries are exhausted or the error was classified fatal.
	Permanent,
}

/// One failed attempt as seen by a [`SaveReporter`].
#[derive(Debug, Clone, Copy)]
pub struct FailureReport<'a> {
	/// Label of the failing operation.
	pub label: &'a str,
	/// [`CancelToken::cycle`](crate::CancelToken::cycle) of the failed attempt.
	pub cycle: u64,
	/// Error returned by the attempt.
	pub error: &'a SaveError,
	/// Retryable or permanent.
	pub kind: FailureKind,
	/// Consecutive failures so far, including this one.
	pub retry: u32,
	/// Configured retry budget.
	pub max_retries: u32,
}

impl FailureReport<'_> {
	/// Returns true when the executor will retry.
	pub fn is_retryable(&self) -> bool {
		self.kind == FailureKind::Retryable
	}
}

/// Collaborator told about every failed attempt so the surrounding system can
/// surface save status. The coordinator renders nothing itself.
pub trait SaveReporter: Send + Sync + 'static {
	/// Called once per failed attempt, retryable or permanent.
	fn report(&self, report: &FailureReport<'_>);
}

impl<F> SaveReporter for F
where
	F: Fn(&FailureReport<'_>) + Send + Sync + 'static,
{
	fn report(&self, report: &FailureReport<'_>) {
		self(report)
	}
}

/// Default reporter writing failures to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl SaveReporter for TracingReporter {
	fn report(&self, report: &FailureReport<'_>) {
		match report.kind {
			FailureKind::Retryable => tracing::warn!(
				op = report.label,
				cycle = report.cycle,
				retry = report.retry,
				max_retries = report.max_retries,
				error = %report.error,
				"autosave.save.retry"
			),
			FailureKind::Permanent => tracing::error!(
				op = report.label,
				cycle = report.cycle,
				retry = report.retry,
				max_retries = report.max_retries,
				error = %report.error,
				"autosave.save.failed"
			),
		}
	}
}

type SuccessFn = dyn Fn(Timestamp) + Send + Sync;
type ErrorFn = dyn Fn(&SaveError) + Send + Sync;

/// Callbacks invoked by the executor.
#[derive(Clone)]
pub(crate) struct Hooks {
	pub(crate) on_success: Option<Arc<SuccessFn>>,
	pub(crate) on_error: Option<Arc<ErrorFn>>,
	pub(crate) reporter: Arc<dyn SaveReporter>,
}

impl Default for Hooks {
	fn default() -> Self {
		Self {
			on_success: None,
			on_error: None,
			reporter: Arc::new(TracingReporter),
		}
	}
}

impl Hooks {
	pub(crate) fn succeeded(&self, at: Timestamp) {
		if let Some(f) = &self.on_success {
			f(at);
		}
	}

	pub(crate) fn failed(&self, report: &FailureReport<'_>) {
		self.reporter.report(report);
		if report.kind == FailureKind::Permanent
			&& let Some(f) = &self.on_error
		{
			f(report.error);
		}
	}
}
