#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use autosave_coordinator::{CoordinatorBuilder, CoordinatorConfig, FailureKind, FailureReport, SaveCoordinator, SaveError, SaveOperation};
use chrono::Utc;
use parking_lot::Mutex;

pub fn ms(n: u64) -> Duration {
	Duration::from_millis(n)
}

/// Advances paused virtual time.
pub async fn advance(n: u64) {
	tokio::time::sleep(ms(n)).await;
}

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Config with millisecond-scale timers.
pub fn fast_config() -> CoordinatorConfig {
	CoordinatorConfig::default()
		.interval(ms(1000))
		.backoff(autosave_coordinator::BackoffPolicy::new(ms(10), ms(100)))
		.queue_delay(ms(5))
}

/// Records what operations and hooks observed.
#[derive(Clone, Default)]
pub struct Probe {
	inner: Arc<ProbeInner>,
}

#[derive(Default)]
struct ProbeInner {
	started: Mutex<Vec<&'static str>>,
	finished: Mutex<Vec<&'static str>>,
	reports: Mutex<Vec<(FailureKind, u32, u32)>>,
	active: AtomicUsize,
	max_active: AtomicUsize,
	successes: AtomicUsize,
	errors: AtomicUsize,
}

impl Probe {
	/// Operation that sleeps `work`, then fails its first `fail_first` attempts.
	pub fn op(&self, name: &'static str, work: Duration, fail_first: usize) -> SaveOperation {
		let probe = self.clone();
		let calls = Arc::new(AtomicUsize::new(0));
		SaveOperation::new(move |_ctx| {
			let probe = probe.clone();
			let call = calls.fetch_add(1, Ordering::SeqCst);
			async move {
				probe.enter(name);
				tokio::time::sleep(work).await;
				probe.exit(name);
				if call < fail_first {
					Err(SaveError::msg(format!("{name} failed on call {call}")))
				} else {
					Ok(Utc::now())
				}
			}
		})
		.named(name)
	}

	/// Operation that always succeeds after `work`.
	pub fn ok(&self, name: &'static str, work: Duration) -> SaveOperation {
		self.op(name, work, 0)
	}

	/// Operation that always fails after `work`.
	pub fn failing(&self, name: &'static str, work: Duration) -> SaveOperation {
		self.op(name, work, usize::MAX)
	}

	pub fn builder(&self, config: CoordinatorConfig) -> CoordinatorBuilder {
		let on_success = self.clone();
		let on_error = self.clone();
		let reporter = self.clone();
		SaveCoordinator::builder(config)
			.on_success(move |_| {
				on_success.inner.successes.fetch_add(1, Ordering::SeqCst);
			})
			.on_error(move |_| {
				on_error.inner.errors.fetch_add(1, Ordering::SeqCst);
			})
			.reporter(move |report: &FailureReport<'_>| {
				reporter.inner.reports.lock().push((report.kind, report.retry, report.max_retries));
			})
	}

	pub fn spawn(&self, config: CoordinatorConfig) -> SaveCoordinator {
		self.builder(config).spawn().expect("inside a tokio runtime")
	}

	fn enter(&self, name: &'static str) {
		self.inner.started.lock().push(name);
		let now = self.inner.active.fetch_add(1, Ordering::SeqCst) + 1;
		self.inner.max_active.fetch_max(now, Ordering::SeqCst);
	}

	fn exit(&self, name: &'static str) {
		self.inner.active.fetch_sub(1, Ordering::SeqCst);
		self.inner.finished.lock().push(name);
	}

	pub fn started(&self) -> Vec<&'static str> {
		self.inner.started.lock().clone()
	}

	pub fn finished(&self) -> Vec<&'static str> {
		self.inner.finished.lock().clone()
	}

	pub fn reports(&self) -> Vec<(FailureKind, u32, u32)> {
		self.inner.reports.lock().clone()
	}

	pub fn max_active(&self) -> usize {
		self.inner.max_active.load(Ordering::SeqCst)
	}

	pub fn successes(&self) -> usize {
		self.inner.successes.load(Ordering::SeqCst)
	}

	pub fn errors(&self) -> usize {
		self.inner.errors.load(Ordering::SeqCst)
	}
}
