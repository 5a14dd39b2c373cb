use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;

use super::*;
use crate::backoff::BackoffPolicy;
use crate::operation::SaveContext;
use crate::report::{FailureKind, FailureReport};
use crate::state::SavePhase;

fn ms(n: u64) -> Duration {
	Duration::from_millis(n)
}

fn config() -> CoordinatorConfig {
	CoordinatorConfig::default()
		.interval(ms(100))
		.backoff(BackoffPolicy::new(ms(10), ms(50)))
		.queue_delay(ms(5))
}

/// Operation counting its invocations; fails while `fail` is set.
fn counting(calls: &Arc<AtomicUsize>, fail: &Arc<AtomicBool>, work: Duration) -> SaveOperation {
	let calls = Arc::clone(calls);
	let fail = Arc::clone(fail);
	SaveOperation::new(move |_ctx| {
		calls.fetch_add(1, Ordering::SeqCst);
		let fail = fail.load(Ordering::SeqCst);
		async move {
			tokio::time::sleep(work).await;
			if fail { Err(SaveError::msg("backend unavailable")) } else { Ok(Utc::now()) }
		}
	})
}

#[test]
fn spawn_outside_runtime_fails() {
	let err = SaveCoordinator::spawn(config()).err();
	assert_eq!(err, Some(CoordinatorError::NoRuntime));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn fatal_error_skips_retry_budget() {
	let errors = Arc::new(AtomicUsize::new(0));
	let kinds = Arc::new(parking_lot::Mutex::new(Vec::new()));
	let errors_hook = Arc::clone(&errors);
	let kinds_hook = Arc::clone(&kinds);
	let coord = SaveCoordinator::builder(config().max_retries(5))
		.on_error(move |err| {
			assert!(!err.is_retryable());
			errors_hook.fetch_add(1, Ordering::SeqCst);
		})
		.reporter(move |report: &FailureReport<'_>| kinds_hook.lock().push((report.kind, report.retry, report.cycle)))
		.spawn()
		.unwrap();

	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	coord
		.save_now(SaveOperation::new(move |_ctx| {
			counter.fetch_add(1, Ordering::SeqCst);
			async { Err(SaveError::fatal(anyhow::anyhow!("permission denied"))) }
		}))
		.unwrap();
	tokio::time::sleep(ms(500)).await;

	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(errors.load(Ordering::SeqCst), 1);
	assert_eq!(*kinds.lock(), vec![(FailureKind::Permanent, 1, 1)]);
	let state = coord.snapshot().await.unwrap();
	assert!(state.is_dirty);
	assert_eq!(state.retry_count, 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn cancel_during_backoff_ends_the_cycle() {
	let calls = Arc::new(AtomicUsize::new(0));
	let fail = Arc::new(AtomicBool::new(true));
	let coord = SaveCoordinator::spawn(config()).unwrap();

	coord.save_now(counting(&calls, &fail, ms(1))).unwrap();
	tokio::time::sleep(ms(5)).await;
	let state = coord.snapshot().await.unwrap();
	assert_eq!(state.phase, SavePhase::RetryWaiting);
	assert_eq!(state.retry_count, 1);

	coord.cancel_pending().unwrap();
	tokio::time::sleep(ms(500)).await;

	assert_eq!(calls.load(Ordering::SeqCst), 1, "revoked retry must not re-run");
	let state = coord.snapshot().await.unwrap();
	assert_eq!(state.phase, SavePhase::Idle);
	assert!(state.is_dirty);
	assert_eq!(state.retry_count, 0, "a cancelled cycle gives back its retry budget");

	fail.store(false, Ordering::SeqCst);
	coord.save_now(counting(&calls, &fail, ms(1))).unwrap();
	tokio::time::sleep(ms(10)).await;
	let state = coord.snapshot().await.unwrap();
	assert_eq!(state.retry_count, 0);
	assert!(!state.is_dirty);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn cancel_during_drain_delay_holds_the_queue() {
	let calls = Arc::new(AtomicUsize::new(0));
	let fail = Arc::new(AtomicBool::new(false));
	let coord = SaveCoordinator::spawn(config().queue_delay(ms(50))).unwrap();

	coord.save_now(counting(&calls, &fail, ms(10))).unwrap();
	coord.save_now(counting(&calls, &fail, ms(10))).unwrap();
	// First save completes at t = 10; the queued one would start at t = 60.
	tokio::time::sleep(ms(30)).await;
	let state = coord.snapshot().await.unwrap();
	assert_eq!(state.phase, SavePhase::Draining);
	assert!(!state.is_saving);
	coord.cancel_pending().unwrap();
	tokio::time::sleep(ms(200)).await;

	assert_eq!(calls.load(Ordering::SeqCst), 1);
	let state = coord.snapshot().await.unwrap();
	assert_eq!(state.phase, SavePhase::Idle);
	assert_eq!(state.queued, 1);
	assert!(!state.is_dirty, "first save was confirmed before the cancel");
	assert!(state.last_saved.is_some());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn operations_observe_revocation_cooperatively() {
	let saw_cancel = Arc::new(AtomicBool::new(false));
	let flag = Arc::clone(&saw_cancel);
	let coord = SaveCoordinator::spawn(config()).unwrap();

	coord
		.save_now(SaveOperation::new(move |ctx: SaveContext| {
			let flag = Arc::clone(&flag);
			async move {
				assert_eq!(ctx.attempt(), 1);
				tokio::select! {
					() = ctx.token().cancelled() => flag.store(true, Ordering::SeqCst),
					() = tokio::time::sleep(Duration::from_secs(60)) => {}
				}
				Ok(Utc::now())
			}
		}))
		.unwrap();
	tokio::time::sleep(ms(10)).await;
	assert!(coord.snapshot().await.unwrap().is_saving);

	coord.cancel_pending().unwrap();
	tokio::time::sleep(ms(10)).await;

	assert!(saw_cancel.load(Ordering::SeqCst));
	let state = coord.snapshot().await.unwrap();
	assert!(!state.is_saving);
	assert_eq!(state.last_saved, None);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn subscribers_see_each_transition() {
	let calls = Arc::new(AtomicUsize::new(0));
	let fail = Arc::new(AtomicBool::new(false));
	let coord = SaveCoordinator::spawn(config()).unwrap();
	let mut stream = coord.subscribe();

	coord.schedule(counting(&calls, &fail, ms(20))).unwrap();
	tokio::time::sleep(ms(500)).await;

	let mut phases = Vec::new();
	while let Some(state) = stream.try_next() {
		phases.push((state.phase, state.is_dirty, state.is_pending));
	}
	assert_eq!(
		phases,
		vec![
			(SavePhase::Debouncing, true, true),
			(SavePhase::Saving, true, false),
			(SavePhase::Idle, false, false),
		]
	);
	assert_eq!(coord.state().phase, SavePhase::Idle);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn shutdown_waits_for_inflight_and_closes_streams() {
	let finished = Arc::new(AtomicBool::new(false));
	let succeeded = Arc::new(AtomicUsize::new(0));
	let flag = Arc::clone(&finished);
	let hook = Arc::clone(&succeeded);
	let coord = SaveCoordinator::builder(config())
		.on_success(move |_| {
			hook.fetch_add(1, Ordering::SeqCst);
		})
		.spawn()
		.unwrap();
	let mut stream = coord.subscribe();

	coord
		.save_now(SaveOperation::new(move |_ctx| {
			let flag = Arc::clone(&flag);
			async move {
				tokio::time::sleep(ms(200)).await;
				flag.store(true, Ordering::SeqCst);
				Ok(Utc::now())
			}
		}))
		.unwrap();
	tokio::time::sleep(ms(10)).await;

	tokio::time::timeout(Duration::from_secs(1), coord.shutdown())
		.await
		.expect("shutdown should not hang");
	assert!(finished.load(Ordering::SeqCst), "in-flight attempt runs to completion");
	assert_eq!(succeeded.load(Ordering::SeqCst), 0, "its result is discarded");

	while stream.next().await.is_some() {}
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn dropping_the_handle_stops_the_worker() {
	let coord = SaveCoordinator::spawn(config()).unwrap();
	let mut stream = coord.subscribe();
	drop(coord);
	let end = tokio::time::timeout(Duration::from_secs(1), stream.next()).await;
	assert_eq!(end.ok(), Some(None));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn single_flight_under_mixed_submissions() {
	let active = Arc::new(AtomicUsize::new(0));
	let peak = Arc::new(AtomicUsize::new(0));
	let runs = Arc::new(AtomicUsize::new(0));
	let coord = SaveCoordinator::spawn(config().interval(ms(15))).unwrap();

	let op = {
		let active = Arc::clone(&active);
		let peak = Arc::clone(&peak);
		let runs = Arc::clone(&runs);
		SaveOperation::new(move |_ctx| {
			let active = Arc::clone(&active);
			let peak = Arc::clone(&peak);
			runs.fetch_add(1, Ordering::SeqCst);
			async move {
				let now = active.fetch_add(1, Ordering::SeqCst) + 1;
				peak.fetch_max(now, Ordering::SeqCst);
				tokio::time::sleep(ms(7)).await;
				active.fetch_sub(1, Ordering::SeqCst);
				Ok(Utc::now())
			}
		})
	};

	for i in 0..40u64 {
		if i % 3 == 0 {
			coord.save_now(op.clone()).unwrap();
		} else {
			coord.schedule(op.clone()).unwrap();
		}
		tokio::time::sleep(ms(i % 5 * 4)).await;
	}
	tokio::time::sleep(ms(2000)).await;

	assert_eq!(peak.load(Ordering::SeqCst), 1);
	assert!(runs.load(Ordering::SeqCst) >= 14, "every save_now runs");
	assert!(coord.snapshot().await.unwrap().is_idle());
}
