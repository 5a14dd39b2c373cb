//! Single-consumer save worker.
//!
//! One task owns the debounce gate, the pending queue, the execution slot and
//! the persistent state fields. The handle talks to it only through
//! [`Command`]s, so every mutation happens on this task and no two operation
//! bodies are ever polled concurrently.
//!
//! # Execution slot
//!
//! The slot plays the role of the exclusive save lock. Only [`Slot::Free`]
//! admits a new operation; while an attempt runs, waits out its backoff, or
//! the inter-queue delay is pending, new submissions go to the queue. This
//! keeps queued work strictly FIFO behind the operation that holds the slot.
//!
//! # Cancellation
//!
//! A revoked attempt is still polled to completion because its external
//! effect cannot be undone. Its result is discarded without touching
//! `is_dirty`, `last_saved` or the queue. The cycle ends there, so
//! `retry_count` returns to zero and the next save gets the full budget.

use std::mem;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::config::{CoordinatorConfig, QueueResume};
use crate::debounce::{DebounceGate, Scheduled};
use crate::error::SaveError;
use crate::operation::{SaveContext, SaveOperation, SaveResult, Timestamp};
use crate::queue::PendingQueue;
use crate::report::{FailureKind, FailureReport, Hooks};
use crate::state::{CoordinatorState, SavePhase, StatePublisher};
use crate::token::CancelToken;

/// Command protocol between the handle and the worker.
pub(crate) enum Command {
	Schedule(SaveOperation),
	SaveNow(SaveOperation),
	CancelPending,
	ClearQueue,
	Snapshot(oneshot::Sender<CoordinatorState>),
}

enum Slot {
	Free,
	Running {
		op: SaveOperation,
		token: CancelToken,
		attempt: u32,
		fut: BoxFuture<'static, SaveResult>,
	},
	RetryWaiting {
		op: SaveOperation,
		token: CancelToken,
		attempt: u32,
		wake: Instant,
	},
	Draining {
		wake: Instant,
	},
}

impl Slot {
	fn token(&self) -> Option<&CancelToken> {
		match self {
			Self::Running { token, .. } | Self::RetryWaiting { token, .. } => Some(token),
			Self::Free | Self::Draining { .. } => None,
		}
	}
}

enum SlotEvent {
	Completed(SaveResult),
	Woke,
}

pub(crate) struct SaveWorker {
	config: CoordinatorConfig,
	hooks: Hooks,
	publisher: StatePublisher,
	gate: DebounceGate<SaveOperation>,
	queue: PendingQueue<SaveOperation>,
	slot: Slot,
	cycles: u64,
	dirty: bool,
	last_saved: Option<Timestamp>,
	retry_count: u32,
}

impl SaveWorker {
	pub(crate) fn new(config: CoordinatorConfig, hooks: Hooks, publisher: StatePublisher) -> Self {
		Self {
			gate: DebounceGate::new(config.interval),
			config,
			hooks,
			publisher,
			queue: PendingQueue::new(),
			slot: Slot::Free,
			cycles: 0,
			dirty: false,
			last_saved: None,
			retry_count: 0,
		}
	}

	/// Runs until every handle is gone.
	pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
		tracing::debug!(interval = ?self.config.interval, max_retries = self.config.max_retries, "autosave.worker.start");
		loop {
			let debounce_at = self.gate.deadline();
			tokio::select! {
				biased;
				cmd = rx.recv() => {
					let Some(cmd) = cmd else {
						break;
					};
					self.handle(cmd);
				}
				event = wait_slot(&mut self.slot) => self.on_slot_event(event),
				() = sleep_until(debounce_at) => self.on_debounce_due(),
			}
			self.publish();
		}

		self.clear_queue();
		self.publish();
		// Let a revoked attempt finish its external effect before exiting.
		if let Slot::Running { fut, op, .. } = mem::replace(&mut self.slot, Slot::Free) {
			tracing::debug!(op = op.label(), "autosave.worker.await_inflight");
			let _ = fut.await;
		}
		tracing::debug!("autosave.worker.stop");
	}

	fn handle(&mut self, cmd: Command) {
		match cmd {
			Command::Schedule(op) => {
				self.dirty = true;
				match self.gate.schedule(op, Instant::now()) {
					Scheduled::Armed { replaced } => {
						tracing::trace!(replaced, interval = ?self.gate.interval(), "autosave.debounce.arm");
					}
					Scheduled::Immediate(op) => self.execute(op),
				}
			}
			Command::SaveNow(op) => {
				// The explicit save supersedes any edit still waiting on the timer.
				if self.gate.cancel() {
					tracing::trace!(op = op.label(), "autosave.debounce.superseded");
				}
				self.dirty = true;
				self.execute(op);
			}
			Command::CancelPending => self.cancel_pending(),
			Command::ClearQueue => self.clear_queue(),
			Command::Snapshot(reply) => {
				let _ = reply.send(self.snapshot());
			}
		}
	}

	/// Starts `op` if the slot is free, otherwise queues it.
	///
	/// A held queue resumes here: `op` goes behind the queued items and the
	/// queue front runs first.
	fn execute(&mut self, op: SaveOperation) {
		if !matches!(self.slot, Slot::Free) {
			tracing::debug!(op = op.label(), queued = self.queue.len() + 1, "autosave.queue.push");
			self.queue.push(op);
			return;
		}
		self.queue.push(op);
		if let Some(next) = self.queue.pop_front() {
			self.start(next, 1);
		}
	}

	fn start(&mut self, op: SaveOperation, attempt: u32) {
		self.cycles += 1;
		let token = CancelToken::for_cycle(self.cycles);
		tracing::debug!(op = op.label(), attempt, cycle = token.cycle(), "autosave.save.start");
		let fut = op.run(SaveContext::new(attempt, token.clone()));
		self.slot = Slot::Running { op, token, attempt, fut };
	}

	fn on_debounce_due(&mut self) {
		if let Some(op) = self.gate.take_due(Instant::now()) {
			tracing::debug!(op = op.label(), "autosave.debounce.fire");
			self.execute(op);
		}
	}

	fn on_slot_event(&mut self, event: SlotEvent) {
		match (mem::replace(&mut self.slot, Slot::Free), event) {
			(Slot::Running { op, token, attempt, .. }, SlotEvent::Completed(result)) => self.finish(op, &token, attempt, result),
			(Slot::RetryWaiting { op, token, attempt, .. }, SlotEvent::Woke) => {
				if token.is_cancelled() {
					tracing::debug!(op = op.label(), cycle = token.cycle(), "autosave.retry.cancelled");
					self.retry_count = 0;
					return;
				}
				self.start(op, attempt.saturating_add(1));
			}
			(Slot::Draining { .. }, SlotEvent::Woke) => {
				if let Some(next) = self.queue.pop_front() {
					tracing::debug!(op = next.label(), remaining = self.queue.len(), "autosave.queue.drain");
					self.start(next, 1);
				}
			}
			(slot, _) => self.slot = slot,
		}
	}

	fn finish(&mut self, op: SaveOperation, token: &CancelToken, attempt: u32, result: SaveResult) {
		if token.is_cancelled() {
			tracing::debug!(op = op.label(), attempt, cycle = token.cycle(), ok = result.is_ok(), "autosave.save.cancelled");
			self.retry_count = 0;
			return;
		}

		match result {
			Ok(at) => {
				tracing::debug!(op = op.label(), attempt, cycle = token.cycle(), saved_at = %at, "autosave.save.ok");
				self.dirty = false;
				self.last_saved = Some(at);
				self.retry_count = 0;
				self.hooks.succeeded(at);
				self.schedule_drain();
			}
			Err(error) => self.fail(op, token.clone(), attempt, &error),
		}
	}

	fn fail(&mut self, op: SaveOperation, token: CancelToken, attempt: u32, error: &SaveError) {
		self.retry_count = self.retry_count.saturating_add(1);
		let max_retries = self.config.max_retries;

		if error.is_retryable() && self.retry_count <= max_retries {
			let delay = self.config.backoff.delay(self.retry_count);
			self.hooks.failed(&FailureReport {
				label: op.label(),
				cycle: token.cycle(),
				error,
				kind: FailureKind::Retryable,
				retry: self.retry_count,
				max_retries,
			});
			tracing::debug!(op = op.label(), attempt, retry = self.retry_count, delay = ?delay, "autosave.retry.arm");
			self.slot = Slot::RetryWaiting {
				op,
				token,
				attempt,
				wake: Instant::now() + delay,
			};
			return;
		}

		let retry = self.retry_count;
		self.dirty = true;
		self.retry_count = 0;
		self.hooks.failed(&FailureReport {
			label: op.label(),
			cycle: token.cycle(),
			error,
			kind: FailureKind::Permanent,
			retry,
			max_retries,
		});
		if self.config.after_failure == QueueResume::Drain {
			self.schedule_drain();
		} else if !self.queue.is_empty() {
			tracing::debug!(queued = self.queue.len(), "autosave.queue.hold");
		}
	}

	fn schedule_drain(&mut self) {
		if !self.queue.is_empty() {
			self.slot = Slot::Draining {
				wake: Instant::now() + self.config.queue_delay,
			};
		}
	}

	fn cancel_pending(&mut self) {
		let disarmed = self.gate.cancel();
		if matches!(self.slot, Slot::Draining { .. }) {
			self.slot = Slot::Free;
		} else if let Some(token) = self.slot.token() {
			token.revoke();
		}
		tracing::debug!(disarmed, "autosave.cancel");
	}

	fn clear_queue(&mut self) {
		let dropped = self.queue.clear();
		if dropped > 0 {
			tracing::debug!(dropped, "autosave.queue.clear");
		}
		self.cancel_pending();
	}

	fn snapshot(&self) -> CoordinatorState {
		let phase = match self.slot {
			Slot::Running { .. } => SavePhase::Saving,
			Slot::RetryWaiting { .. } => SavePhase::RetryWaiting,
			Slot::Draining { .. } => SavePhase::Draining,
			Slot::Free if self.gate.is_armed() => SavePhase::Debouncing,
			Slot::Free => SavePhase::Idle,
		};
		CoordinatorState {
			is_saving: matches!(self.slot, Slot::Running { .. }),
			is_pending: self.gate.is_armed() || !self.queue.is_empty(),
			is_dirty: self.dirty,
			last_saved: self.last_saved,
			retry_count: self.retry_count,
			phase,
			queued: self.queue.len(),
		}
	}

	fn publish(&self) {
		self.publisher.publish(self.snapshot());
	}
}

/// Resolves when the slot's pending work completes or its timer fires.
async fn wait_slot(slot: &mut Slot) -> SlotEvent {
	match slot {
		Slot::Running { fut, .. } => SlotEvent::Completed(fut.as_mut().await),
		Slot::RetryWaiting { wake, .. } | Slot::Draining { wake } => {
			tokio::time::sleep_until(*wake).await;
			SlotEvent::Woke
		}
		Slot::Free => std::future::pending().await,
	}
}

async fn sleep_until(at: Option<Instant>) {
	match at {
		Some(at) => tokio::time::sleep_until(at).await,
		None => std::future::pending().await,
	}
}
