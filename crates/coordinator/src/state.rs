//! Observable coordinator state.

use tokio::sync::{broadcast, watch};

use crate::operation::Timestamp;

/// Coarse state-machine position of one coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SavePhase {
	/// No timer armed and nothing executing. Queued operations may still be
	/// held, see [`QueueResume`](crate::QueueResume).
	#[default]
	Idle,
	/// A debounce timer is counting down.
	Debouncing,
	/// An operation is executing.
	Saving,
	/// An attempt failed and the backoff timer is armed.
	RetryWaiting,
	/// A save succeeded and the next queued operation starts after the
	/// inter-queue delay.
	Draining,
}

impl SavePhase {
	/// Stable lowercase name for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Debouncing => "debouncing",
			Self::Saving => "saving",
			Self::RetryWaiting => "retry_waiting",
			Self::Draining => "draining",
		}
	}
}

/// Immutable snapshot published after every transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorState {
	/// An operation is currently executing.
	pub is_saving: bool,
	/// A debounce timer is counting down, or a queued operation is waiting.
	pub is_pending: bool,
	/// There are changes not yet confirmed persisted.
	pub is_dirty: bool,
	/// Completion time of the most recent successful save.
	pub last_saved: Option<Timestamp>,
	/// Consecutive failures since the last success or permanent-failure report.
	pub retry_count: u32,
	/// State-machine position.
	pub phase: SavePhase,
	/// Number of operations waiting in the pending queue.
	pub queued: usize,
}

impl CoordinatorState {
	/// Returns true when nothing is executing, armed, or queued.
	pub fn is_idle(&self) -> bool {
		self.phase == SavePhase::Idle && !self.is_pending
	}
}

/// Worker-side end of the state channels.
pub(crate) struct StatePublisher {
	latest: watch::Sender<CoordinatorState>,
	events: broadcast::Sender<CoordinatorState>,
}

impl StatePublisher {
	/// Creates the publisher plus the receivers kept by the handle.
	pub fn new(buffer: usize) -> (Self, watch::Receiver<CoordinatorState>, broadcast::Receiver<CoordinatorState>) {
		let (latest, latest_rx) = watch::channel(CoordinatorState::default());
		let (events, events_rx) = broadcast::channel(buffer.max(1));
		(Self { latest, events }, latest_rx, events_rx)
	}

	/// Publishes `next` if it differs from the last snapshot. Returns whether it did.
	pub fn publish(&self, next: CoordinatorState) -> bool {
		if *self.latest.borrow() == next {
			return false;
		}
		tracing::trace!(
			phase = next.phase.as_str(),
			saving = next.is_saving,
			pending = next.is_pending,
			dirty = next.is_dirty,
			retry = next.retry_count,
			queued = next.queued,
			"autosave.state"
		);
		self.latest.send_replace(next.clone());
		let _ = self.events.send(next);
		true
	}
}

/// Stream of state snapshots, one per transition.
///
/// A subscriber that falls more than the configured buffer behind skips the
/// snapshots it missed and resumes with the oldest one still buffered.
#[derive(Debug)]
pub struct StateStream {
	rx: broadcast::Receiver<CoordinatorState>,
}

impl StateStream {
	pub(crate) fn new(rx: broadcast::Receiver<CoordinatorState>) -> Self {
		Self { rx }
	}

	/// Waits for the next snapshot. Returns `None` once the coordinator has stopped.
	pub async fn next(&mut self) -> Option<CoordinatorState> {
		loop {
			match self.rx.recv().await {
				Ok(state) => return Some(state),
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					tracing::debug!(skipped, "autosave.state.lagged");
				}
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	}

	/// Returns an already-buffered snapshot without waiting.
	pub fn try_next(&mut self) -> Option<CoordinatorState> {
		loop {
			match self.rx.try_recv() {
				Ok(state) => return Some(state),
				Err(broadcast::error::TryRecvError::Lagged(_)) => {}
				Err(_) => return None,
			}
		}
	}
}
