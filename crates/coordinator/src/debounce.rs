//! Trailing-edge debounce gate.
//!
//! The gate holds no timer itself. Callers pass the current instant in and
//! the executor sleeps until [`DebounceGate::deadline`].

use std::time::Duration;

use tokio::time::Instant;

/// Outcome of [`DebounceGate::schedule`].
#[derive(Debug, PartialEq, Eq)]
pub enum Scheduled<T> {
	/// The timer was (re)armed. `replaced` is true when an earlier pending
	/// item was superseded.
	Armed {
		/// Whether an earlier pending item was dropped.
		replaced: bool,
	},
	/// A zero interval hands the item straight back for immediate execution.
	Immediate(T),
}

/// Coalesces rapid submissions into one trigger after a quiet period.
#[derive(Debug)]
pub struct DebounceGate<T> {
	interval: Duration,
	pending: Option<(T, Instant)>,
}

impl<T> DebounceGate<T> {
	/// Creates a disarmed gate with the given quiet period.
	pub fn new(interval: Duration) -> Self {
		Self { interval, pending: None }
	}

	/// Quiet period required before the pending item fires.
	pub const fn interval(&self) -> Duration {
		self.interval
	}

	/// Records `item` as the latest submission and restarts the timer.
	///
	/// Only the most recent submission survives. With a zero interval any
	/// previously armed item is dropped and `item` is returned immediately.
	pub fn schedule(&mut self, item: T, now: Instant) -> Scheduled<T> {
		if self.interval.is_zero() {
			self.pending = None;
			return Scheduled::Immediate(item);
		}
		let replaced = self.pending.replace((item, now + self.interval)).is_some();
		Scheduled::Armed { replaced }
	}

	/// Instant at which the pending item becomes due, if armed.
	pub fn deadline(&self) -> Option<Instant> {
		self.pending.as_ref().map(|(_, at)| *at)
	}

	/// Returns `true` while a timer is counting down.
	pub fn is_armed(&self) -> bool {
		self.pending.is_some()
	}

	/// Takes the pending item if its deadline has passed.
	pub fn take_due(&mut self, now: Instant) -> Option<T> {
		match &self.pending {
			Some((_, at)) if *at <= now => self.pending.take().map(|(item, _)| item),
			_ => None,
		}
	}

	/// Disarms the timer, dropping the pending item. Returns whether one was armed.
	pub fn cancel(&mut self) -> bool {
		self.pending.take().is_some()
	}
}
