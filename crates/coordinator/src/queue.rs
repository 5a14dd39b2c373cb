//! FIFO queue of deferred save operations.

use std::collections::VecDeque;

/// Operations submitted while another save holds the execution slot.
///
/// Only the executor drains it, and only when the slot is free.
#[derive(Debug)]
pub struct PendingQueue<T> {
	items: VecDeque<T>,
}

impl<T> Default for PendingQueue<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> PendingQueue<T> {
	/// Creates an empty queue.
	pub fn new() -> Self {
		Self { items: VecDeque::new() }
	}

	/// Appends one operation at the back.
	pub fn push(&mut self, item: T) {
		self.items.push_back(item);
	}

	/// Removes and returns the earliest operation.
	pub fn pop_front(&mut self) -> Option<T> {
		self.items.pop_front()
	}

	/// Number of queued operations.
	pub fn len(&self) -> usize {
		self.items.len()
	}

	/// Returns `true` when nothing is queued.
	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Drops every queued operation, returning how many were dropped.
	pub fn clear(&mut self) -> usize {
		let dropped = self.items.len();
		self.items.clear();
		dropped
	}
}
