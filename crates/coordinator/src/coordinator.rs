//! Public handle for one coordinated resource.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, SaveError};
use crate::executor::{Command, SaveWorker};
use crate::operation::{SaveOperation, Timestamp};
use crate::report::{Hooks, SaveReporter};
use crate::state::{CoordinatorState, StatePublisher, StateStream};

/// Builder for a [`SaveCoordinator`].
#[must_use]
pub struct CoordinatorBuilder {
	config: CoordinatorConfig,
	hooks: Hooks,
}

impl CoordinatorBuilder {
	/// Called with the completion timestamp after every confirmed save.
	pub fn on_success(mut self, f: impl Fn(Timestamp) + Send + Sync + 'static) -> Self {
		self.hooks.on_success = Some(Arc::new(f));
		self
	}

	/// Called once per permanent failure.
	pub fn on_error(mut self, f: impl Fn(&SaveError) + Send + Sync + 'static) -> Self {
		self.hooks.on_error = Some(Arc::new(f));
		self
	}

	/// Replaces the default [`TracingReporter`](crate::TracingReporter).
	pub fn reporter(mut self, reporter: impl SaveReporter) -> Self {
		self.hooks.reporter = Arc::new(reporter);
		self
	}

	/// Spawns the worker task on the current Tokio runtime.
	pub fn spawn(self) -> Result<SaveCoordinator, CoordinatorError> {
		let handle = tokio::runtime::Handle::try_current().map_err(|_| CoordinatorError::NoRuntime)?;
		let (publisher, latest, events) = StatePublisher::new(self.config.state_buffer);
		let (tx, rx) = mpsc::unbounded_channel();
		let worker = SaveWorker::new(self.config, self.hooks, publisher);
		tracing::trace!("autosave.worker.spawn");
		let task = handle.spawn(worker.run(rx));
		Ok(SaveCoordinator {
			tx,
			latest,
			events,
			task: Some(task),
		})
	}
}

/// Debounced, single-flight, retrying save scheduler for one resource.
///
/// Create one per editing session. Dropping the handle clears the queue,
/// revokes in-flight work and stops the worker once any running attempt has
/// returned.
pub struct SaveCoordinator {
	tx: mpsc::UnboundedSender<Command>,
	latest: watch::Receiver<CoordinatorState>,
	events: broadcast::Receiver<CoordinatorState>,
	task: Option<JoinHandle<()>>,
}

impl Drop for SaveCoordinator {
	fn drop(&mut self) {
		let _ = self.tx.send(Command::ClearQueue);
	}
}

impl SaveCoordinator {
	/// Starts building a coordinator with `config`.
	pub fn builder(config: CoordinatorConfig) -> CoordinatorBuilder {
		CoordinatorBuilder {
			config,
			hooks: Hooks::default(),
		}
	}

	/// Spawns a coordinator with default hooks.
	pub fn spawn(config: CoordinatorConfig) -> Result<Self, CoordinatorError> {
		Self::builder(config).spawn()
	}

	/// Debounced save: `op` runs once the configured interval passes without
	/// another `schedule`. A later call replaces `op`.
	pub fn schedule(&self, op: SaveOperation) -> Result<(), CoordinatorError> {
		self.send(Command::Schedule(op))
	}

	/// Bypasses the debounce timer; still honors the single-flight queue and retries.
	pub fn save_now(&self, op: SaveOperation) -> Result<(), CoordinatorError> {
		self.send(Command::SaveNow(op))
	}

	/// Disarms the debounce timer and revokes the in-flight attempt's token.
	///
	/// Best effort: work already committed to its external effect still
	/// happens, only its result is ignored.
	pub fn cancel_pending(&self) -> Result<(), CoordinatorError> {
		self.send(Command::CancelPending)
	}

	/// Drops every queued operation, then behaves like [`Self::cancel_pending`].
	pub fn clear_queue(&self) -> Result<(), CoordinatorError> {
		self.send(Command::ClearQueue)
	}

	/// Latest published snapshot.
	///
	/// Commands are applied asynchronously; use [`Self::snapshot`] to observe
	/// the effect of commands sent just before.
	pub fn state(&self) -> CoordinatorState {
		self.latest.borrow().clone()
	}

	/// Snapshot taken after every previously sent command has been applied.
	pub async fn snapshot(&self) -> Result<CoordinatorState, CoordinatorError> {
		let (reply, rx) = oneshot::channel();
		self.send(Command::Snapshot(reply))?;
		rx.await.map_err(|_| CoordinatorError::Closed)
	}

	/// Receives a snapshot after every transition from now on.
	pub fn subscribe(&self) -> StateStream {
		StateStream::new(self.events.resubscribe())
	}

	/// Returns `true` once the worker task has exited.
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}

	/// Clears the queue, revokes in-flight work and waits for the worker to exit.
	pub async fn shutdown(mut self) {
		let task = self.task.take();
		drop(self);
		let Some(task) = task else {
			return;
		};
		if let Err(err) = task.await
			&& err.is_panic()
		{
			tracing::warn!("autosave.worker.panicked");
		}
	}

	fn send(&self, cmd: Command) -> Result<(), CoordinatorError> {
		self.tx.send(cmd).map_err(|_| CoordinatorError::Closed)
	}
}

#[cfg(test)]
mod tests;
