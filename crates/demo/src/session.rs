use std::time::Duration;

use autosave_coordinator::{CoordinatorError, CoordinatorState, SaveCoordinator, SavePhase};
use tracing::warn;

const POLL: Duration = Duration::from_millis(50);

/// Waits until nothing executes and no timer is armed, then drops any queue
/// held back by a permanent failure.
///
/// Returns the settled snapshot and the number of dropped operations.
pub async fn settle(coordinator: &SaveCoordinator) -> Result<(CoordinatorState, usize), CoordinatorError> {
	let mut state = coordinator.snapshot().await?;
	while state.is_saving || state.phase != SavePhase::Idle {
		tokio::time::sleep(POLL).await;
		state = coordinator.snapshot().await?;
	}
	let held = state.queued;
	if held > 0 {
		warn!(held, "demo.queue.held");
		coordinator.clear_queue()?;
	}
	Ok((state, held))
}
