//! Per-attempt revocation handle.

use tokio_util::sync::CancellationToken;

/// Revocable flag threaded through one save attempt.
///
/// Every attempt, retries included, runs under its own token tagged with a
/// cycle number that also appears in logs and [`FailureReport`]s. Revoking
/// never preempts the operation itself. The coordinator checks the token when
/// the attempt completes and discards the result if it was revoked.
/// Operations may also poll [`Self::is_cancelled`] or await
/// [`Self::cancelled`] to stop early on their own.
///
/// [`FailureReport`]: crate::FailureReport
#[derive(Debug, Clone)]
pub struct CancelToken {
	cycle: u64,
	revoked: CancellationToken,
}

impl CancelToken {
	/// Token for the attempt numbered `cycle`.
	pub(crate) fn for_cycle(cycle: u64) -> Self {
		Self {
			cycle,
			revoked: CancellationToken::new(),
		}
	}

	/// Save cycle this token guards. Strictly increasing per coordinator.
	pub const fn cycle(&self) -> u64 {
		self.cycle
	}

	/// Returns true once the attempt has been revoked.
	pub fn is_cancelled(&self) -> bool {
		self.revoked.is_cancelled()
	}

	/// Revokes the attempt. Idempotent.
	pub(crate) fn revoke(&self) {
		self.revoked.cancel();
	}

	/// Resolves when the attempt is revoked.
	pub async fn cancelled(&self) {
		self.revoked.cancelled().await;
	}
}
