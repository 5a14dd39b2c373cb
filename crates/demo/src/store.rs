use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use autosave_coordinator::{SaveError, SaveOperation};
use chrono::Utc;
use parking_lot::Mutex;

/// In-memory document store that fails on a fixed cadence.
#[derive(Clone)]
pub struct FlakyStore {
	inner: Arc<StoreInner>,
}

struct StoreInner {
	latency: Duration,
	fail_every: usize,
	writes: AtomicUsize,
	saved: Mutex<Option<String>>,
}

impl FlakyStore {
	pub fn new(latency: Duration, fail_every: usize) -> Self {
		Self {
			inner: Arc::new(StoreInner {
				latency,
				fail_every,
				writes: AtomicUsize::new(0),
				saved: Mutex::new(None),
			}),
		}
	}

	/// Builds an operation persisting `content` as the document body.
	pub fn save_op(&self, revision: usize, content: String) -> SaveOperation {
		let store = self.clone();
		let content: Arc<str> = content.into();
		SaveOperation::new(move |ctx| {
			let store = store.clone();
			let content = Arc::clone(&content);
			async move {
				tokio::time::sleep(store.inner.latency).await;
				let write = store.inner.writes.fetch_add(1, Ordering::SeqCst) + 1;
				if store.inner.fail_every > 0 && write % store.inner.fail_every == 0 {
					return Err(SaveError::msg(format!("store rejected write #{write} (attempt {})", ctx.attempt())));
				}
				*store.inner.saved.lock() = Some(content.to_string());
				Ok(Utc::now())
			}
		})
		.named(format!("rev-{revision}"))
	}

	/// Number of write attempts the store has seen.
	pub fn writes(&self) -> usize {
		self.inner.writes.load(Ordering::SeqCst)
	}

	/// Last content that was stored successfully.
	pub fn saved(&self) -> Option<String> {
		self.inner.saved.lock().clone()
	}
}
