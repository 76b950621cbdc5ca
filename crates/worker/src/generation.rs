use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Monotonic generation counter for one owner's lifecycles.
#[derive(Debug, Default, Clone)]
pub struct GenerationClock {
	next: Arc<AtomicU64>,
}

impl GenerationClock {
	/// Creates a clock whose first generation is 1.
	pub fn new() -> Self {
		Self::default()
	}

	pub fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}
}

/// Generation id paired with a cancellation scope.
///
/// Messages produced under a generation carry its id so the owner can drop
/// anything that arrives after the generation was superseded.
#[derive(Debug, Clone)]
pub struct Generation {
	id: u64,
	cancel: CancellationToken,
}

impl Generation {
	pub fn new(id: u64, cancel: CancellationToken) -> Self {
		Self { id, cancel }
	}

	pub const fn id(&self) -> u64 {
		self.id
	}

	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}
}
