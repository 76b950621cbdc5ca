use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{TaskClass, spawn};

/// Single-slot cancellable delay.
///
/// At most one wake-up is pending at a time: scheduling replaces the previous
/// one, and cancelling the parent token (or dropping the timer) cancels it.
#[derive(Debug)]
pub struct Timer {
	parent: CancellationToken,
	pending: Option<CancellationToken>,
}

impl Timer {
	pub fn new(parent: CancellationToken) -> Self {
		Self { parent, pending: None }
	}

	/// Runs `fire` after `delay` unless cancelled first.
	pub fn schedule<F>(&mut self, delay: Duration, fire: F)
	where
		F: FnOnce() + Send + 'static,
	{
		self.cancel();
		let token = self.parent.child_token();
		self.pending = Some(token.clone());
		tracing::trace!(delay_ms = delay.as_millis() as u64, "worker.timer.schedule");
		spawn(TaskClass::Timer, async move {
			tokio::select! {
				biased;
				_ = token.cancelled() => {}
				_ = tokio::time::sleep(delay) => {
					// Mark the slot spent before firing so `is_pending` reads false from inside `fire`.
					token.cancel();
					fire();
				}
			}
		});
	}

	/// Cancels the pending wake-up, if any. Safe to call repeatedly.
	pub fn cancel(&mut self) {
		if let Some(token) = self.pending.take() {
			token.cancel();
		}
	}

	pub fn is_pending(&self) -> bool {
		self.pending.as_ref().is_some_and(|t| !t.is_cancelled())
	}
}

impl Drop for Timer {
	fn drop(&mut self) {
		self.cancel();
	}
}
