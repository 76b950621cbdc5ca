//! Realtime reconciliation engine.
//!
//! The engine is an explicit state machine driven by one task. The task owns
//! the [`Mirror`](crate::Mirror), the subscription handle and the retry timer;
//! everything else (feed callbacks, row re-fetches, reloads, the retry timer)
//! reaches it as a message on one inbox, so the mirror is only ever mutated by
//! the driver itself. Consumers observe [`EngineSnapshot`]s on a watch channel.

mod driver;

use std::sync::Arc;

use cellar_primitives::{ConnectionStatus, Record};
use cellar_worker::{RetryPolicy, TaskClass, spawn};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

pub(crate) use self::driver::Inbox;
use self::driver::Driver;
use crate::{CatalogError, CatalogSource, ChangeFeed};

/// Tuning for a [`RealtimeEngine`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
	/// Subscription retry schedule.
	pub retry: RetryPolicy,
	/// Re-fetch the row by key even when an update carries a full payload.
	///
	/// Partial payloads are always re-fetched.
	pub refetch_full_updates: bool,
}

/// What the engine exposes to consumers.
#[derive(Debug, Clone)]
pub struct EngineSnapshot<T> {
	/// The reconciled catalog, in mirror order.
	pub items: Arc<[T]>,
	/// True only while the initial load is in flight.
	pub loading: bool,
	/// Catalog loads that have failed since the engine started.
	///
	/// A failed load's error is cleared once the subscription comes up, so
	/// observers that may miss intermediate snapshots compare this count.
	pub load_failures: u64,
	/// Last surfaced error, if any.
	pub error: Option<CatalogError>,
	/// Subscription state.
	pub status: ConnectionStatus,
	/// Subscription attempts made in the current failure episode.
	pub attempts: usize,
}

impl<T> EngineSnapshot<T> {
	fn initial() -> Self {
		Self {
			items: Arc::from(Vec::new()),
			loading: true,
			load_failures: 0,
			error: None,
			status: ConnectionStatus::Unsubscribed,
			attempts: 0,
		}
	}

	/// Returns true when the mirror holds no rows.
	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Returns true when realtime is failing: the subscription is in error
	/// or an error is surfaced.
	pub fn has_failed(&self) -> bool {
		self.status == ConnectionStatus::Error || self.error.is_some()
	}

	fn same_as(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.items, &other.items)
			&& self.loading == other.loading
			&& self.load_failures == other.load_failures
			&& self.error == other.error
			&& self.status == other.status
			&& self.attempts == other.attempts
	}
}

/// Handle to a running reconciliation engine.
///
/// Dropping the handle stops the engine.
pub struct RealtimeEngine<T> {
	tx: mpsc::UnboundedSender<Inbox<T>>,
	state: watch::Receiver<EngineSnapshot<T>>,
	cancel: CancellationToken,
	teardown: Arc<dyn Fn() + Send + Sync>,
}

impl<T> std::fmt::Debug for RealtimeEngine<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.borrow();
		f.debug_struct("RealtimeEngine")
			.field("items", &state.items.len())
			.field("status", &state.status)
			.field("stopped", &self.cancel.is_cancelled())
			.finish_non_exhaustive()
	}
}

impl<T: Record> RealtimeEngine<T> {
	/// Starts the engine: initial load, then subscription.
	///
	/// `source` and `feed` are usually the same shared backend client.
	///
	/// # Panics
	///
	/// Panics when called outside a Tokio runtime.
	pub fn start<F>(source: Arc<dyn CatalogSource<T>>, feed: Arc<F>, options: EngineOptions) -> Self
	where
		F: ChangeFeed<T>,
	{
		let (tx, rx) = mpsc::unbounded_channel();
		let (state_tx, state) = watch::channel(EngineSnapshot::initial());
		let cancel = CancellationToken::new();
		let slot: Arc<Mutex<Option<F::Handle>>> = Arc::new(Mutex::new(None));

		let teardown: Arc<dyn Fn() + Send + Sync> = {
			let feed = Arc::clone(&feed);
			let slot = Arc::clone(&slot);
			Arc::new(move || driver::release::<T, F>(feed.as_ref(), &slot))
		};

		let driver = Driver::new(source, feed, slot, options, tx.clone(), state_tx, cancel.clone());
		spawn(TaskClass::Driver, driver.run(rx));

		Self {
			tx,
			state,
			cancel,
			teardown,
		}
	}

	/// Current snapshot.
	pub fn snapshot(&self) -> EngineSnapshot<T> {
		self.state.borrow().clone()
	}

	/// Watches snapshot changes.
	pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot<T>> {
		self.state.clone()
	}

	/// Re-runs the full load without disturbing a healthy subscription.
	///
	/// A subscription that gave up (or was closed by the backend) is
	/// re-established with a fresh retry budget once the load settles.
	pub async fn refetch(&self) -> Result<(), CatalogError> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(Inbox::Refetch { reply })
			.map_err(|_| CatalogError::new("catalog engine stopped"))?;
		rx.await.map_err(|_| CatalogError::new("catalog engine stopped"))?
	}

	/// Returns true once [`RealtimeEngine::stop`] has been called.
	pub fn is_stopped(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Stops the engine.
	///
	/// Cancels the retry timer and in-flight fetches and unsubscribes before
	/// returning. Safe to call repeatedly.
	pub fn stop(&self) {
		if !self.cancel.is_cancelled() {
			tracing::debug!("realtime.stop");
		}
		self.cancel.cancel();
		(self.teardown)();
	}
}

impl<T> Drop for RealtimeEngine<T> {
	fn drop(&mut self) {
		self.cancel.cancel();
		(self.teardown)();
	}
}
