//! Backend collaborator seams.

use async_trait::async_trait;
use cellar_primitives::{ChangeEvent, FeedStatus, ItemKey, Record};
use tokio::sync::mpsc;

use crate::SourceError;
use crate::engine::Inbox;

/// Reads the catalog from the backend.
#[async_trait]
pub trait CatalogSource<T: Record>: Send + Sync + 'static {
	/// Returns every row, in an order that is stable for a given backend state.
	async fn get_all(&self) -> Result<Vec<T>, SourceError>;

	/// Returns one full row, or `None` when the key no longer exists.
	async fn get_one(&self, key: &ItemKey) -> Result<Option<T>, SourceError>;
}

/// Push-based change notifications for catalog rows.
///
/// Implementations deliver per-key events in backend order; nothing is
/// promised across keys.
pub trait ChangeFeed<T: Record>: Send + Sync + 'static {
	/// Resource kept alive for as long as the subscription should run.
	type Handle: Send + 'static;

	/// Opens a subscription delivering events and status changes to `sink`.
	///
	/// Handshake failures are reported as [`FeedStatus::Error`] on the sink.
	fn subscribe(&self, sink: FeedSink<T>) -> Self::Handle;

	/// Closes a subscription previously returned by [`ChangeFeed::subscribe`].
	fn unsubscribe(&self, handle: Self::Handle);
}

/// What a subscription delivers.
#[derive(Debug)]
pub(crate) enum FeedSignal<T> {
	Event(ChangeEvent<T>),
	Status(FeedStatus),
}

/// Delivery end of one subscription.
///
/// Each sink is stamped with the subscription generation it was created
/// for; once the engine replaces or tears down that subscription anything
/// still delivered through the old sink is dropped.
pub struct FeedSink<T> {
	generation: u64,
	tx: mpsc::UnboundedSender<Inbox<T>>,
}

impl<T> Clone for FeedSink<T> {
	fn clone(&self) -> Self {
		Self {
			generation: self.generation,
			tx: self.tx.clone(),
		}
	}
}

impl<T> std::fmt::Debug for FeedSink<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FeedSink")
			.field("generation", &self.generation)
			.field("closed", &self.tx.is_closed())
			.finish()
	}
}

impl<T: Record> FeedSink<T> {
	pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<Inbox<T>>) -> Self {
		Self { generation, tx }
	}

	/// Subscription generation this sink belongs to.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Returns true once the owning engine has stopped.
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}

	/// Delivers one normalized event. Returns false if the engine is gone.
	pub fn event(&self, event: ChangeEvent<T>) -> bool {
		self.send(FeedSignal::Event(event))
	}

	/// Delivers a status change. Returns false if the engine is gone.
	pub fn status(&self, status: FeedStatus) -> bool {
		self.send(FeedSignal::Status(status))
	}

	fn send(&self, signal: FeedSignal<T>) -> bool {
		self.tx
			.send(Inbox::Feed {
				generation: self.generation,
				signal,
			})
			.is_ok()
	}
}
