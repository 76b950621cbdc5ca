//! In-process backend implementing both collaborators.
//!
//! Mutations broadcast to live subscriptions the way a hosted backend's change
//! feed would. Fault switches, counters and per-row latency make failure and
//! reordering scenarios reproducible.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use cellar_primitives::{ChangeEvent, ChangeKind, FeedStatus, ItemKey, NormalizeError, Normalizer, PartialRecord, Record};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::{CatalogSource, ChangeFeed, FeedSink, SourceError};

/// Subscription handle issued by [`MemoryBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemorySubscription(u64);

impl MemorySubscription {
	/// Backend-assigned subscription id.
	pub fn id(self) -> u64 {
		self.0
	}
}

struct State<T> {
	rows: IndexMap<ItemKey, T>,
	subscribers: IndexMap<u64, FeedSink<T>>,
	next_subscription: u64,
	fail_fetches: bool,
	fail_next_fetches: usize,
	fail_row_fetches: bool,
	fail_subscriptions: bool,
	row_latency: HashMap<ItemKey, Duration>,
	fetch_count: usize,
	row_fetch_count: usize,
	subscribe_count: usize,
}

/// Shared in-memory catalog backend.
pub struct MemoryBackend<T> {
	state: Mutex<State<T>>,
}

impl<T> std::fmt::Debug for MemoryBackend<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.lock();
		f.debug_struct("MemoryBackend")
			.field("rows", &state.rows.len())
			.field("subscribers", &state.subscribers.len())
			.finish_non_exhaustive()
	}
}

impl<T: Record> Default for MemoryBackend<T> {
	fn default() -> Self {
		Self::new(Vec::new())
	}
}

impl<T: Record> MemoryBackend<T> {
	/// Creates a backend holding `rows`.
	pub fn new(rows: impl IntoIterator<Item = T>) -> Self {
		Self {
			state: Mutex::new(State {
				rows: rows.into_iter().map(|row| (row.key().clone(), row)).collect(),
				subscribers: IndexMap::new(),
				next_subscription: 0,
				fail_fetches: false,
				fail_next_fetches: 0,
				fail_row_fetches: false,
				fail_subscriptions: false,
				row_latency: HashMap::new(),
				fetch_count: 0,
				row_fetch_count: 0,
				subscribe_count: 0,
			}),
		}
	}

	/// Stored rows, in backend order.
	pub fn rows(&self) -> Vec<T> {
		self.state.lock().rows.values().cloned().collect()
	}

	/// Stores a new row and broadcasts an insert.
	pub fn insert(&self, item: T) {
		self.state.lock().rows.insert(item.key().clone(), item.clone());
		self.emit(ChangeEvent::insert(item));
	}

	/// Replaces a row and broadcasts a full update.
	pub fn update(&self, item: T) {
		self.state.lock().rows.insert(item.key().clone(), item.clone());
		self.emit(ChangeEvent::update(item));
	}

	/// Changes some columns of a row and broadcasts only those columns.
	pub fn update_partial(&self, key: &ItemKey, fields: Map<String, Value>) -> Result<(), SourceError> {
		let partial = PartialRecord::new(key.clone(), fields);
		{
			let mut state = self.state.lock();
			let row = state
				.rows
				.get(key)
				.ok_or_else(|| SourceError::backend(format!("no row with key {key}")))?;
			let merged = partial.merge_into(row)?;
			state.rows.insert(key.clone(), merged);
		}
		self.emit(ChangeEvent::update_partial(partial));
		Ok(())
	}

	/// Removes a row and broadcasts a delete carrying only the key.
	pub fn delete(&self, key: &ItemKey) {
		self.state.lock().rows.shift_remove(key);
		self.emit(ChangeEvent::delete(key.clone()));
	}

	/// Broadcasts an event without touching the stored rows.
	pub fn emit(&self, event: ChangeEvent<T>) {
		let sinks: Vec<FeedSink<T>> = {
			let mut state = self.state.lock();
			state.subscribers.retain(|_, sink| !sink.is_closed());
			state.subscribers.values().cloned().collect()
		};
		for sink in sinks {
			sink.event(event.clone());
		}
	}

	/// Normalizes a raw wire row and broadcasts it.
	pub fn emit_raw(&self, normalizer: &Normalizer, kind: ChangeKind, raw: Value) -> Result<(), NormalizeError> {
		let event = normalizer.event(kind, raw)?;
		self.emit(event);
		Ok(())
	}

	/// Fails every live subscription with `reason` and forgets it.
	pub fn drop_connections(&self, reason: &str) {
		let sinks: Vec<FeedSink<T>> = self.state.lock().subscribers.drain(..).map(|(_, sink)| sink).collect();
		for sink in sinks {
			sink.status(FeedStatus::Error(Some(reason.to_owned())));
		}
	}

	/// Makes every full fetch fail while set.
	pub fn fail_fetches(&self, fail: bool) {
		self.state.lock().fail_fetches = fail;
	}

	/// Makes the next `count` full fetches fail.
	pub fn fail_next_fetches(&self, count: usize) {
		self.state.lock().fail_next_fetches = count;
	}

	/// Makes every row fetch fail while set.
	pub fn fail_row_fetches(&self, fail: bool) {
		self.state.lock().fail_row_fetches = fail;
	}

	/// Makes every subscription handshake fail while set.
	pub fn fail_subscriptions(&self, fail: bool) {
		self.state.lock().fail_subscriptions = fail;
	}

	/// Delays row fetches for `key`; the row is read before the delay.
	pub fn set_row_latency(&self, key: &ItemKey, latency: Duration) {
		self.state.lock().row_latency.insert(key.clone(), latency);
	}

	/// Number of full fetches served or failed.
	pub fn fetch_count(&self) -> usize {
		self.state.lock().fetch_count
	}

	/// Number of row fetches served or failed.
	pub fn row_fetch_count(&self) -> usize {
		self.state.lock().row_fetch_count
	}

	/// Number of subscription handshakes attempted.
	pub fn subscribe_count(&self) -> usize {
		self.state.lock().subscribe_count
	}

	/// Number of subscriptions currently registered.
	pub fn active_subscriptions(&self) -> usize {
		self.state.lock().subscribers.len()
	}
}

#[async_trait]
impl<T: Record> CatalogSource<T> for MemoryBackend<T> {
	async fn get_all(&self) -> Result<Vec<T>, SourceError> {
		let mut state = self.state.lock();
		state.fetch_count += 1;
		if state.fail_next_fetches > 0 {
			state.fail_next_fetches -= 1;
			return Err(SourceError::Transport("connection reset".into()));
		}
		if state.fail_fetches {
			return Err(SourceError::backend("catalog unavailable"));
		}
		Ok(state.rows.values().cloned().collect())
	}

	async fn get_one(&self, key: &ItemKey) -> Result<Option<T>, SourceError> {
		let (result, latency) = {
			let mut state = self.state.lock();
			state.row_fetch_count += 1;
			let result = if state.fail_row_fetches {
				Err(SourceError::backend("row unavailable"))
			} else {
				Ok(state.rows.get(key).cloned())
			};
			(result, state.row_latency.get(key).copied())
		};
		if let Some(latency) = latency {
			tokio::time::sleep(latency).await;
		}
		result
	}
}

impl<T: Record> ChangeFeed<T> for MemoryBackend<T> {
	type Handle = MemorySubscription;

	fn subscribe(&self, sink: FeedSink<T>) -> MemorySubscription {
		let mut state = self.state.lock();
		state.subscribe_count += 1;
		state.next_subscription += 1;
		let id = state.next_subscription;

		sink.status(FeedStatus::Connecting);
		if state.fail_subscriptions {
			sink.status(FeedStatus::Error(Some("channel error".into())));
		} else {
			state.subscribers.insert(id, sink.clone());
			sink.status(FeedStatus::Subscribed);
		}
		MemorySubscription(id)
	}

	fn unsubscribe(&self, handle: MemorySubscription) {
		self.state.lock().subscribers.shift_remove(&handle.0);
	}
}
