use std::sync::Arc;

use cellar_primitives::{ChangeEvent, ChangeKind, ConnectionStatus, FeedStatus, ItemKey, Payload, Record};
use cellar_worker::{GenerationClock, TaskClass, Timer, spawn};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{EngineOptions, EngineSnapshot};
use crate::source::FeedSignal;
use crate::{CatalogError, CatalogSource, ChangeFeed, FeedSink, Mirror, SourceError};

/// Messages handled by the driver task.
pub(crate) enum Inbox<T> {
	Feed {
		generation: u64,
		signal: FeedSignal<T>,
	},
	Refetched {
		key: ItemKey,
		seq: u64,
		fallback: Payload<T>,
		result: Result<Option<T>, SourceError>,
	},
	Loaded {
		since: u64,
		result: Result<Vec<T>, SourceError>,
		reply: oneshot::Sender<Result<(), CatalogError>>,
	},
	Retry {
		generation: u64,
	},
	Refetch {
		reply: oneshot::Sender<Result<(), CatalogError>>,
	},
}

/// Unsubscribes whatever handle the slot holds. Idempotent.
pub(crate) fn release<T: Record, F: ChangeFeed<T>>(feed: &F, slot: &Mutex<Option<F::Handle>>) {
	let handle = slot.lock().take();
	if let Some(handle) = handle {
		debug!("realtime.unsubscribe");
		feed.unsubscribe(handle);
	}
}

pub(super) struct Driver<T: Record, F: ChangeFeed<T>> {
	source: Arc<dyn CatalogSource<T>>,
	feed: Arc<F>,
	slot: Arc<Mutex<Option<F::Handle>>>,
	options: EngineOptions,
	tx: mpsc::UnboundedSender<Inbox<T>>,
	state: watch::Sender<EngineSnapshot<T>>,
	cancel: CancellationToken,
	clock: GenerationClock,
	/// Generation of the live subscription.
	live: Option<u64>,
	/// Generation whose failure scheduled the pending retry.
	retry_for: Option<u64>,
	retry: Timer,
	mirror: Mirror<T>,
	/// Sequence number of the newest applied feed event.
	seq: u64,
	status: ConnectionStatus,
	attempts: usize,
	loading: bool,
	load_failures: u64,
	feed_error: Option<CatalogError>,
	load_error: Option<CatalogError>,
	items: Arc<[T]>,
	items_version: u64,
}

impl<T: Record, F: ChangeFeed<T>> Driver<T, F> {
	pub(super) fn new(
		source: Arc<dyn CatalogSource<T>>,
		feed: Arc<F>,
		slot: Arc<Mutex<Option<F::Handle>>>,
		options: EngineOptions,
		tx: mpsc::UnboundedSender<Inbox<T>>,
		state: watch::Sender<EngineSnapshot<T>>,
		cancel: CancellationToken,
	) -> Self {
		let mirror = Mirror::new();
		let items_version = mirror.version();
		Self {
			source,
			feed,
			slot,
			options,
			tx,
			state,
			retry: Timer::new(cancel.clone()),
			cancel,
			clock: GenerationClock::new(),
			live: None,
			retry_for: None,
			mirror,
			seq: 0,
			status: ConnectionStatus::Unsubscribed,
			attempts: 0,
			loading: true,
			load_failures: 0,
			feed_error: None,
			load_error: None,
			items: Arc::from(Vec::new()),
			items_version,
		}
	}

	pub(super) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Inbox<T>>) {
		let cancel = self.cancel.clone();
		let source = Arc::clone(&self.source);

		debug!("realtime.load.initial");
		let loaded = tokio::select! {
			biased;
			_ = cancel.cancelled() => None,
			result = source.get_all() => Some(result),
		};
		let Some(result) = loaded else {
			self.shutdown();
			return;
		};
		self.loading = false;
		let _ = self.finish_load(0, result);
		self.connect();
		self.publish();

		loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => break,
				msg = rx.recv() => {
					let Some(msg) = msg else { break };
					self.handle(msg);
					self.publish();
				}
			}
		}
		self.shutdown();
	}

	fn handle(&mut self, msg: Inbox<T>) {
		match msg {
			Inbox::Feed { generation, signal } => {
				if self.live != Some(generation) {
					trace!(generation, "realtime.feed.stale");
					return;
				}
				match signal {
					FeedSignal::Event(event) => self.apply_event(event),
					FeedSignal::Status(status) => self.apply_status(generation, status),
				}
			}
			Inbox::Refetched { key, seq, fallback, result } => self.apply_refetched(key, seq, fallback, result),
			Inbox::Loaded { since, result, reply } => {
				let outcome = self.finish_load(since, result);
				let _ = reply.send(outcome);
				self.resume();
			}
			Inbox::Retry { generation } => {
				if self.retry_for == Some(generation) && self.status == ConnectionStatus::Error {
					debug!(generation, attempt = self.attempts + 1, "realtime.retry");
					self.connect();
				}
			}
			Inbox::Refetch { reply } => self.reload(reply),
		}
	}

	fn connect(&mut self) {
		self.retry.cancel();
		self.retry_for = None;
		self.live = None;
		release::<T, F>(self.feed.as_ref(), &self.slot);

		self.attempts += 1;
		let generation = self.clock.next();
		self.live = Some(generation);
		self.status = ConnectionStatus::Connecting;
		debug!(generation, attempt = self.attempts, "realtime.subscribe");

		let handle = self.feed.subscribe(FeedSink::new(generation, self.tx.clone()));
		let stale = self.slot.lock().replace(handle);
		if let Some(stale) = stale {
			self.feed.unsubscribe(stale);
		}
		// stop() may have raced the handshake; it cancels before it releases.
		if self.cancel.is_cancelled() {
			release::<T, F>(self.feed.as_ref(), &self.slot);
		}
	}

	fn apply_status(&mut self, generation: u64, status: FeedStatus) {
		match status {
			FeedStatus::Connecting => self.status = ConnectionStatus::Connecting,
			FeedStatus::Subscribed => {
				debug!(generation, attempt = self.attempts, "realtime.subscribed");
				self.status = ConnectionStatus::Subscribed;
				self.feed_error = None;
				self.load_error = None;
				self.attempts = 1;
			}
			FeedStatus::Error(reason) => {
				let reason = reason.unwrap_or_else(|| "subscription error".to_owned());
				self.live = None;
				release::<T, F>(self.feed.as_ref(), &self.slot);
				self.status = ConnectionStatus::Error;

				// Retries stay silent; only the error after the last attempt is surfaced.
				match self.options.retry.next_delay(self.attempts) {
					Some(delay) => {
						debug!(
							generation,
							attempt = self.attempts,
							max_attempts = self.options.retry.max_attempts(),
							delay_ms = delay.as_millis() as u64,
							reason = %reason,
							"realtime.retry.scheduled"
						);
						self.retry_for = Some(generation);
						let tx = self.tx.clone();
						self.retry.schedule(delay, move || {
							let _ = tx.send(Inbox::Retry { generation });
						});
					}
					None => {
						warn!(generation, attempts = self.attempts, reason = %reason, "realtime.retry.exhausted");
						self.feed_error = Some(CatalogError::new(format!(
							"realtime updates unavailable after {} attempts: {reason}",
							self.attempts
						)));
					}
				}
			}
			FeedStatus::Closed => {
				debug!(generation, "realtime.closed");
				self.live = None;
				release::<T, F>(self.feed.as_ref(), &self.slot);
				self.status = ConnectionStatus::Closed;
			}
		}
	}

	fn apply_event(&mut self, event: ChangeEvent<T>) {
		self.seq += 1;
		let seq = self.seq;
		let key = event.key().clone();
		self.mirror.observe(&key, seq);
		trace!(key = %key, kind = event.kind.as_str(), seq, "realtime.event");

		match (event.kind, event.payload) {
			(ChangeKind::Delete, _) => {
				self.mirror.remove(&key);
			}
			(ChangeKind::Update, payload @ Payload::Full(_)) if self.options.refetch_full_updates => self.refetch_row(key, seq, payload),
			// An insert for a key already mirrored is an update.
			(ChangeKind::Insert, payload @ Payload::Full(_)) if self.options.refetch_full_updates && self.mirror.get(&key).is_some() => {
				self.refetch_row(key, seq, payload)
			}
			(_, Payload::Full(item)) => {
				self.mirror.upsert(item);
			}
			(_, payload @ Payload::Partial(_)) => self.refetch_row(key, seq, payload),
		}
	}

	fn refetch_row(&self, key: ItemKey, seq: u64, fallback: Payload<T>) {
		let source = Arc::clone(&self.source);
		let tx = self.tx.clone();
		let cancel = self.cancel.child_token();
		spawn(TaskClass::Fetch, async move {
			let lookup = key.clone();
			tokio::select! {
				biased;
				_ = cancel.cancelled() => {}
				result = source.get_one(&lookup) => {
					let _ = tx.send(Inbox::Refetched { key, seq, fallback, result });
				}
			}
		});
	}

	fn apply_refetched(&mut self, key: ItemKey, seq: u64, fallback: Payload<T>, result: Result<Option<T>, SourceError>) {
		if !self.mirror.is_latest(&key, seq) {
			debug!(key = %key, seq, "realtime.refetch.stale");
			return;
		}
		match result {
			Ok(Some(item)) => {
				self.mirror.upsert(item);
			}
			Ok(None) => {
				self.mirror.remove(&key);
			}
			Err(err) => {
				warn!(key = %key, error = %err, "realtime.refetch.failed");
				self.apply_best_effort(&key, fallback);
			}
		}
	}

	/// Applies the payload an event carried when its row could not be re-fetched.
	fn apply_best_effort(&mut self, key: &ItemKey, payload: Payload<T>) {
		let item = match payload {
			Payload::Full(item) => Some(item),
			Payload::Partial(partial) => match self.mirror.get(key) {
				Some(base) => partial.merge_into(base).ok(),
				None => partial.complete(),
			},
		};
		match item {
			Some(item) => {
				self.mirror.upsert(item);
			}
			None => warn!(key = %key, "realtime.partial.unapplied"),
		}
	}

	fn reload(&mut self, reply: oneshot::Sender<Result<(), CatalogError>>) {
		let since = self.seq;
		let source = Arc::clone(&self.source);
		let tx = self.tx.clone();
		let cancel = self.cancel.child_token();
		debug!(since, "realtime.load.refetch");
		spawn(TaskClass::Fetch, async move {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => {}
				result = source.get_all() => {
					let _ = tx.send(Inbox::Loaded { since, result, reply });
				}
			}
		});
	}

	fn finish_load(&mut self, since: u64, result: Result<Vec<T>, SourceError>) -> Result<(), CatalogError> {
		match result {
			Ok(rows) => {
				debug!(rows = rows.len(), since, "realtime.load.done");
				self.mirror.replace_all(rows, since);
				self.load_error = None;
				Ok(())
			}
			Err(err) => {
				let err = CatalogError::from(err).context("catalog load failed");
				warn!(error = %err, "realtime.load.failed");
				self.load_failures += 1;
				self.load_error = Some(err.clone());
				Err(err)
			}
		}
	}

	/// Re-establishes a subscription that is neither live nor waiting on a retry.
	fn resume(&mut self) {
		if self.status.is_active() || self.retry.is_pending() || self.cancel.is_cancelled() {
			return;
		}
		debug!(status = %self.status, "realtime.resume");
		self.attempts = 0;
		self.connect();
	}

	fn publish(&mut self) {
		if self.items_version != self.mirror.version() {
			self.items = self.mirror.snapshot();
			self.items_version = self.mirror.version();
		}
		let next = EngineSnapshot {
			items: Arc::clone(&self.items),
			loading: self.loading,
			load_failures: self.load_failures,
			error: self.feed_error.clone().or_else(|| self.load_error.clone()),
			status: self.status,
			attempts: self.attempts,
		};
		self.state.send_if_modified(|current| {
			if current.same_as(&next) {
				return false;
			}
			*current = next;
			true
		});
	}

	fn shutdown(&mut self) {
		self.retry.cancel();
		self.retry_for = None;
		self.live = None;
		release::<T, F>(self.feed.as_ref(), &self.slot);
		self.mirror.clear();
		self.loading = false;
		self.status = ConnectionStatus::Closed;
		self.publish();
		debug!("realtime.stopped");
	}
}
