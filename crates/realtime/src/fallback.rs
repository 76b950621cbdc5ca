//! Fallback controller.
//!
//! While realtime is healthy consumers see the engine's mirror. When realtime
//! fails before the mirror holds anything, the controller latches into
//! fallback mode and serves a snapshot fetched directly from the
//! [`CatalogSource`], exactly once per failure episode (or on a fixed poll
//! interval when configured). It switches back as soon as the mirror is
//! populated again with no error.

use std::sync::Arc;
use std::time::Duration;

use cellar_primitives::Record;
use cellar_worker::{Generation, GenerationClock, TaskClass, Timer, spawn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{CatalogError, CatalogSource, ChangeFeed, EngineOptions, EngineSnapshot, RealtimeEngine, SourceError};

/// Where the items of a [`CatalogView`] came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewSource {
	/// The realtime mirror.
	#[default]
	Realtime,
	/// A directly fetched fallback snapshot.
	Fallback,
}

/// The catalog as consumers should render it.
#[derive(Debug, Clone)]
pub struct CatalogView<T> {
	/// Items to render.
	pub items: Arc<[T]>,
	/// Which path produced `items`.
	pub source: ViewSource,
	/// True while the active path is loading.
	pub loading: bool,
	/// Error to surface, already normalized.
	pub error: Option<CatalogError>,
}

impl<T> CatalogView<T> {
	fn realtime(snapshot: &EngineSnapshot<T>) -> Self {
		Self {
			items: Arc::clone(&snapshot.items),
			source: ViewSource::Realtime,
			loading: snapshot.loading,
			error: snapshot.error.clone(),
		}
	}

	fn same_as(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.items, &other.items) && self.source == other.source && self.loading == other.loading && self.error == other.error
	}
}

/// Tuning for a [`CatalogService`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FallbackOptions {
	/// Re-run the direct fetch at this interval while latched.
	///
	/// `None` fetches once per failure episode.
	pub poll_interval: Option<Duration>,
}

/// Transition requested by [`FallbackLatch::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchAction {
	/// Start the direct fetch for a new failure episode.
	Fetch,
	/// Leave fallback mode and discard the fetched copy.
	Exit,
}

/// The latch deciding when fallback mode is entered and left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FallbackLatch {
	latched: bool,
}

impl FallbackLatch {
	/// Creates an unlatched latch.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns true while fallback mode is on.
	pub fn is_latched(&self) -> bool {
		self.latched
	}

	/// Feeds one realtime observation into the latch.
	pub fn observe(&mut self, realtime_failed: bool, mirror_empty: bool) -> Option<LatchAction> {
		if !self.latched {
			if realtime_failed && mirror_empty {
				self.latched = true;
				return Some(LatchAction::Fetch);
			}
			return None;
		}
		if !realtime_failed && !mirror_empty {
			self.latched = false;
			return Some(LatchAction::Exit);
		}
		None
	}

	/// Latches on behalf of a caller that runs the direct fetch itself.
	///
	/// Returns true if the latch was off.
	pub fn latch(&mut self) -> bool {
		let entered = !self.latched;
		self.latched = true;
		entered
	}
}

enum Command<T> {
	Fetched {
		episode: u64,
		result: Result<Vec<T>, SourceError>,
		reply: Option<oneshot::Sender<Result<(), CatalogError>>>,
	},
	Poll {
		episode: u64,
	},
	Latch {
		reply: oneshot::Sender<Result<(), CatalogError>>,
	},
}

/// Catalog access for consumers, switching between realtime and fallback.
///
/// Dropping the service stops it and its engine.
pub struct CatalogService<T> {
	engine: RealtimeEngine<T>,
	tx: mpsc::UnboundedSender<Command<T>>,
	view: watch::Receiver<CatalogView<T>>,
	cancel: CancellationToken,
}

impl<T> std::fmt::Debug for CatalogService<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let view = self.view.borrow();
		f.debug_struct("CatalogService")
			.field("engine", &self.engine)
			.field("source", &view.source)
			.field("items", &view.items.len())
			.finish_non_exhaustive()
	}
}

impl<T: Record> CatalogService<T> {
	/// Starts a realtime engine over `source` and `feed` and serves it.
	///
	/// # Panics
	///
	/// Panics when called outside a Tokio runtime.
	pub fn start<F>(source: Arc<dyn CatalogSource<T>>, feed: Arc<F>, engine: EngineOptions, fallback: FallbackOptions) -> Self
	where
		F: ChangeFeed<T>,
	{
		let engine = RealtimeEngine::start(Arc::clone(&source), feed, engine);
		Self::with_engine(engine, source, fallback)
	}

	/// Serves an already started engine, falling back to `source`.
	///
	/// # Panics
	///
	/// Panics when called outside a Tokio runtime.
	pub fn with_engine(engine: RealtimeEngine<T>, source: Arc<dyn CatalogSource<T>>, options: FallbackOptions) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		let engine_rx = engine.subscribe();
		let (view_tx, view) = watch::channel(CatalogView::realtime(&engine_rx.borrow()));
		let cancel = CancellationToken::new();

		let controller = Controller {
			source,
			options,
			tx: tx.clone(),
			view: view_tx,
			cancel: cancel.clone(),
			latch: FallbackLatch::new(),
			clock: GenerationClock::new(),
			episode: None,
			poll: Timer::new(cancel.clone()),
			items: Arc::from(Vec::new()),
			loading: false,
			error: None,
			seen_load_failures: 0,
			snapshot: engine_rx.borrow().clone(),
		};
		spawn(TaskClass::Driver, controller.run(engine_rx, rx));

		Self { engine, tx, view, cancel }
	}

	/// Current view.
	pub fn view(&self) -> CatalogView<T> {
		self.view.borrow().clone()
	}

	/// Watches view changes.
	pub fn subscribe(&self) -> watch::Receiver<CatalogView<T>> {
		self.view.clone()
	}

	/// The underlying engine.
	pub fn engine(&self) -> &RealtimeEngine<T> {
		&self.engine
	}

	/// Returns true while the fallback snapshot is being served.
	pub fn is_fallback(&self) -> bool {
		self.view.borrow().source == ViewSource::Fallback
	}

	/// Reloads the catalog.
	///
	/// The realtime engine reloads first; only if that fails does the
	/// service latch into fallback mode and fetch directly.
	pub async fn refetch(&self) -> Result<(), CatalogError> {
		let Err(err) = self.engine.refetch().await else {
			return Ok(());
		};
		warn!(error = %err, "catalog.refetch.realtime_failed");
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(Command::Latch { reply })
			.map_err(|_| CatalogError::new("catalog service stopped"))?;
		rx.await.map_err(|_| CatalogError::new("fallback fetch superseded"))?
	}

	/// Stops the service and its engine. Safe to call repeatedly.
	pub fn stop(&self) {
		self.cancel.cancel();
		self.engine.stop();
	}
}

impl<T> Drop for CatalogService<T> {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

struct Controller<T> {
	source: Arc<dyn CatalogSource<T>>,
	options: FallbackOptions,
	tx: mpsc::UnboundedSender<Command<T>>,
	view: watch::Sender<CatalogView<T>>,
	cancel: CancellationToken,
	latch: FallbackLatch,
	clock: GenerationClock,
	/// Current failure episode; cancelling it abandons its fetch and poll.
	episode: Option<Generation>,
	poll: Timer,
	items: Arc<[T]>,
	loading: bool,
	error: Option<CatalogError>,
	/// Engine load failures already fed into the latch.
	seen_load_failures: u64,
	snapshot: EngineSnapshot<T>,
}

impl<T: Record> Controller<T> {
	async fn run(mut self, mut engine_rx: watch::Receiver<EngineSnapshot<T>>, mut rx: mpsc::UnboundedReceiver<Command<T>>) {
		let cancel = self.cancel.clone();
		self.observe();
		self.publish();

		loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => break,
				changed = engine_rx.changed() => {
					if changed.is_err() {
						break;
					}
					self.snapshot = engine_rx.borrow_and_update().clone();
					self.observe();
				}
				msg = rx.recv() => {
					let Some(msg) = msg else { break };
					self.handle(msg);
				}
			}
			self.publish();
		}

		self.end_episode();
		debug!("catalog.stopped");
	}

	fn observe(&mut self) {
		// A load failure counts even if the watch channel coalesced away the
		// snapshot that still carried its error.
		let load_failed = self.snapshot.load_failures > self.seen_load_failures;
		self.seen_load_failures = self.snapshot.load_failures;
		match self.latch.observe(self.snapshot.has_failed() || load_failed, self.snapshot.is_empty()) {
			Some(LatchAction::Fetch) => {
				self.begin_episode();
				self.fetch(None);
			}
			Some(LatchAction::Exit) => {
				debug!(items = self.snapshot.items.len(), "catalog.fallback.exit");
				self.end_episode();
			}
			None => {}
		}
	}

	fn handle(&mut self, msg: Command<T>) {
		match msg {
			Command::Fetched { episode, result, reply } => {
				let outcome = self.finish_fetch(episode, result);
				if let Some(reply) = reply {
					let _ = reply.send(outcome);
				}
			}
			Command::Poll { episode } => {
				if self.current_episode() == Some(episode) {
					self.fetch(None);
				}
			}
			Command::Latch { reply } => {
				self.latch.latch();
				if self.episode.is_none() {
					self.begin_episode();
				}
				self.fetch(Some(reply));
			}
		}
	}

	fn current_episode(&self) -> Option<u64> {
		self.episode.as_ref().map(Generation::id)
	}

	fn begin_episode(&mut self) {
		let episode = Generation::new(self.clock.next(), self.cancel.child_token());
		warn!(
			episode = episode.id(),
			error = self.snapshot.error.as_ref().map(CatalogError::message),
			"catalog.fallback.enter"
		);
		self.episode = Some(episode);
	}

	fn end_episode(&mut self) {
		if let Some(episode) = self.episode.take() {
			episode.cancel();
		}
		self.poll.cancel();
		self.items = Arc::from(Vec::new());
		self.loading = false;
		self.error = None;
	}

	fn fetch(&mut self, reply: Option<oneshot::Sender<Result<(), CatalogError>>>) {
		let Some(episode) = self.episode.clone() else {
			return;
		};
		self.poll.cancel();
		self.loading = true;
		let source = Arc::clone(&self.source);
		let tx = self.tx.clone();
		debug!(episode = episode.id(), "catalog.fallback.fetch");
		spawn(TaskClass::Fetch, async move {
			tokio::select! {
				biased;
				_ = episode.cancelled() => {}
				result = source.get_all() => {
					let _ = tx.send(Command::Fetched { episode: episode.id(), result, reply });
				}
			}
		});
	}

	fn finish_fetch(&mut self, episode: u64, result: Result<Vec<T>, SourceError>) -> Result<(), CatalogError> {
		let outcome = result.map_err(|err| CatalogError::from(err).context("catalog fetch failed"));
		if self.current_episode() != Some(episode) {
			return outcome.map(|_| ());
		}

		self.loading = false;
		let outcome = match outcome {
			Ok(rows) => {
				debug!(episode, rows = rows.len(), "catalog.fallback.fetched");
				self.items = Arc::from(rows);
				self.error = None;
				Ok(())
			}
			Err(err) => {
				warn!(episode, error = %err, "catalog.fallback.failed");
				self.error = Some(err.clone());
				Err(err)
			}
		};

		if let Some(interval) = self.options.poll_interval {
			let tx = self.tx.clone();
			self.poll.schedule(interval, move || {
				let _ = tx.send(Command::Poll { episode });
			});
		}
		outcome
	}

	fn publish(&mut self) {
		let next = if self.latch.is_latched() {
			CatalogView {
				items: Arc::clone(&self.items),
				source: ViewSource::Fallback,
				loading: self.loading,
				error: self.error.clone().or_else(|| self.snapshot.error.clone()),
			}
		} else {
			CatalogView::realtime(&self.snapshot)
		};
		self.view.send_if_modified(|current| {
			if current.same_as(&next) {
				return false;
			}
			*current = next;
			true
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn latch_fetches_once_per_episode() {
		let mut latch = FallbackLatch::new();
		assert_eq!(latch.observe(false, true), None);
		assert_eq!(latch.observe(true, true), Some(LatchAction::Fetch));
		assert!(latch.is_latched());
		assert_eq!(latch.observe(true, true), None);
		assert_eq!(latch.observe(false, true), None);
		assert_eq!(latch.observe(true, false), None);
	}

	#[test]
	fn latch_exits_when_mirror_recovers() {
		let mut latch = FallbackLatch::new();
		latch.observe(true, true);
		assert_eq!(latch.observe(false, false), Some(LatchAction::Exit));
		assert!(!latch.is_latched());
		assert_eq!(latch.observe(true, true), Some(LatchAction::Fetch));
	}

	#[test]
	fn failure_with_a_populated_mirror_keeps_realtime() {
		let mut latch = FallbackLatch::new();
		assert_eq!(latch.observe(true, false), None);
		assert!(!latch.is_latched());
	}

	#[test]
	fn manual_latch_suppresses_the_automatic_fetch() {
		let mut latch = FallbackLatch::new();
		assert!(latch.latch());
		assert!(!latch.latch());
		assert_eq!(latch.observe(true, true), None);
		assert_eq!(latch.observe(false, false), Some(LatchAction::Exit));
	}
}
