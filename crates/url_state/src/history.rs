use parking_lot::Mutex;
use url::Url;

/// Access to the host's address bar.
///
/// The trait deliberately has no push operation: state writes may only
/// replace the current entry.
pub trait History: Send + Sync {
	/// Current address, or `None` outside a browser-like environment.
	fn location(&self) -> Option<Url>;

	/// Replaces the current history entry with `url`.
	fn replace(&self, url: Url);
}

/// History of a host without an address bar.
#[derive(Debug, Default, Clone, Copy)]
pub struct Detached;

impl History for Detached {
	fn location(&self) -> Option<Url> {
		None
	}

	fn replace(&self, _url: Url) {}
}

/// In-process history stack.
#[derive(Debug)]
pub struct MemoryHistory {
	entries: Mutex<Vec<Url>>,
}

impl MemoryHistory {
	pub fn new(start: Url) -> Self {
		Self {
			entries: Mutex::new(vec![start]),
		}
	}

	/// Pushes a new entry, as user navigation would.
	pub fn navigate(&self, url: Url) {
		self.entries.lock().push(url);
	}

	pub fn current(&self) -> Option<Url> {
		self.entries.lock().last().cloned()
	}

	/// Number of entries on the stack.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}
}

impl History for MemoryHistory {
	fn location(&self) -> Option<Url> {
		self.current()
	}

	fn replace(&self, url: Url) {
		let mut entries = self.entries.lock();
		match entries.last_mut() {
			Some(last) => *last = url,
			None => entries.push(url),
		}
	}
}

impl<H: History + ?Sized> History for std::sync::Arc<H> {
	fn location(&self) -> Option<Url> {
		(**self).location()
	}

	fn replace(&self, url: Url) {
		(**self).replace(url);
	}
}
