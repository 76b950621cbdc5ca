//! In-memory catalog mirror.

use std::collections::HashMap;
use std::sync::Arc;

use cellar_primitives::{ItemKey, Record};
use indexmap::IndexMap;

/// Effect of one mirror mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
	/// A new key was appended.
	Inserted,
	/// An existing row was replaced in place.
	Replaced,
	/// A row was removed.
	Removed,
	/// Nothing changed.
	Unchanged,
}

/// Ordered, key-unique copy of the catalog.
///
/// Besides the rows, the mirror remembers the sequence number of the newest
/// event seen per key. Work started on behalf of an older event (a row
/// re-fetch, a full reload) checks it before writing so a slow answer can
/// never overwrite the effect of a newer event.
#[derive(Debug, Clone)]
pub struct Mirror<T> {
	items: IndexMap<ItemKey, T>,
	latest: HashMap<ItemKey, u64>,
	version: u64,
}

impl<T> Default for Mirror<T> {
	fn default() -> Self {
		Self {
			items: IndexMap::new(),
			latest: HashMap::new(),
			version: 0,
		}
	}
}

impl<T: Record> Mirror<T> {
	/// Creates an empty mirror.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of rows.
	pub fn len(&self) -> usize {
		self.items.len()
	}

	/// Returns true when the mirror holds no rows.
	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Row stored under `key`.
	pub fn get(&self, key: &ItemKey) -> Option<&T> {
		self.items.get(key)
	}

	/// Rows in mirror order.
	pub fn iter(&self) -> impl Iterator<Item = &T> {
		self.items.values()
	}

	/// Counter bumped on every effective mutation.
	pub fn version(&self) -> u64 {
		self.version
	}

	/// Immutable copy of the rows for publication.
	pub fn snapshot(&self) -> Arc<[T]> {
		self.items.values().cloned().collect()
	}

	/// Records that an event with sequence `seq` arrived for `key`.
	pub fn observe(&mut self, key: &ItemKey, seq: u64) {
		self.latest.insert(key.clone(), seq);
	}

	/// Returns true if `seq` is still the newest event seen for `key`.
	pub fn is_latest(&self, key: &ItemKey, seq: u64) -> bool {
		self.latest.get(key) == Some(&seq)
	}

	fn changed_since(&self, key: &ItemKey, since: u64) -> bool {
		self.latest.get(key).is_some_and(|&seq| seq > since)
	}

	/// Appends a new row or fully replaces the row with the same key.
	pub fn upsert(&mut self, item: T) -> Applied {
		let key = item.key().clone();
		self.version = self.version.wrapping_add(1);
		match self.items.insert(key, item) {
			Some(_) => Applied::Replaced,
			None => Applied::Inserted,
		}
	}

	/// Removes the row with `key`; a missing key is a no-op.
	pub fn remove(&mut self, key: &ItemKey) -> Applied {
		match self.items.shift_remove(key) {
			Some(_) => {
				self.version = self.version.wrapping_add(1);
				Applied::Removed
			}
			None => Applied::Unchanged,
		}
	}

	/// Replaces the rows with a full load started when the newest event
	/// sequence was `since`.
	///
	/// Keys touched by an event after `since` keep their live state: an
	/// updated row keeps its newer content, a deleted row stays deleted and a
	/// freshly inserted row survives even if the load did not include it.
	pub fn replace_all(&mut self, rows: Vec<T>, since: u64) {
		let mut next: IndexMap<ItemKey, T> = IndexMap::with_capacity(rows.len());
		for row in rows {
			let key = row.key().clone();
			if !self.changed_since(&key, since) {
				next.insert(key, row);
			} else if let Some(live) = self.items.get(&key) {
				next.insert(key, live.clone());
			}
		}
		for (key, live) in &self.items {
			if self.changed_since(key, since) && !next.contains_key(key) {
				next.insert(key.clone(), live.clone());
			}
		}
		self.items = next;
		self.version = self.version.wrapping_add(1);
	}

	/// Drops every row and every remembered sequence.
	pub fn clear(&mut self) {
		self.items.clear();
		self.latest.clear();
		self.version = self.version.wrapping_add(1);
	}
}

#[cfg(test)]
mod tests {
	use cellar_primitives::Wine;
	use pretty_assertions::assert_eq;

	use super::*;

	fn wine(id: &str, price: f64) -> Wine {
		Wine {
			id: ItemKey::from(id),
			name: format!("Vino {id}"),
			winery: "Bodega".into(),
			variety: "Malbec".into(),
			country: "Argentina".into(),
			color: "tinto".into(),
			price,
			stock: 1,
			detail: None,
		}
	}

	fn ids(mirror: &Mirror<Wine>) -> Vec<&str> {
		mirror.iter().map(|w| w.id.as_str()).collect()
	}

	#[test]
	fn upsert_keeps_one_instance_per_key_in_place() {
		let mut mirror = Mirror::new();
		assert_eq!(mirror.upsert(wine("a", 1.0)), Applied::Inserted);
		assert_eq!(mirror.upsert(wine("b", 2.0)), Applied::Inserted);
		assert_eq!(mirror.upsert(wine("a", 9.0)), Applied::Replaced);

		assert_eq!(ids(&mirror), vec!["a", "b"]);
		assert_eq!(mirror.get(&ItemKey::from("a")).map(|w| w.price), Some(9.0));
	}

	#[test]
	fn remove_is_idempotent_and_order_preserving() {
		let mut mirror = Mirror::new();
		for id in ["a", "b", "c"] {
			mirror.upsert(wine(id, 1.0));
		}
		let version = mirror.version();
		assert_eq!(mirror.remove(&ItemKey::from("b")), Applied::Removed);
		assert_eq!(mirror.remove(&ItemKey::from("b")), Applied::Unchanged);
		assert_eq!(mirror.remove(&ItemKey::from("zz")), Applied::Unchanged);
		assert_eq!(mirror.version(), version + 1);
		assert_eq!(ids(&mirror), vec!["a", "c"]);
	}

	#[test]
	fn reload_respects_events_newer_than_the_load() {
		let mut mirror = Mirror::new();
		mirror.upsert(wine("a", 1.0));
		mirror.upsert(wine("b", 1.0));
		let since = 10;

		// While the load is in flight: b updated, a deleted, c inserted.
		mirror.observe(&ItemKey::from("b"), 11);
		mirror.upsert(wine("b", 5.0));
		mirror.observe(&ItemKey::from("a"), 12);
		mirror.remove(&ItemKey::from("a"));
		mirror.observe(&ItemKey::from("c"), 13);
		mirror.upsert(wine("c", 3.0));

		mirror.replace_all(vec![wine("a", 1.0), wine("b", 1.0), wine("d", 4.0)], since);

		assert_eq!(ids(&mirror), vec!["b", "d", "c"]);
		assert_eq!(mirror.get(&ItemKey::from("b")).map(|w| w.price), Some(5.0));
	}

	#[test]
	fn latest_sequence_tracks_newest_event() {
		let mut mirror = Mirror::<Wine>::new();
		let key = ItemKey::from("a");
		mirror.observe(&key, 1);
		assert!(mirror.is_latest(&key, 1));
		mirror.observe(&key, 2);
		assert!(!mirror.is_latest(&key, 1));
		assert!(mirror.is_latest(&key, 2));
	}
}
