use cellar_primitives::ItemKey;
use serde::{Deserialize, Serialize};

use crate::Persist;

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
	pub id: ItemKey,
	pub quantity: u32,
}

/// Ordered cart contents, persisted as `[{"id": .., "quantity": ..}, ..]`.
///
/// Every stored quantity is at least one. Decoded carts are sanitized: zero
/// lines are dropped and repeated keys are merged into the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CartEntry>", into = "Vec<CartEntry>")]
pub struct Cart {
	entries: Vec<CartEntry>,
}

impl From<Vec<CartEntry>> for Cart {
	fn from(raw: Vec<CartEntry>) -> Self {
		let mut cart = Cart::default();
		for entry in raw {
			if entry.quantity > 0 {
				cart.add(entry.id, entry.quantity);
			}
		}
		cart
	}
}

impl From<Cart> for Vec<CartEntry> {
	fn from(cart: Cart) -> Self {
		cart.entries
	}
}

impl Cart {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `quantity` units of `id`, merging with an existing line.
	pub fn add(&mut self, id: impl Into<ItemKey>, quantity: u32) {
		if quantity == 0 {
			return;
		}
		let id = id.into();
		match self.position(&id) {
			Some(idx) => {
				let entry = &mut self.entries[idx];
				entry.quantity = entry.quantity.saturating_add(quantity);
			}
			None => self.entries.push(CartEntry { id, quantity }),
		}
	}

	/// Sets the quantity of an existing line; zero or less removes it.
	///
	/// Unknown keys are ignored, matching a quantity stepper that can only act
	/// on lines already in the cart.
	pub fn update_quantity(&mut self, id: &ItemKey, quantity: i64) {
		let Some(idx) = self.position(id) else {
			return;
		};
		if quantity <= 0 {
			self.entries.remove(idx);
		} else {
			self.entries[idx].quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
		}
	}

	/// Removes a line; returns whether it was present.
	pub fn remove(&mut self, id: &ItemKey) -> bool {
		match self.position(id) {
			Some(idx) => {
				self.entries.remove(idx);
				true
			}
			None => false,
		}
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	pub fn quantity_of(&self, id: &ItemKey) -> u32 {
		self.position(id).map_or(0, |idx| self.entries[idx].quantity)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &CartEntry> {
		self.entries.iter()
	}

	/// Sum of quantities across all lines.
	pub fn total_units(&self) -> u64 {
		self.entries.iter().map(|e| u64::from(e.quantity)).sum()
	}

	/// Sums `price * quantity` for every line `price_of` can price.
	///
	/// Lines whose record is gone from the catalog contribute nothing.
	pub fn subtotal(&self, mut price_of: impl FnMut(&ItemKey) -> Option<f64>) -> f64 {
		self.entries
			.iter()
			.filter_map(|e| price_of(&e.id).map(|price| price * f64::from(e.quantity)))
			.sum()
	}

	fn position(&self, id: &ItemKey) -> Option<usize> {
		self.entries.iter().position(|e| &e.id == id)
	}
}

impl Persist for Cart {
	type Defaults = ();

	fn is_default(&self, _defaults: &()) -> bool {
		self.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;
	use crate::StateCodec;

	fn key(s: &str) -> ItemKey {
		ItemKey::from(s)
	}

	#[test]
	fn cart_survives_reload_through_token() {
		let codec = StateCodec::default();
		let mut cart = Cart::new();
		cart.add("w1", 2);

		let token = codec.encode(&cart, &());
		let reloaded: Cart = codec.decode(&token).unwrap();
		assert_eq!(reloaded, cart);
		assert_eq!(serde_json::to_value(&reloaded).unwrap(), json!([{ "id": "w1", "quantity": 2 }]));
	}

	#[test]
	fn zero_quantity_removes_the_line() {
		let mut cart = Cart::new();
		cart.add("w1", 2);
		cart.add("w2", 1);

		cart.update_quantity(&key("w1"), 0);
		assert_eq!(cart.quantity_of(&key("w1")), 0);
		assert_eq!(cart.len(), 1);

		cart.update_quantity(&key("w2"), -3);
		assert!(cart.is_empty());
		assert_eq!(StateCodec::default().encode(&cart, &()), "");
	}

	#[test]
	fn add_merges_and_keeps_order() {
		let mut cart = Cart::new();
		cart.add("w1", 1);
		cart.add("w2", 1);
		cart.add("w1", 3);
		cart.add("w3", 0);

		let ids: Vec<_> = cart.iter().map(|e| (e.id.as_str(), e.quantity)).collect();
		assert_eq!(ids, vec![("w1", 4), ("w2", 1)]);
		assert_eq!(cart.total_units(), 5);
	}

	#[test]
	fn update_ignores_unknown_lines() {
		let mut cart = Cart::new();
		cart.update_quantity(&key("ghost"), 5);
		assert!(cart.is_empty());
	}

	#[test]
	fn decoded_carts_are_sanitized() {
		let cart: Cart = serde_json::from_value(json!([
			{ "id": "w1", "quantity": 0 },
			{ "id": "w2", "quantity": 1 },
			{ "id": "w2", "quantity": 2 }
		]))
		.unwrap();
		assert_eq!(cart.len(), 1);
		assert_eq!(cart.quantity_of(&key("w2")), 3);
	}

	#[test]
	fn subtotal_skips_unpriced_lines() {
		let mut cart = Cart::new();
		cart.add("w1", 2);
		cart.add("gone", 1);
		let total = cart.subtotal(|id| (id.as_str() == "w1").then_some(10.5));
		assert_eq!(total, 21.0);
	}
}
