use std::marker::PhantomData;

use cellar_codec::{Cart, FilterState, Persist, PriceRange, StateCodec};
use serde::de::DeserializeOwned;

use crate::{ParamNames, UrlStateStore, View, ViewSlot};

/// One encoded query parameter bound to a state type.
///
/// The parameter is read exactly once, by [`PersistedSlot::attach`]. After
/// that the slot only writes, so the consumer's own updates can never loop
/// back into it as fresh input.
#[derive(Debug, Clone)]
pub struct PersistedSlot<V> {
	name: String,
	store: UrlStateStore,
	codec: StateCodec,
	written: String,
	_state: PhantomData<fn() -> V>,
}

impl<V> PersistedSlot<V>
where
	V: Persist + DeserializeOwned,
{
	/// Binds the slot and restores any state found in the address.
	///
	/// Malformed tokens restore nothing.
	pub fn attach(store: UrlStateStore, codec: StateCodec, name: impl Into<String>) -> (Self, Option<V>) {
		let name = name.into();
		let token = store.get_param(&name).unwrap_or_default();
		let restored = codec.decode::<V>(&token);
		tracing::debug!(slot = %name, present = !token.is_empty(), restored = restored.is_some(), "url_state.slot.attach");
		let slot = Self {
			name,
			store,
			codec,
			written: token,
			_state: PhantomData,
		};
		(slot, restored)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Encodes `value` into the parameter, removing it for default state.
	pub fn write(&mut self, value: &V, defaults: &V::Defaults) {
		let token = self.codec.encode(value, defaults);
		if token == self.written {
			return;
		}
		self.store.set_param(&self.name, &token);
		self.written = token;
	}

	pub fn clear(&mut self) {
		if self.written.is_empty() {
			return;
		}
		self.store.set_param(&self.name, "");
		self.written.clear();
	}

	fn forget_written(&mut self) {
		self.written.clear();
	}
}

/// State recovered from the address when the storefront mounts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Restored {
	pub cart: Cart,
	pub filters: FilterState,
	pub view: View,
}

/// The cart, filter and view slots of one storefront session.
#[derive(Debug, Clone)]
pub struct StorefrontSlots {
	pub cart: PersistedSlot<Cart>,
	pub filters: PersistedSlot<FilterState>,
	pub view: ViewSlot,
	names: ParamNames,
	store: UrlStateStore,
}

impl StorefrontSlots {
	pub fn attach(store: UrlStateStore, codec: StateCodec, names: ParamNames) -> (Self, Restored) {
		let (cart, restored_cart) = PersistedSlot::attach(store.clone(), codec.clone(), names.cart.clone());
		let (filters, restored_filters) = PersistedSlot::attach(store.clone(), codec, names.filters.clone());
		let (view, restored_view) = ViewSlot::attach(store.clone(), names.view.clone());
		let restored = Restored {
			cart: restored_cart.unwrap_or_default(),
			filters: restored_filters.unwrap_or_default(),
			view: restored_view,
		};
		(
			Self {
				cart,
				filters,
				view,
				names,
				store,
			},
			restored,
		)
	}

	pub fn write_cart(&mut self, cart: &Cart) {
		self.cart.write(cart, &());
	}

	pub fn write_filters(&mut self, filters: &FilterState, defaults: &PriceRange) {
		self.filters.write(filters, defaults);
	}

	pub fn set_view(&mut self, view: View) {
		self.view.set(view);
	}

	/// Drops cart and filter state from the address, keeping the view.
	pub fn reset(&mut self) {
		self.store.clear_params(&[self.names.cart.as_str(), self.names.filters.as_str()]);
		self.cart.forget_written();
		self.filters.forget_written();
	}
}
