use std::str::FromStr;

use strum::{AsRefStr, Display, EnumString};

use crate::UrlStateStore;

/// Top-level storefront screen, persisted as plain text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum View {
	#[default]
	Store,
	Admin,
	Cart,
}

impl View {
	/// Parses a parameter value; unknown text falls back to the store.
	pub fn parse_or_default(raw: Option<&str>) -> Self {
		raw.and_then(|s| View::from_str(s).ok()).unwrap_or_default()
	}
}

/// Plain-text slot for the current [`View`].
#[derive(Debug, Clone)]
pub struct ViewSlot {
	name: String,
	store: UrlStateStore,
	written: Option<View>,
}

impl ViewSlot {
	/// Reads the view once and returns the slot for later writes.
	pub fn attach(store: UrlStateStore, name: impl Into<String>) -> (Self, View) {
		let name = name.into();
		let raw = store.get_param(&name);
		let view = View::parse_or_default(raw.as_deref());
		let written = raw.is_some_and(|r| r == view.as_ref()).then_some(view);
		(Self { name, store, written }, view)
	}

	pub fn set(&mut self, view: View) {
		if self.written == Some(view) {
			return;
		}
		self.store.set_param(&self.name, view.as_ref());
		self.written = Some(view);
	}
}
