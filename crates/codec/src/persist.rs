use serde::Serialize;

/// State that may be written to the address bar.
///
/// Values equal to their default are never encoded, which keeps URLs clean:
/// an empty cart or an untouched filter panel produce no query parameter.
pub trait Persist: Serialize {
	/// Context needed to tell a default value apart, such as the catalog's
	/// price bounds for filters.
	type Defaults: ?Sized;

	fn is_default(&self, defaults: &Self::Defaults) -> bool;
}

impl<T: Serialize> Persist for Vec<T> {
	type Defaults = ();

	fn is_default(&self, _defaults: &()) -> bool {
		self.is_empty()
	}
}

impl Persist for serde_json::Value {
	type Defaults = ();

	fn is_default(&self, _defaults: &()) -> bool {
		match self {
			Self::Null => true,
			Self::Array(items) => items.is_empty(),
			Self::Object(map) => map.is_empty(),
			Self::String(s) => s.is_empty(),
			Self::Bool(_) | Self::Number(_) => false,
		}
	}
}
