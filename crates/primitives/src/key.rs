use std::borrow::Borrow;
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Stable unique key of a catalog record.
///
/// Backends hand out keys either as strings or as integers; both deserialize
/// into the same textual key so `7` and `"7"` name the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey(String);

impl ItemKey {
	pub fn new(key: impl Into<String>) -> Self {
		Self(key.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Reads a key out of a raw JSON scalar.
	pub fn from_json(value: &serde_json::Value) -> Option<Self> {
		match value {
			serde_json::Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
			serde_json::Value::Number(n) => Some(Self(n.to_string())),
			_ => None,
		}
	}
}

impl fmt::Display for ItemKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ItemKey {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}

impl From<String> for ItemKey {
	fn from(value: String) -> Self {
		Self(value)
	}
}

impl Borrow<str> for ItemKey {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl AsRef<str> for ItemKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl Serialize for ItemKey {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.0)
	}
}

impl<'de> Deserialize<'de> for ItemKey {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		struct KeyVisitor;

		impl Visitor<'_> for KeyVisitor {
			type Value = ItemKey;

			fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str("a string or integer record key")
			}

			fn visit_str<E: de::Error>(self, v: &str) -> Result<ItemKey, E> {
				if v.is_empty() {
					return Err(E::invalid_value(de::Unexpected::Str(v), &self));
				}
				Ok(ItemKey(v.to_owned()))
			}

			fn visit_string<E: de::Error>(self, v: String) -> Result<ItemKey, E> {
				if v.is_empty() {
					return Err(E::invalid_value(de::Unexpected::Str(&v), &self));
				}
				Ok(ItemKey(v))
			}

			fn visit_u64<E: de::Error>(self, v: u64) -> Result<ItemKey, E> {
				Ok(ItemKey(v.to_string()))
			}

			fn visit_i64<E: de::Error>(self, v: i64) -> Result<ItemKey, E> {
				Ok(ItemKey(v.to_string()))
			}
		}

		deserializer.deserialize_any(KeyVisitor)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn integer_and_string_keys_agree() {
		let from_int: ItemKey = serde_json::from_value(json!(42)).unwrap();
		let from_str: ItemKey = serde_json::from_value(json!("42")).unwrap();
		assert_eq!(from_int, from_str);
		assert_eq!(ItemKey::from_json(&json!(42)), Some(from_int));
	}

	#[test]
	fn empty_key_is_rejected() {
		assert!(serde_json::from_value::<ItemKey>(json!("")).is_err());
		assert_eq!(ItemKey::from_json(&json!("")), None);
		assert_eq!(ItemKey::from_json(&json!(null)), None);
	}
}
