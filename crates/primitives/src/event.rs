use serde::ser::Error as _;
use serde_json::{Map, Value};

use crate::{ItemKey, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
	Insert,
	Update,
	Delete,
}

impl ChangeKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Insert => "insert",
			Self::Update => "update",
			Self::Delete => "delete",
		}
	}
}

/// Row carried by a change event, after boundary normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<T> {
	/// Every column of the row is present.
	Full(T),
	/// Only the key and the changed columns are present.
	Partial(PartialRecord),
}

impl<T: Record> Payload<T> {
	pub fn key(&self) -> &ItemKey {
		match self {
			Self::Full(item) => item.key(),
			Self::Partial(partial) => partial.key(),
		}
	}

	pub fn is_partial(&self) -> bool {
		matches!(self, Self::Partial(_))
	}
}

/// Key plus a subset of the row's columns, in wire form.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialRecord {
	key: ItemKey,
	fields: Map<String, Value>,
}

impl PartialRecord {
	pub fn new(key: ItemKey, fields: Map<String, Value>) -> Self {
		Self { key, fields }
	}

	/// A payload carrying nothing but the key, as delete events usually do.
	pub fn key_only(key: ItemKey) -> Self {
		Self { key, fields: Map::new() }
	}

	pub fn key(&self) -> &ItemKey {
		&self.key
	}

	pub fn fields(&self) -> &Map<String, Value> {
		&self.fields
	}

	/// Overlays the carried columns onto `base`, yielding a full row.
	///
	/// The base row's key always wins over a key column in the payload.
	pub fn merge_into<T: Record>(&self, base: &T) -> Result<T, serde_json::Error> {
		let Value::Object(mut row) = serde_json::to_value(base)? else {
			return Err(serde_json::Error::custom("record does not serialize to an object"));
		};
		for (column, value) in &self.fields {
			if column != T::KEY_FIELD {
				row.insert(column.clone(), value.clone());
			}
		}
		serde_json::from_value(Value::Object(row))
	}

	/// Reads the carried columns as a complete row, if every column is there.
	pub fn complete<T: Record>(&self) -> Option<T> {
		if !T::is_complete_row(&self.fields) {
			return None;
		}
		serde_json::from_value(Value::Object(self.fields.clone())).ok()
	}
}

/// One insert/update/delete notification for a catalog row.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent<T> {
	pub kind: ChangeKind,
	pub payload: Payload<T>,
}

impl<T: Record> ChangeEvent<T> {
	pub fn insert(item: T) -> Self {
		Self {
			kind: ChangeKind::Insert,
			payload: Payload::Full(item),
		}
	}

	pub fn update(item: T) -> Self {
		Self {
			kind: ChangeKind::Update,
			payload: Payload::Full(item),
		}
	}

	pub fn update_partial(partial: PartialRecord) -> Self {
		Self {
			kind: ChangeKind::Update,
			payload: Payload::Partial(partial),
		}
	}

	pub fn delete(key: ItemKey) -> Self {
		Self {
			kind: ChangeKind::Delete,
			payload: Payload::Partial(PartialRecord::key_only(key)),
		}
	}

	pub fn key(&self) -> &ItemKey {
		self.payload.key()
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;
	use crate::Wine;

	fn malbec() -> Wine {
		serde_json::from_value(json!({
			"id_vino": "w1",
			"nombre": "Reserva",
			"bodega": "Catena",
			"variedad": "Malbec",
			"pais": "Argentina",
			"color": "tinto",
			"precio": 25.5,
			"stock": 10
		}))
		.unwrap()
	}

	#[test]
	fn merge_overlays_changed_columns_only() {
		let Value::Object(fields) = json!({ "id_vino": "w1", "precio": 19.0, "stock": 3 }) else {
			unreachable!()
		};
		let partial = PartialRecord::new(ItemKey::from("w1"), fields);
		let merged: Wine = partial.merge_into(&malbec()).unwrap();

		let mut expected = malbec();
		expected.price = 19.0;
		expected.stock = 3;
		assert_eq!(merged, expected);
	}

	#[test]
	fn merge_keeps_base_key() {
		let Value::Object(fields) = json!({ "id_vino": "other", "stock": 1 }) else {
			unreachable!()
		};
		let merged: Wine = PartialRecord::new(ItemKey::from("w1"), fields).merge_into(&malbec()).unwrap();
		assert_eq!(merged.id, ItemKey::from("w1"));
	}

	#[test]
	fn key_only_payload_is_not_a_complete_row() {
		let partial = PartialRecord::key_only(ItemKey::from("w1"));
		assert!(partial.complete::<Wine>().is_none());
		assert_eq!(ChangeEvent::<Wine>::delete(ItemKey::from("w1")).key().as_str(), "w1");
	}

	#[test]
	fn defaulted_columns_must_be_present_to_complete() {
		let Value::Object(mut fields) = serde_json::to_value(malbec()).unwrap() else {
			unreachable!()
		};
		fields.remove("stock");
		let partial = PartialRecord::new(ItemKey::from("w1"), fields.clone());
		assert!(partial.complete::<Wine>().is_none());

		fields.insert("stock".into(), json!(10));
		fields.insert("detalle".into(), Value::Null);
		assert_eq!(PartialRecord::new(ItemKey::from("w1"), fields).complete::<Wine>(), Some(malbec()));
	}
}
