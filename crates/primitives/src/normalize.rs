//! Wire payload normalization.
//!
//! Feed rows arrive in more than one shape: sometimes every column, sometimes
//! only the key plus the changed columns, and joined detail tables come back
//! as one-element arrays. [`Normalizer`] folds all of these into a single
//! [`Payload`] so nothing downstream branches on wire shape.

use std::borrow::Cow;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::{ChangeEvent, ChangeKind, ItemKey, PartialRecord, Payload, Record};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
	#[error("feed payload is not an object")]
	NotAnObject,
	#[error("feed payload has no usable `{0}` key")]
	MissingKey(String),
}

/// Turns raw feed rows into normalized payloads.
#[derive(Debug, Clone)]
pub struct Normalizer {
	key_field: Cow<'static, str>,
	collapse: Vec<String>,
}

impl Normalizer {
	/// Normalizer keyed by the record type's key column.
	pub fn for_record<T: Record>() -> Self {
		Self {
			key_field: Cow::Borrowed(T::KEY_FIELD),
			collapse: Vec::new(),
		}
	}

	/// Collapses `field` from a one-element array into its sole object.
	#[must_use]
	pub fn collapse(mut self, field: impl Into<String>) -> Self {
		self.collapse.push(field.into());
		self
	}

	/// Normalizes one raw row.
	pub fn normalize<T: Record>(&self, raw: Value) -> Result<Payload<T>, NormalizeError> {
		let Value::Object(mut row) = raw else {
			return Err(NormalizeError::NotAnObject);
		};
		let key = row
			.get(self.key_field.as_ref())
			.and_then(ItemKey::from_json)
			.ok_or_else(|| NormalizeError::MissingKey(self.key_field.to_string()))?;

		for field in &self.collapse {
			if let Some(value) = row.get_mut(field) {
				collapse_singleton(value);
			}
		}

		// Only a row carrying every column may replace a mirrored one.
		if T::is_complete_row(&row)
			&& let Ok(item) = serde_json::from_value::<T>(Value::Object(row.clone()))
		{
			return Ok(Payload::Full(item));
		}
		Ok(Payload::Partial(PartialRecord::new(key, row)))
	}

	/// Normalizes one raw row into a change event of the given kind.
	pub fn event<T: Record>(&self, kind: ChangeKind, raw: Value) -> Result<ChangeEvent<T>, NormalizeError> {
		let payload = self.normalize(raw)?;
		Ok(ChangeEvent { kind, payload })
	}
}

fn collapse_singleton(value: &mut Value) {
	let Value::Array(items) = value else {
		return;
	};
	match items.len() {
		0 => *value = Value::Null,
		1 if items[0].is_object() => {
			let inner = items.pop().unwrap_or(Value::Object(Map::new()));
			*value = inner;
		}
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;
	use crate::{Wine, WineDetail};

	fn normalizer() -> Normalizer {
		Normalizer::for_record::<Wine>().collapse("detalle")
	}

	#[test]
	fn full_row_with_nested_detail_array() {
		let payload = normalizer()
			.normalize::<Wine>(json!({
				"id_vino": 7,
				"nombre": "Gran Reserva",
				"bodega": "Muga",
				"variedad": "Tempranillo",
				"pais": "España",
				"color": "tinto",
				"precio": 42.0,
				"stock": 2,
				"detalle": [{ "crianza": "24 meses", "graduacion": 14.0 }]
			}))
			.unwrap();

		let Payload::Full(wine) = payload else {
			panic!("expected a full row");
		};
		assert_eq!(wine.id, ItemKey::from("7"));
		assert_eq!(
			wine.detail,
			Some(WineDetail {
				aging: Some("24 meses".into()),
				abv: Some(14.0),
				..WineDetail::default()
			})
		);
	}

	#[test]
	fn changed_columns_only_become_partial() {
		let payload = normalizer().normalize::<Wine>(json!({ "id_vino": "w1", "stock": 0 })).unwrap();
		let Payload::Partial(partial) = payload else {
			panic!("expected a partial row");
		};
		assert_eq!(partial.key(), &ItemKey::from("w1"));
		assert_eq!(partial.fields().get("stock"), Some(&json!(0)));
	}

	#[test]
	fn empty_detail_array_becomes_absent() {
		let payload = normalizer()
			.normalize::<Wine>(json!({
				"id_vino": "w2",
				"nombre": "Brut",
				"bodega": "Chandon",
				"variedad": "Chardonnay",
				"pais": "Argentina",
				"color": "espumoso",
				"precio": 18.0,
				"stock": 4,
				"detalle": []
			}))
			.unwrap();
		assert!(matches!(payload, Payload::Full(Wine { detail: None, .. })));
	}

	#[test]
	fn rows_missing_defaulted_columns_stay_partial() {
		let payload = normalizer()
			.normalize::<Wine>(json!({
				"id_vino": "w1",
				"nombre": "Reserva",
				"bodega": "Catena",
				"variedad": "Malbec",
				"pais": "Argentina",
				"color": "tinto",
				"precio": 21.0
			}))
			.unwrap();
		let Payload::Partial(partial) = payload else {
			panic!("a row without stock or detail must not replace the mirrored one");
		};
		assert_eq!(partial.fields().len(), 7);
		assert!(!partial.fields().contains_key("detalle"));
	}

	#[test]
	fn rows_without_key_are_rejected() {
		assert_eq!(
			normalizer().normalize::<Wine>(json!({ "nombre": "x" })),
			Err(NormalizeError::MissingKey("id_vino".into()))
		);
		assert_eq!(normalizer().normalize::<Wine>(json!([1, 2])), Err(NormalizeError::NotAnObject));
	}
}
