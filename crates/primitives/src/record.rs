use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::ItemKey;

/// A catalog row identified by one stable key.
///
/// Everything beyond the key is opaque to the reconciliation logic. The
/// serde bounds exist so partial feed payloads can be overlaid onto a full
/// row at the wire boundary.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
	/// Name of the key column in wire payloads.
	const KEY_FIELD: &'static str;
	/// Every column of a complete wire row, the key included.
	const COLUMNS: &'static [&'static str];

	fn key(&self) -> &ItemKey;

	/// Returns true when `row` carries every column in [`Self::COLUMNS`].
	///
	/// Columns with serde defaults still have to be present; a row missing
	/// them is a change set, not a replacement.
	fn is_complete_row(row: &Map<String, Value>) -> bool {
		Self::COLUMNS.iter().all(|column| row.contains_key(*column))
	}
}
