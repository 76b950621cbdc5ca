use serde::{Deserialize, Serialize};

use crate::{ItemKey, Record};

/// One wine row of the storefront catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wine {
	#[serde(rename = "id_vino")]
	pub id: ItemKey,
	#[serde(rename = "nombre")]
	pub name: String,
	#[serde(rename = "bodega")]
	pub winery: String,
	#[serde(rename = "variedad")]
	pub variety: String,
	#[serde(rename = "pais")]
	pub country: String,
	pub color: String,
	#[serde(rename = "precio")]
	pub price: f64,
	#[serde(default)]
	pub stock: u32,
	/// Detail row joined from a second table; the feed delivers it as a
	/// one-element array which [`crate::Normalizer`] collapses.
	#[serde(rename = "detalle", default, skip_serializing_if = "Option::is_none")]
	pub detail: Option<WineDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WineDetail {
	#[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(rename = "maridaje", default, skip_serializing_if = "Option::is_none")]
	pub pairing: Option<String>,
	#[serde(rename = "crianza", default, skip_serializing_if = "Option::is_none")]
	pub aging: Option<String>,
	#[serde(rename = "graduacion", default, skip_serializing_if = "Option::is_none")]
	pub abv: Option<f64>,
}

impl Record for Wine {
	const KEY_FIELD: &'static str = "id_vino";
	const COLUMNS: &'static [&'static str] = &["id_vino", "nombre", "bodega", "variedad", "pais", "color", "precio", "stock", "detalle"];

	fn key(&self) -> &ItemKey {
		&self.id
	}
}
