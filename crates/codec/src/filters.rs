use std::collections::BTreeSet;

use cellar_primitives::Wine;
use serde::{Deserialize, Serialize};

use crate::Persist;

/// Inclusive price bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
	pub min: f64,
	pub max: f64,
}

impl PriceRange {
	pub fn new(min: f64, max: f64) -> Self {
		if min <= max { Self { min, max } } else { Self { min: max, max: min } }
	}

	/// Cheapest and most expensive price in the catalog, or `None` when empty.
	pub fn from_catalog<'a>(items: impl IntoIterator<Item = &'a Wine>) -> Option<Self> {
		items.into_iter().fold(None, |range, wine| {
			Some(match range {
				None => Self::new(wine.price, wine.price),
				Some(Self { min, max }) => Self::new(min.min(wine.price), max.max(wine.price)),
			})
		})
	}

	pub fn contains(&self, price: f64) -> bool {
		price >= self.min && price <= self.max
	}
}

/// Filterable catalog dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
	Variety,
	Winery,
	Country,
	Color,
}

impl Facet {
	pub const ALL: [Facet; 4] = [Facet::Variety, Facet::Winery, Facet::Country, Facet::Color];

	fn value_of(self, wine: &Wine) -> &str {
		match self {
			Self::Variety => &wine.variety,
			Self::Winery => &wine.winery,
			Self::Country => &wine.country,
			Self::Color => &wine.color,
		}
	}
}

/// Storefront filter selection.
///
/// An unset `price` means "the catalog's full range"; a custom range equal to
/// the catalog defaults is stored as unset so it never reaches the URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
	#[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
	pub varieties: BTreeSet<String>,
	#[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
	pub wineries: BTreeSet<String>,
	#[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
	pub countries: BTreeSet<String>,
	#[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
	pub colors: BTreeSet<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub price: Option<PriceRange>,
}

impl FilterState {
	pub fn selected(&self, facet: Facet) -> &BTreeSet<String> {
		match facet {
			Facet::Variety => &self.varieties,
			Facet::Winery => &self.wineries,
			Facet::Country => &self.countries,
			Facet::Color => &self.colors,
		}
	}

	fn selected_mut(&mut self, facet: Facet) -> &mut BTreeSet<String> {
		match facet {
			Facet::Variety => &mut self.varieties,
			Facet::Winery => &mut self.wineries,
			Facet::Country => &mut self.countries,
			Facet::Color => &mut self.colors,
		}
	}

	/// Selects `value` if unselected, otherwise deselects it. Returns whether
	/// the value is selected afterwards.
	pub fn toggle(&mut self, facet: Facet, value: impl Into<String>) -> bool {
		let value = value.into();
		let set = self.selected_mut(facet);
		if set.remove(&value) {
			false
		} else {
			set.insert(value);
			true
		}
	}

	pub fn toggle_variety(&mut self, value: impl Into<String>) -> bool {
		self.toggle(Facet::Variety, value)
	}

	pub fn toggle_winery(&mut self, value: impl Into<String>) -> bool {
		self.toggle(Facet::Winery, value)
	}

	pub fn toggle_country(&mut self, value: impl Into<String>) -> bool {
		self.toggle(Facet::Country, value)
	}

	pub fn toggle_color(&mut self, value: impl Into<String>) -> bool {
		self.toggle(Facet::Color, value)
	}

	/// Sets the price bounds; a range equal to `defaults` clears the override.
	pub fn set_price_range(&mut self, range: PriceRange, defaults: &PriceRange) {
		self.price = (range != *defaults).then_some(range);
	}

	/// Price bounds in effect given the catalog defaults.
	pub fn effective_price(&self, defaults: &PriceRange) -> PriceRange {
		self.price.unwrap_or(*defaults)
	}

	pub fn clear(&mut self) {
		*self = Self::default();
	}

	pub fn matches(&self, wine: &Wine, defaults: &PriceRange) -> bool {
		Facet::ALL.iter().all(|&facet| {
			let set = self.selected(facet);
			set.is_empty() || set.contains(facet.value_of(wine))
		}) && self.effective_price(defaults).contains(wine.price)
	}

	/// Items passing every active filter, in catalog order.
	pub fn apply<'a>(&'a self, items: &'a [Wine], defaults: &'a PriceRange) -> impl Iterator<Item = &'a Wine> + 'a {
		items.iter().filter(move |wine| self.matches(wine, defaults))
	}
}

impl Persist for FilterState {
	type Defaults = PriceRange;

	fn is_default(&self, defaults: &PriceRange) -> bool {
		Facet::ALL.iter().all(|&facet| self.selected(facet).is_empty()) && self.price.is_none_or(|p| p == *defaults)
	}
}

/// Distinct values offered per facet, derived from the current catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
	pub varieties: BTreeSet<String>,
	pub wineries: BTreeSet<String>,
	pub countries: BTreeSet<String>,
	pub colors: BTreeSet<String>,
	pub price: Option<PriceRange>,
}

impl FilterOptions {
	pub fn from_catalog(items: &[Wine]) -> Self {
		let mut options = Self {
			price: PriceRange::from_catalog(items),
			..Self::default()
		};
		for wine in items {
			options.varieties.insert(wine.variety.clone());
			options.wineries.insert(wine.winery.clone());
			options.countries.insert(wine.country.clone());
			options.colors.insert(wine.color.clone());
		}
		options
	}
}

#[cfg(test)]
mod tests {
	use cellar_primitives::ItemKey;
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::StateCodec;

	fn wine(id: &str, variety: &str, country: &str, price: f64) -> Wine {
		Wine {
			id: ItemKey::from(id),
			name: format!("Vino {id}"),
			winery: "Bodega".into(),
			variety: variety.into(),
			country: country.into(),
			color: "tinto".into(),
			price,
			stock: 5,
			detail: None,
		}
	}

	fn catalog() -> Vec<Wine> {
		vec![
			wine("w1", "Malbec", "Argentina", 12.0),
			wine("w2", "Tempranillo", "España", 30.0),
			wine("w3", "Malbec", "Francia", 55.0),
		]
	}

	#[test]
	fn default_filters_encode_to_nothing() {
		let defaults = PriceRange::from_catalog(&catalog()).unwrap();
		assert_eq!(StateCodec::default().encode(&FilterState::default(), &defaults), "");
	}

	#[test]
	fn select_then_deselect_is_a_no_op() {
		let codec = StateCodec::default();
		let defaults = PriceRange::new(12.0, 55.0);
		let mut filters = FilterState::default();

		assert!(filters.toggle_variety("Malbec"));
		assert_ne!(codec.encode(&filters, &defaults), "");
		assert!(!filters.toggle_variety("Malbec"));
		assert_eq!(codec.encode(&filters, &defaults), "");
	}

	#[test]
	fn price_equal_to_defaults_is_not_persisted() {
		let defaults = PriceRange::new(12.0, 55.0);
		let mut filters = FilterState::default();

		filters.set_price_range(PriceRange::new(20.0, 55.0), &defaults);
		assert!(!filters.is_default(&defaults));

		filters.set_price_range(defaults, &defaults);
		assert_eq!(filters.price, None);
		assert!(filters.is_default(&defaults));
	}

	#[test]
	fn stale_price_override_matching_new_defaults_counts_as_default() {
		let filters = FilterState {
			price: Some(PriceRange::new(10.0, 20.0)),
			..FilterState::default()
		};
		assert!(filters.is_default(&PriceRange::new(10.0, 20.0)));
		assert!(!filters.is_default(&PriceRange::new(10.0, 25.0)));
	}

	#[test]
	fn filters_round_trip_through_token() {
		let codec = StateCodec::default();
		let defaults = PriceRange::new(12.0, 55.0);
		let mut filters = FilterState::default();
		filters.toggle_variety("Malbec");
		filters.toggle_country("Argentina");
		filters.set_price_range(PriceRange::new(10.0, 40.5), &defaults);

		let token = codec.encode(&filters, &defaults);
		assert_eq!(codec.decode::<FilterState>(&token), Some(filters));
	}

	#[test]
	fn apply_intersects_facets_and_price() {
		let items = catalog();
		let defaults = PriceRange::from_catalog(&items).unwrap();
		let mut filters = FilterState::default();
		filters.toggle_variety("Malbec");

		let ids: Vec<_> = filters.apply(&items, &defaults).map(|w| w.id.as_str()).collect();
		assert_eq!(ids, vec!["w1", "w3"]);

		filters.set_price_range(PriceRange::new(0.0, 20.0), &defaults);
		let ids: Vec<_> = filters.apply(&items, &defaults).map(|w| w.id.as_str()).collect();
		assert_eq!(ids, vec!["w1"]);
	}

	#[test]
	fn options_list_distinct_values() {
		let options = FilterOptions::from_catalog(&catalog());
		assert_eq!(options.varieties.len(), 2);
		assert_eq!(options.countries.len(), 3);
		assert_eq!(options.price, Some(PriceRange::new(12.0, 55.0)));
		assert_eq!(FilterOptions::from_catalog(&[]).price, None);
	}
}
