/// Query parameter names used for storefront state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamNames {
	pub cart: String,
	pub filters: String,
	pub view: String,
}

impl Default for ParamNames {
	fn default() -> Self {
		Self {
			cart: "cart".into(),
			filters: "filters".into(),
			view: "view".into(),
		}
	}
}
