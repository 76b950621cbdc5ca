use std::sync::Arc;

use crate::{Detached, History};

/// Named query parameters of the current address.
///
/// A parameter is either absent or carries a non-empty value; writing an
/// empty value removes it.
#[derive(Clone)]
pub struct UrlStateStore {
	history: Arc<dyn History>,
}

impl std::fmt::Debug for UrlStateStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("UrlStateStore").field("location", &self.history.location()).finish()
	}
}

impl UrlStateStore {
	pub fn new(history: impl History + 'static) -> Self {
		Self { history: Arc::new(history) }
	}

	/// Store for hosts without an address bar; every call is a no-op.
	pub fn detached() -> Self {
		Self::new(Detached)
	}

	pub fn get_param(&self, name: &str) -> Option<String> {
		let url = self.history.location()?;
		url.query_pairs().find(|(k, _)| k == name).map(|(_, v)| v.into_owned()).filter(|v| !v.is_empty())
	}

	/// Sets `name` to `token`, or removes it when `token` is empty.
	pub fn set_param(&self, name: &str, token: &str) {
		self.rewrite(|pairs| {
			if token.is_empty() {
				pairs.retain(|(k, _)| k != name);
				return;
			}
			let mut seen = false;
			pairs.retain_mut(|(k, v)| {
				if k != name {
					return true;
				}
				if seen {
					return false;
				}
				seen = true;
				*v = token.to_owned();
				true
			});
			if !seen {
				pairs.push((name.to_owned(), token.to_owned()));
			}
		});
	}

	pub fn clear_params(&self, names: &[&str]) {
		self.rewrite(|pairs| pairs.retain(|(k, _)| !names.contains(&k.as_str())));
	}

	fn rewrite(&self, edit: impl FnOnce(&mut Vec<(String, String)>)) {
		let Some(mut url) = self.history.location() else {
			tracing::trace!("url_state.detached");
			return;
		};
		let before: Vec<(String, String)> = url.query_pairs().into_owned().collect();
		let mut pairs = before.clone();
		edit(&mut pairs);
		pairs.retain(|(_, v)| !v.is_empty());
		if pairs == before {
			return;
		}

		if pairs.is_empty() {
			url.set_query(None);
		} else {
			url.query_pairs_mut().clear().extend_pairs(pairs.iter());
		}
		tracing::trace!(url = %url, "url_state.replace");
		self.history.replace(url);
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use pretty_assertions::assert_eq;
	use url::Url;

	use super::*;
	use crate::MemoryHistory;

	fn store_at(url: &str) -> (UrlStateStore, Arc<MemoryHistory>) {
		let history = Arc::new(MemoryHistory::new(Url::parse(url).unwrap()));
		(UrlStateStore::new(Arc::clone(&history)), history)
	}

	#[test]
	fn writes_replace_the_current_entry() {
		let (store, history) = store_at("https://shop.test/?view=store");
		store.set_param("cart", "abc");
		store.set_param("filters", "def");
		store.set_param("cart", "xyz");

		assert_eq!(history.len(), 1);
		assert_eq!(history.current().unwrap().as_str(), "https://shop.test/?view=store&cart=xyz&filters=def");
	}

	#[test]
	fn empty_token_removes_the_parameter() {
		let (store, history) = store_at("https://shop.test/?cart=abc&view=cart");
		store.set_param("cart", "");
		assert_eq!(store.get_param("cart"), None);
		assert_eq!(history.current().unwrap().as_str(), "https://shop.test/?view=cart");

		store.set_param("view", "");
		assert_eq!(history.current().unwrap().as_str(), "https://shop.test/");
	}

	#[test]
	fn present_but_empty_reads_as_absent() {
		let (store, _) = store_at("https://shop.test/?cart=&view=admin");
		assert_eq!(store.get_param("cart"), None);
		assert_eq!(store.get_param("view").as_deref(), Some("admin"));
	}

	#[test]
	fn clear_params_removes_only_named() {
		let (store, history) = store_at("https://shop.test/?cart=a&filters=b&view=store&utm=x");
		store.clear_params(&["cart", "filters"]);
		assert_eq!(history.current().unwrap().as_str(), "https://shop.test/?view=store&utm=x");
	}

	#[test]
	fn unchanged_writes_do_not_touch_history() {
		let (store, history) = store_at("https://shop.test/?view=store");
		store.set_param("view", "store");
		store.set_param("cart", "");
		history.navigate(Url::parse("https://shop.test/?view=cart").unwrap());
		store.set_param("view", "cart");
		assert_eq!(history.len(), 2);
	}

	#[test]
	fn detached_store_is_inert() {
		let store = UrlStateStore::detached();
		store.set_param("cart", "abc");
		store.clear_params(&["cart"]);
		assert_eq!(store.get_param("cart"), None);
	}
}
