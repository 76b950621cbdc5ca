//! Configuration for the cellar storefront state and catalog sync.
//!
//! Configuration is written in TOML. Every section and key is optional;
//! omitted values fall back to the defaults shown here:
//!
//! ```toml
//! [codec]
//! key = "vinoteca-estado-url"
//!
//! [url]
//! cart_param = "cart"
//! filters_param = "filters"
//! view_param = "view"
//!
//! [realtime]
//! retry_delay_ms = 5000
//! max_attempts = 3
//! refetch_on_update = false
//!
//! [fallback]
//! # poll_interval_ms = 30000   # absent: one direct fetch per failure episode
//! ```

pub mod error;

use std::path::Path;
use std::time::Duration;

use cellar_codec::{DEFAULT_KEY, StateCodec};
use cellar_realtime::{EngineOptions, FallbackOptions};
use cellar_url_state::ParamNames;
use cellar_worker::RetryPolicy;
pub use error::{ConfigError, Result};
use serde::Deserialize;

/// Parsed configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CellarConfig {
	/// State codec settings.
	pub codec: CodecSection,
	/// Query parameter names.
	pub url: UrlSection,
	/// Realtime engine settings.
	pub realtime: RealtimeSection,
	/// Fallback controller settings.
	pub fallback: FallbackSection,
}

/// `[codec]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecSection {
	/// Repeating mask key for state tokens.
	pub key: String,
}

impl Default for CodecSection {
	fn default() -> Self {
		Self { key: DEFAULT_KEY.into() }
	}
}

/// `[url]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UrlSection {
	/// Parameter holding the cart token.
	pub cart_param: String,
	/// Parameter holding the filter token.
	pub filters_param: String,
	/// Parameter holding the plain-text view name.
	pub view_param: String,
}

impl Default for UrlSection {
	fn default() -> Self {
		let names = ParamNames::default();
		Self {
			cart_param: names.cart,
			filters_param: names.filters,
			view_param: names.view,
		}
	}
}

/// `[realtime]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RealtimeSection {
	/// Fixed delay between subscription attempts.
	pub retry_delay_ms: u64,
	/// Subscription attempts per failure episode, the first one included.
	pub max_attempts: usize,
	/// Re-fetch rows by key on every update, not only partial ones.
	pub refetch_on_update: bool,
}

impl Default for RealtimeSection {
	fn default() -> Self {
		Self {
			retry_delay_ms: 5_000,
			max_attempts: 3,
			refetch_on_update: false,
		}
	}
}

/// `[fallback]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FallbackSection {
	/// Poll interval while in fallback mode.
	pub poll_interval_ms: Option<u64>,
}

impl CellarConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Loads and validates configuration from a file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
			path: path.to_path_buf(),
			error: e,
		})?;
		let config = Self::from_toml_str(&content)?;
		tracing::debug!(path = %path.display(), "config.loaded");
		Ok(config)
	}

	/// Checks cross-field constraints the schema cannot express.
	pub fn validate(&self) -> Result<()> {
		if self.codec.key.is_empty() {
			return Err(ConfigError::Invalid {
				field: "codec.key",
				reason: "must not be empty".into(),
			});
		}
		if self.realtime.max_attempts == 0 {
			return Err(ConfigError::Invalid {
				field: "realtime.max_attempts",
				reason: "must be at least 1".into(),
			});
		}
		if self.fallback.poll_interval_ms == Some(0) {
			return Err(ConfigError::Invalid {
				field: "fallback.poll_interval_ms",
				reason: "must be positive; omit it to disable polling".into(),
			});
		}

		let params = [&self.url.cart_param, &self.url.filters_param, &self.url.view_param];
		if let Some(empty) = params.iter().position(|p| p.is_empty()) {
			let field = ["url.cart_param", "url.filters_param", "url.view_param"][empty];
			return Err(ConfigError::Invalid {
				field,
				reason: "must not be empty".into(),
			});
		}
		for (i, name) in params.iter().enumerate() {
			if params[i + 1..].contains(name) {
				return Err(ConfigError::DuplicateParam((*name).clone()));
			}
		}
		Ok(())
	}

	/// Subscription retry schedule.
	pub fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy::FixedDelay {
			max_attempts: self.realtime.max_attempts.max(1),
			delay: Duration::from_millis(self.realtime.retry_delay_ms),
		}
	}

	/// Options for the realtime engine.
	pub fn engine_options(&self) -> EngineOptions {
		EngineOptions {
			retry: self.retry_policy(),
			refetch_full_updates: self.realtime.refetch_on_update,
		}
	}

	/// Options for the fallback controller.
	pub fn fallback_options(&self) -> FallbackOptions {
		FallbackOptions {
			poll_interval: self.fallback.poll_interval_ms.filter(|ms| *ms > 0).map(Duration::from_millis),
		}
	}

	/// State codec using the configured key, or the default key if it is empty.
	pub fn state_codec(&self) -> StateCodec {
		if self.codec.key.is_empty() {
			return StateCodec::default();
		}
		StateCodec::new(&self.codec.key)
	}

	/// Query parameter names for the URL state slots.
	pub fn param_names(&self) -> ParamNames {
		ParamNames {
			cart: self.url.cart_param.clone(),
			filters: self.url.filters_param.clone(),
			view: self.url.view_param.clone(),
		}
	}
}

#[cfg(test)]
mod tests;
