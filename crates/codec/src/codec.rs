use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::Persist;

/// Mask key used when no other key is configured.
///
/// This value is public by construction; it only keeps tokens from being
/// trivially readable in a URL bar.
pub const DEFAULT_KEY: &str = "vinoteca-estado-url";

/// Reason a token could not be turned back into state.
#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("token is empty")]
	Empty,
	#[error("token is not base64: {0}")]
	Base64(#[from] base64::DecodeError),
	#[error("unmasked token is not UTF-8: {0}")]
	Utf8(#[from] std::string::FromUtf8Error),
	#[error("unmasked token is not valid state JSON: {0}")]
	Json(#[from] serde_json::Error),
}

/// Symmetric state <-> token codec.
///
/// Tokens use the URL-safe base64 alphabet without padding. Decoding also
/// accepts the standard alphabet and padded input so tokens pasted from
/// older links still load.
#[derive(Debug, Clone)]
pub struct StateCodec {
	key: Arc<[u8]>,
}

impl Default for StateCodec {
	fn default() -> Self {
		Self::new(DEFAULT_KEY)
	}
}

impl StateCodec {
	/// Creates a codec masking with `key`.
	///
	/// # Panics
	///
	/// Panics if `key` is empty.
	pub fn new(key: impl AsRef<str>) -> Self {
		let key = key.as_ref().as_bytes();
		assert!(!key.is_empty(), "codec key must not be empty");
		Self { key: Arc::from(key) }
	}

	/// Encodes `value`, or returns an empty string when there is nothing worth
	/// persisting.
	pub fn encode<V>(&self, value: &V, defaults: &V::Defaults) -> String
	where
		V: Persist + ?Sized,
	{
		if value.is_default(defaults) {
			return String::new();
		}
		match serde_json::to_string(value) {
			Ok(json) => self.encode_json(&json),
			Err(err) => {
				tracing::warn!(error = %err, "codec.encode.serialize_failed");
				String::new()
			}
		}
	}

	/// Masks and encodes an already serialized JSON document.
	pub fn encode_json(&self, json: &str) -> String {
		let mut bytes = json.as_bytes().to_vec();
		self.mask(&mut bytes);
		URL_SAFE_NO_PAD.encode(bytes)
	}

	/// Decodes a token; any malformed input reads as "no state".
	pub fn decode<V: DeserializeOwned>(&self, token: &str) -> Option<V> {
		if token.is_empty() {
			return None;
		}
		match self.try_decode(token) {
			Ok(value) => Some(value),
			Err(err) => {
				tracing::debug!(error = %err, len = token.len(), "codec.decode.rejected");
				None
			}
		}
	}

	/// Decodes a token, reporting why it was rejected.
	pub fn try_decode<V: DeserializeOwned>(&self, token: &str) -> Result<V, DecodeError> {
		let trimmed = token.trim().trim_end_matches('=');
		if trimmed.is_empty() {
			return Err(DecodeError::Empty);
		}
		let url_safe: String = trimmed
			.chars()
			.map(|c| match c {
				'+' => '-',
				'/' => '_',
				c => c,
			})
			.collect();
		let mut bytes = URL_SAFE_NO_PAD.decode(url_safe)?;
		self.mask(&mut bytes);
		let json = String::from_utf8(bytes)?;
		Ok(serde_json::from_str(&json)?)
	}

	/// XORs `bytes` in place against the repeating key; its own inverse.
	fn mask(&self, bytes: &mut [u8]) {
		for (byte, k) in bytes.iter_mut().zip(self.key.iter().cycle()) {
			*byte ^= k;
		}
	}
}
