//! Error types for catalog collaborators and the normalized error surfaced to consumers.

use cellar_primitives::NormalizeError;
use serde_json::Value;
use thiserror::Error;

/// Failure reported by a [`crate::CatalogSource`] or produced at the feed boundary.
#[derive(Debug, Error)]
pub enum SourceError {
	/// The backend answered with an error message.
	#[error("backend error: {message}")]
	Backend {
		/// Message reported by the backend.
		message: String,
	},

	/// The request never reached the backend or its answer never arrived.
	#[error("transport error: {0}")]
	Transport(String),

	/// A row could not be decoded.
	#[error("malformed row: {0}")]
	Decode(#[from] serde_json::Error),

	/// A feed payload could not be normalized.
	#[error(transparent)]
	Normalize(#[from] NormalizeError),

	/// The backend rejected the call with an arbitrary error document.
	#[error("backend rejected the request: {}", describe(.0))]
	Rejected(Value),
}

impl SourceError {
	/// Convenience constructor for [`SourceError::Backend`].
	pub fn backend(message: impl Into<String>) -> Self {
		Self::Backend { message: message.into() }
	}
}

/// The single error shape stored in engine and controller state.
///
/// Whatever the collaborator produced (a typed error, a bare string, an
/// error document), consumers only ever see a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CatalogError {
	message: String,
}

impl CatalogError {
	/// Creates an error from a message; blank messages read "unknown error".
	pub fn new(message: impl Into<String>) -> Self {
		let message = message.into();
		let message = if message.trim().is_empty() { "unknown error".to_owned() } else { message };
		Self { message }
	}

	/// Normalizes any native error, keeping its source chain in the message.
	pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
		let mut message = err.to_string();
		let mut source = err.source();
		while let Some(cause) = source {
			let cause_text = cause.to_string();
			if !message.contains(&cause_text) {
				message.push_str(": ");
				message.push_str(&cause_text);
			}
			source = cause.source();
		}
		Self::new(message)
	}

	/// Prefixes the message with what was being attempted.
	#[must_use]
	pub fn context(self, what: &str) -> Self {
		Self {
			message: format!("{what}: {}", self.message),
		}
	}

	/// The human-readable message.
	pub fn message(&self) -> &str {
		&self.message
	}
}

impl From<SourceError> for CatalogError {
	fn from(err: SourceError) -> Self {
		Self::from(&err)
	}
}

impl From<&SourceError> for CatalogError {
	fn from(err: &SourceError) -> Self {
		match err {
			SourceError::Rejected(doc) => Self::new(describe(doc)),
			SourceError::Backend { message } => Self::new(message.clone()),
			other => Self::from_error(other),
		}
	}
}

impl From<String> for CatalogError {
	fn from(message: String) -> Self {
		Self::new(message)
	}
}

impl From<&str> for CatalogError {
	fn from(message: &str) -> Self {
		Self::new(message)
	}
}

impl From<Value> for CatalogError {
	fn from(doc: Value) -> Self {
		Self::new(describe(&doc))
	}
}

/// Picks a message out of an arbitrary error document.
fn describe(doc: &Value) -> String {
	const MESSAGE_FIELDS: [&str; 4] = ["message", "error", "msg", "error_description"];

	match doc {
		Value::String(s) => s.clone(),
		Value::Null => String::new(),
		Value::Object(map) => MESSAGE_FIELDS
			.iter()
			.find_map(|field| map.get(*field).and_then(Value::as_str))
			.map(str::to_owned)
			.unwrap_or_else(|| doc.to_string()),
		other => other.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn every_shape_normalizes_to_a_message() {
		assert_eq!(CatalogError::from("network down").message(), "network down");
		assert_eq!(CatalogError::from(json!({ "message": "row locked", "code": 40001 })).message(), "row locked");
		assert_eq!(CatalogError::from(json!({ "error": "jwt expired" })).message(), "jwt expired");
		assert_eq!(CatalogError::from(json!({ "code": 7 })).message(), r#"{"code":7}"#);
		assert_eq!(CatalogError::from(json!(null)).message(), "unknown error");
		assert_eq!(CatalogError::from(String::new()).message(), "unknown error");
	}

	#[test]
	fn source_errors_keep_backend_text() {
		assert_eq!(CatalogError::from(SourceError::backend("permission denied")).message(), "permission denied");
		assert_eq!(
			CatalogError::from(SourceError::Rejected(json!({ "msg": "bad filter" }))).message(),
			"bad filter"
		);
		let decode = serde_json::from_str::<Value>("{").unwrap_err();
		assert!(CatalogError::from(SourceError::from(decode)).message().starts_with("malformed row"));
	}

	#[test]
	fn native_errors_include_their_causes() {
		let io = std::io::Error::other("socket closed");
		let err = CatalogError::from_error(&io);
		assert_eq!(err.message(), "socket closed");
		assert_eq!(err.context("catalog load failed").message(), "catalog load failed: socket closed");
	}
}
