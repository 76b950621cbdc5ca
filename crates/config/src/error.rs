//! Error types for configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or mapping it onto the schema.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// A value is outside its allowed range.
	#[error("invalid value for {field}: {reason}")]
	Invalid {
		/// Dotted path of the offending key.
		field: &'static str,
		/// What is wrong with it.
		reason: String,
	},

	/// Two URL state slots were configured with the same parameter name.
	#[error("query parameter {0:?} is used by more than one slot")]
	DuplicateParam(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
