//! Error types for fixture loading.
//!
//! This module defines the error types used throughout the fixture-deps crate.

use thiserror::Error;

/// Errors that can occur while loading fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
	/// The fixture source location was not configured.
	#[error("Configuration error: {0}")]
	Configuration(String),

	/// A load token was not a valid fixture or model name.
	#[error("Invalid fixture token: {0}")]
	InvalidToken(String),

	/// The fixture name is not defined in its model's fixture file.
	#[error("Unknown fixture: {model}__{name}")]
	UnknownFixture {
		/// Model the fixture was looked up under.
		model: String,
		/// Fixture name that is missing.
		name: String,
	},

	/// No metadata is registered for the model.
	#[error("Model not registered: {0}")]
	ModelNotFound(String),

	/// The model's backend has no registered adapter.
	#[error("Unsupported backend for model: {0}")]
	UnsupportedBackend(String),

	/// A record assumed to be already persisted could not be found.
	#[error("Record not found: {model} with key {key}")]
	NotFound {
		/// Model the record was looked up under.
		model: String,
		/// Primary key value used for the lookup.
		key: serde_json::Value,
	},

	/// The backend rejected a save.
	#[error("Persistence error: {0}")]
	Persistence(String),

	/// Fixture file content could not be interpreted.
	#[error("Parse error: {0}")]
	Parse(String),

	/// I/O operation failed.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	/// YAML parsing failed.
	#[error("YAML error: {0}")]
	Yaml(#[from] serde_yaml::Error),

	/// JSON value conversion failed.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Result type alias for fixture loading operations.
pub type FixtureResult<T> = Result<T, FixtureError>;
