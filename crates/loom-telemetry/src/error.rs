// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the telemetry pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while delivering log batches.
///
/// None of these ever reach a logging call site; they surface through
/// [`FlusherEvent::Error`](loom_telemetry_core::FlusherEvent::Error) and the
/// pipeline's own tracing diagnostics.
#[derive(Debug, Error)]
pub enum TelemetryError {
	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Collector returned a non-success status.
	#[error("server error ({status}): {message}")]
	ServerError { status: u16, message: String },

	/// Collector endpoint is missing or unusable.
	#[error("invalid collector endpoint: {0}")]
	InvalidEndpoint(String),

	/// Logger or flusher settings are unusable.
	#[error(transparent)]
	InvalidConfig(#[from] ConfigError),

	/// Serialization error.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// The flusher has stopped.
	#[error("telemetry pipeline has been shut down")]
	Shutdown,
}

/// Result type alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error("invalid configuration: {0}")]
	Validation(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_server_error_display() {
		let err = TelemetryError::ServerError {
			status: 503,
			message: "unavailable".to_string(),
		};
		assert_eq!(err.to_string(), "server error (503): unavailable");
	}

	#[test]
	fn test_invalid_value_display() {
		let err = ConfigError::InvalidValue {
			key: "LOOM_TELEMETRY_FLUSH_LIMIT".to_string(),
			message: "invalid usize value 'ten'".to_string(),
		};
		assert!(err.to_string().contains("LOOM_TELEMETRY_FLUSH_LIMIT"));
	}
}
