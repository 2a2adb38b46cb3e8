// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Telemetry configuration.
//!
//! Configuration is assembled from layered sources (see [`crate::sources`])
//! and resolved once into an immutable [`TelemetryConfig`]. The logger reads
//! it at construction and never again.

use std::time::Duration;

use loom_telemetry_core::Level;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::sources::{ConfigSource, DefaultsSource, EnvSource, TomlSource};

/// Default number of buffered records that triggers a flush.
pub const DEFAULT_FLUSH_LIMIT: usize = 10;
/// Default interval of the periodic flush timer.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5000;
/// Default HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Partially specified configuration from a single source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfigLayer {
	pub level: Option<String>,
	pub console_enabled: Option<bool>,
	pub remote_enabled: Option<bool>,
	pub timestamp_enabled: Option<bool>,
	pub app_name: Option<String>,
	pub app_version: Option<String>,
	pub environment: Option<String>,
	pub flush_limit: Option<usize>,
	pub flush_interval_ms: Option<u64>,
	pub endpoint: Option<String>,
	pub request_timeout_secs: Option<u64>,
}

impl TelemetryConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.console_enabled.is_some() {
			self.console_enabled = other.console_enabled;
		}
		if other.remote_enabled.is_some() {
			self.remote_enabled = other.remote_enabled;
		}
		if other.timestamp_enabled.is_some() {
			self.timestamp_enabled = other.timestamp_enabled;
		}
		if other.app_name.is_some() {
			self.app_name = other.app_name;
		}
		if other.app_version.is_some() {
			self.app_version = other.app_version;
		}
		if other.environment.is_some() {
			self.environment = other.environment;
		}
		if other.flush_limit.is_some() {
			self.flush_limit = other.flush_limit;
		}
		if other.flush_interval_ms.is_some() {
			self.flush_interval_ms = other.flush_interval_ms;
		}
		if other.endpoint.is_some() {
			self.endpoint = other.endpoint;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
	}

	pub fn finalize(self) -> Result<TelemetryConfig, ConfigError> {
		let defaults = TelemetryConfig::default();

		let min_level = match self.level {
			Some(level) => level.parse().map_err(|_| ConfigError::InvalidValue {
				key: "level".to_string(),
				message: format!("unknown log level '{level}'"),
			})?,
			None => defaults.min_level,
		};

		let config = TelemetryConfig {
			min_level,
			console_enabled: self.console_enabled.unwrap_or(defaults.console_enabled),
			remote_enabled: self.remote_enabled.unwrap_or(defaults.remote_enabled),
			timestamp_enabled: self.timestamp_enabled.unwrap_or(defaults.timestamp_enabled),
			app_name: self.app_name.unwrap_or(defaults.app_name),
			app_version: self.app_version.unwrap_or(defaults.app_version),
			environment: self.environment.unwrap_or(defaults.environment),
			flush_limit: self.flush_limit.unwrap_or(defaults.flush_limit),
			flush_interval: self
				.flush_interval_ms
				.map(Duration::from_millis)
				.unwrap_or(defaults.flush_interval),
			endpoint: self.endpoint.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
			request_timeout: self
				.request_timeout_secs
				.map(Duration::from_secs)
				.unwrap_or(defaults.request_timeout),
		};

		config.validate()?;
		Ok(config)
	}
}

/// Fully resolved, immutable telemetry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
	/// Minimum level; calls below it are complete no-ops.
	pub min_level: Level,
	pub console_enabled: bool,
	pub remote_enabled: bool,
	/// Prefix console lines with the record timestamp.
	pub timestamp_enabled: bool,
	pub app_name: String,
	pub app_version: String,
	pub environment: String,
	/// Buffered record count that triggers an immediate flush.
	pub flush_limit: usize,
	/// Interval of the unconditional periodic flush.
	pub flush_interval: Duration,
	/// Collector URL receiving batched payloads.
	pub endpoint: Option<String>,
	pub request_timeout: Duration,
}

impl Default for TelemetryConfig {
	fn default() -> Self {
		Self {
			min_level: Level::Info,
			console_enabled: true,
			remote_enabled: false,
			timestamp_enabled: true,
			app_name: "loom".to_string(),
			app_version: env!("CARGO_PKG_VERSION").to_string(),
			environment: "development".to_string(),
			flush_limit: DEFAULT_FLUSH_LIMIT,
			flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
			endpoint: None,
			request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
		}
	}
}

impl TelemetryConfig {
	/// Validate cross-field configuration rules.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.validate_flush()?;

		if self.remote_enabled {
			match self.endpoint.as_deref() {
				None => {
					return Err(ConfigError::Validation(
						"remote logging is enabled but no endpoint is configured \
						 (set LOOM_TELEMETRY_ENDPOINT or `endpoint`)"
							.to_string(),
					));
				}
				Some(endpoint) if !is_http_url(endpoint) => {
					return Err(ConfigError::InvalidValue {
						key: "endpoint".to_string(),
						message: format!("'{endpoint}' is not an http(s) URL"),
					});
				}
				Some(_) => {}
			}
		}

		Ok(())
	}

	/// Checks the flusher limit and period, ignoring the endpoint.
	pub fn validate_flush(&self) -> Result<(), ConfigError> {
		if self.flush_limit == 0 {
			return Err(ConfigError::Validation(
				"flush_limit must be greater than zero".to_string(),
			));
		}

		if self.flush_interval.is_zero() {
			return Err(ConfigError::Validation(
				"flush_interval_ms must be greater than zero".to_string(),
			));
		}

		Ok(())
	}
}

fn is_http_url(endpoint: &str) -> bool {
	reqwest::Url::parse(endpoint)
		.map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
		.unwrap_or(false)
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`LOOM_TELEMETRY_*`)
/// 2. Config file (`$XDG_CONFIG_HOME/loom/telemetry.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<TelemetryConfig, ConfigError> {
	let mut sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(DefaultsSource), Box::new(EnvSource)];
	if let Some(toml) = TomlSource::user() {
		sources.push(Box::new(toml));
	}
	load_from_sources(sources)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<TelemetryConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only.
pub fn load_config_from_env() -> Result<TelemetryConfig, ConfigError> {
	load_from_sources(vec![Box::new(DefaultsSource), Box::new(EnvSource)])
}

/// Merge `sources` in precedence order and resolve the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<TelemetryConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = TelemetryConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	let config = merged.finalize()?;

	info!(
		min_level = %config.min_level,
		console_enabled = config.console_enabled,
		remote_enabled = config.remote_enabled,
		flush_limit = config.flush_limit,
		flush_interval_ms = config.flush_interval.as_millis() as u64,
		environment = %config.environment,
		"Telemetry configuration loaded"
	);

	Ok(config)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = TelemetryConfig::default();
		assert_eq!(config.min_level, Level::Info);
		assert!(config.console_enabled);
		assert!(!config.remote_enabled);
		assert!(config.timestamp_enabled);
		assert_eq!(config.flush_limit, 10);
		assert_eq!(config.flush_interval, Duration::from_millis(5000));
		assert!(config.endpoint.is_none());
	}

	#[test]
	fn test_layer_finalize_defaults() {
		let config = TelemetryConfigLayer::default().finalize().unwrap();
		assert_eq!(config, TelemetryConfig::default());
	}

	#[test]
	fn test_layer_finalize_with_values() {
		let layer = TelemetryConfigLayer {
			level: Some("warn".to_string()),
			remote_enabled: Some(true),
			endpoint: Some("https://collector.example.com/logs".to_string()),
			flush_limit: Some(25),
			flush_interval_ms: Some(1000),
			..Default::default()
		};
		let config = layer.finalize().unwrap();
		assert_eq!(config.min_level, Level::Warn);
		assert!(config.remote_enabled);
		assert_eq!(config.flush_limit, 25);
		assert_eq!(config.flush_interval, Duration::from_secs(1));
		assert_eq!(
			config.endpoint.as_deref(),
			Some("https://collector.example.com/logs")
		);
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = TelemetryConfigLayer {
			level: Some("debug".to_string()),
			app_name: Some("storefront".to_string()),
			flush_limit: Some(10),
			..Default::default()
		};
		let overlay = TelemetryConfigLayer {
			level: Some("error".to_string()),
			app_name: None,
			flush_limit: Some(50),
			..Default::default()
		};
		base.merge(overlay);
		assert_eq!(base.level.as_deref(), Some("error"));
		assert_eq!(base.app_name.as_deref(), Some("storefront"));
		assert_eq!(base.flush_limit, Some(50));
	}

	#[test]
	fn test_invalid_level_rejected() {
		let layer = TelemetryConfigLayer {
			level: Some("loud".to_string()),
			..Default::default()
		};
		let err = layer.finalize().unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "level"));
	}

	#[test]
	fn test_remote_requires_endpoint() {
		let layer = TelemetryConfigLayer {
			remote_enabled: Some(true),
			..Default::default()
		};
		let err = layer.finalize().unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn test_remote_rejects_non_http_endpoint() {
		let layer = TelemetryConfigLayer {
			remote_enabled: Some(true),
			endpoint: Some("ftp://collector.example.com".to_string()),
			..Default::default()
		};
		assert!(matches!(
			layer.finalize(),
			Err(ConfigError::InvalidValue { .. })
		));
	}

	#[test]
	fn test_zero_flush_limit_rejected() {
		let layer = TelemetryConfigLayer {
			flush_limit: Some(0),
			..Default::default()
		};
		assert!(matches!(layer.finalize(), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_blank_endpoint_treated_as_missing() {
		let layer = TelemetryConfigLayer {
			endpoint: Some("   ".to_string()),
			..Default::default()
		};
		assert!(layer.finalize().unwrap().endpoint.is_none());
	}

	#[test]
	fn test_deserialize_layer_partial() {
		let toml_str = r#"
level = "warn"
remote_enabled = false
flush_interval_ms = 250
"#;
		let layer: TelemetryConfigLayer = toml::from_str(toml_str).unwrap();
		assert_eq!(layer.level.as_deref(), Some("warn"));
		assert_eq!(layer.remote_enabled, Some(false));
		assert_eq!(layer.flush_interval_ms, Some(250));
		assert!(layer.endpoint.is_none());
	}
}
