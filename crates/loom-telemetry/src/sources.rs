// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Where telemetry settings come from.
//!
//! Each source yields a partial [`TelemetryConfigLayer`]; the loader merges
//! them in [`Precedence`] order so that an environment variable beats the
//! user's `telemetry.toml`, which beats the compiled-in defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, trace};

use crate::config::TelemetryConfigLayer;
use crate::error::ConfigError;

/// Prefix shared by every telemetry environment variable.
pub const ENV_PREFIX: &str = "LOOM_TELEMETRY_";

/// Merge order of telemetry settings; a higher value wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Something that can contribute a partial telemetry configuration.
pub trait ConfigSource: Send + Sync {
	/// Short label used in load diagnostics.
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<TelemetryConfigLayer, ConfigError>;
}

/// Contributes nothing; `finalize` fills in the logger defaults.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<TelemetryConfigLayer, ConfigError> {
		Ok(TelemetryConfigLayer::default())
	}
}

/// A `telemetry.toml` file. A missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// `$XDG_CONFIG_HOME/loom/telemetry.toml`, if a config directory exists.
	pub fn user() -> Option<Self> {
		dirs::config_dir().map(|dir| Self::new(dir.join("loom").join("telemetry.toml")))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"telemetry-toml"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<TelemetryConfigLayer, ConfigError> {
		let content = match std::fs::read_to_string(&self.path) {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!(path = %self.path.display(), "No telemetry config file");
				return Ok(TelemetryConfigLayer::default());
			}
			Err(source) => {
				return Err(ConfigError::FileRead {
					path: self.path.clone(),
					source,
				})
			}
		};

		let layer = toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
			path: self.path.clone(),
			source,
		})?;
		trace!(path = %self.path.display(), "Parsed telemetry config file");
		Ok(layer)
	}
}

/// `LOOM_TELEMETRY_*` variables. Empty values count as unset.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<TelemetryConfigLayer, ConfigError> {
		Ok(TelemetryConfigLayer {
			level: env_var("LEVEL"),
			console_enabled: env_bool("CONSOLE_ENABLED")?,
			remote_enabled: env_bool("REMOTE_ENABLED")?,
			timestamp_enabled: env_bool("TIMESTAMP_ENABLED")?,
			app_name: env_var("APP_NAME"),
			app_version: env_var("APP_VERSION"),
			environment: env_var("ENV"),
			flush_limit: env_parse("FLUSH_LIMIT")?,
			flush_interval_ms: env_parse("FLUSH_INTERVAL_MS")?,
			endpoint: env_var("ENDPOINT"),
			request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS")?,
		})
	}
}

fn env_key(field: &str) -> String {
	format!("{ENV_PREFIX}{field}")
}

fn env_var(field: &str) -> Option<String> {
	std::env::var(env_key(field)).ok().filter(|s| !s.is_empty())
}

fn env_bool(field: &str) -> Result<Option<bool>, ConfigError> {
	let Some(value) = env_var(field) else {
		return Ok(None);
	};
	match value.to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(Some(true)),
		"0" | "false" | "no" | "off" => Ok(Some(false)),
		_ => Err(ConfigError::InvalidValue {
			key: env_key(field),
			message: format!("expected a boolean, got '{value}'"),
		}),
	}
}

fn env_parse<T: FromStr>(field: &str) -> Result<Option<T>, ConfigError> {
	let Some(value) = env_var(field) else {
		return Ok(None);
	};
	value.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
		key: env_key(field),
		message: format!("expected a non-negative integer, got '{value}'"),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}

	#[test]
	fn test_defaults_source_is_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert_eq!(layer, TelemetryConfigLayer::default());
	}

	#[test]
	fn test_toml_source_missing_file() {
		let source = TomlSource::new("/nonexistent/loom/telemetry.toml");
		let layer = source.load().unwrap();
		assert_eq!(layer, TelemetryConfigLayer::default());
	}

	#[test]
	fn test_toml_source_reads_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
level = "debug"
app_name = "storefront"
flush_limit = 3
"#
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		assert_eq!(layer.level.as_deref(), Some("debug"));
		assert_eq!(layer.app_name.as_deref(), Some("storefront"));
		assert_eq!(layer.flush_limit, Some(3));
	}

	#[test]
	fn test_toml_source_parse_error() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "flush_limit = \"many\"").unwrap();

		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn test_toml_source_directory_is_read_error() {
		let dir = tempfile::tempdir().unwrap();
		let err = TomlSource::new(dir.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::FileRead { .. }));
	}

	#[test]
	fn test_env_helpers_ignore_unset() {
		assert!(env_var("TEST_UNSET_VARIABLE").is_none());
		assert!(env_bool("TEST_UNSET_VARIABLE").unwrap().is_none());
		assert!(env_parse::<u64>("TEST_UNSET_VARIABLE").unwrap().is_none());
	}

	#[test]
	fn test_env_parse_rejects_garbage() {
		std::env::set_var("LOOM_TELEMETRY_TEST_BAD_LIMIT", "ten");
		let err = env_parse::<usize>("TEST_BAD_LIMIT").unwrap_err();
		std::env::remove_var("LOOM_TELEMETRY_TEST_BAD_LIMIT");
		let ConfigError::InvalidValue { key, .. } = err else {
			panic!("expected InvalidValue, got {err:?}");
		};
		assert_eq!(key, "LOOM_TELEMETRY_TEST_BAD_LIMIT");
	}

	#[test]
	fn test_env_bool_values() {
		std::env::set_var("LOOM_TELEMETRY_TEST_BOOL_A", "TRUE");
		std::env::set_var("LOOM_TELEMETRY_TEST_BOOL_B", "1");
		std::env::set_var("LOOM_TELEMETRY_TEST_BOOL_C", "off");
		std::env::set_var("LOOM_TELEMETRY_TEST_BOOL_D", "maybe");
		assert_eq!(env_bool("TEST_BOOL_A").unwrap(), Some(true));
		assert_eq!(env_bool("TEST_BOOL_B").unwrap(), Some(true));
		assert_eq!(env_bool("TEST_BOOL_C").unwrap(), Some(false));
		assert!(matches!(
			env_bool("TEST_BOOL_D"),
			Err(ConfigError::InvalidValue { .. })
		));
		for suffix in ["A", "B", "C", "D"] {
			std::env::remove_var(format!("LOOM_TELEMETRY_TEST_BOOL_{suffix}"));
		}
	}
}
