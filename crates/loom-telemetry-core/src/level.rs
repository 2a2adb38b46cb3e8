// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Severity levels and the threshold filter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Log severity, ordered `Debug < Info < Warn < Error < Panic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
	Debug,
	Info,
	Warn,
	Error,
	Panic,
}

impl Level {
	/// All levels in ascending severity.
	pub const ALL: [Level; 5] = [
		Level::Debug,
		Level::Info,
		Level::Warn,
		Level::Error,
		Level::Panic,
	];

	/// Severity weight used for threshold comparisons.
	pub fn weight(self) -> u8 {
		match self {
			Level::Debug => 1,
			Level::Info => 2,
			Level::Warn => 3,
			Level::Error => 4,
			Level::Panic => 5,
		}
	}

	/// Lowercase name, as carried in remote payloads.
	pub fn as_str(self) -> &'static str {
		match self {
			Level::Debug => "debug",
			Level::Info => "info",
			Level::Warn => "warn",
			Level::Error => "error",
			Level::Panic => "panic",
		}
	}

	/// Uppercase label, as printed on the console.
	pub fn label(self) -> &'static str {
		match self {
			Level::Debug => "DEBUG",
			Level::Info => "INFO",
			Level::Warn => "WARN",
			Level::Error => "ERROR",
			Level::Panic => "PANIC",
		}
	}

	/// Whether records at this level may carry a structured error.
	pub fn carries_error(self) -> bool {
		self.weight() >= Level::Warn.weight()
	}
}

/// Returns true when a record at `level` passes a `minimum` threshold.
pub fn should_emit(level: Level, minimum: Level) -> bool {
	level.weight() >= minimum.weight()
}

impl fmt::Display for Level {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

impl FromStr for Level {
	type Err = ProtocolError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"debug" | "trace" => Ok(Level::Debug),
			"info" => Ok(Level::Info),
			"warn" | "warning" => Ok(Level::Warn),
			"error" => Ok(Level::Error),
			"panic" | "fatal" => Ok(Level::Panic),
			_ => Err(ProtocolError::InvalidLevel(s.to_string())),
		}
	}
}
