// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Log record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::level::Level;

/// Maximum depth of an error's cause chain kept in [`ErrorInfo`].
const MAX_CAUSE_DEPTH: usize = 16;

/// Structured error attached to warn/error/panic records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
	pub name: String,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub stack: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub cause: Option<Box<ErrorInfo>>,
}

impl ErrorInfo {
	pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			message: message.into(),
			stack: None,
			cause: None,
		}
	}

	pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
		self.stack = Some(stack.into());
		self
	}

	pub fn with_cause(mut self, cause: ErrorInfo) -> Self {
		self.cause = Some(Box::new(cause));
		self
	}

	/// Builds an `ErrorInfo` from any error, walking its `source()` chain.
	///
	/// The name is taken from the error's `Debug` representation (the leading
	/// type or variant identifier), which is the closest thing to a runtime
	/// type name available through `dyn Error`.
	pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
		Self::from_error_at_depth(error, 0)
	}

	fn from_error_at_depth(error: &(dyn std::error::Error + 'static), depth: usize) -> Self {
		let mut info = ErrorInfo::new(error_name(error), error.to_string());
		if depth < MAX_CAUSE_DEPTH {
			if let Some(source) = error.source() {
				info.cause = Some(Box::new(Self::from_error_at_depth(source, depth + 1)));
			}
		}
		info
	}

	/// Iterates this error and its causes, outermost first.
	pub fn chain(&self) -> impl Iterator<Item = &ErrorInfo> {
		std::iter::successors(Some(self), |e| e.cause.as_deref())
	}
}

fn error_name(error: &dyn std::error::Error) -> String {
	let debug = format!("{error:?}");
	let name: String = debug
		.chars()
		.take_while(|c| c.is_alphanumeric() || *c == '_')
		.collect();
	if name.is_empty() {
		"Error".to_string()
	} else {
		name
	}
}

/// One logging call's payload.
///
/// Created once inside the logger facade and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
	pub level: Level,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub code: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub error: Option<ErrorInfo>,
	pub timestamp: DateTime<Utc>,
	#[serde(skip_serializing_if = "Map::is_empty", default)]
	pub context: Map<String, Value>,
}

impl LogRecord {
	/// Starts building a record at the given level.
	pub fn builder(level: Level, message: impl Into<String>) -> LogRecordBuilder {
		LogRecordBuilder::new(level, message)
	}

	pub fn new(level: Level, message: impl Into<String>) -> Self {
		Self::builder(level, message).build()
	}

	/// Serializes the record to a JSON object.
	pub fn to_value(&self) -> Value {
		serde_json::to_value(self).unwrap_or_else(|_| {
			// Every field is plain data; fall back to the bare essentials.
			serde_json::json!({
				"level": self.level.as_str(),
				"message": self.message,
				"timestamp": self.timestamp.to_rfc3339(),
			})
		})
	}
}

/// Builder for [`LogRecord`].
#[derive(Debug, Clone)]
pub struct LogRecordBuilder {
	level: Level,
	message: String,
	code: Option<String>,
	error: Option<ErrorInfo>,
	timestamp: Option<DateTime<Utc>>,
	context: Map<String, Value>,
}

impl LogRecordBuilder {
	pub fn new(level: Level, message: impl Into<String>) -> Self {
		Self {
			level,
			message: message.into(),
			code: None,
			error: None,
			timestamp: None,
			context: Map::new(),
		}
	}

	pub fn level(&self) -> Level {
		self.level
	}

	/// Sets the short application error code.
	pub fn code(mut self, code: impl Into<String>) -> Self {
		self.code = Some(code.into());
		self
	}

	/// Attaches a structured error. Ignored for debug and info records.
	pub fn error(mut self, error: ErrorInfo) -> Self {
		self.error = Some(error);
		self
	}

	/// Attaches a structured error built from any `std::error::Error`.
	pub fn source_error(self, error: &(dyn std::error::Error + 'static)) -> Self {
		self.error(ErrorInfo::from_error(error))
	}

	/// Overrides the creation instant. Defaults to the moment `build` runs.
	pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
		self.timestamp = Some(timestamp);
		self
	}

	pub fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.context.insert(key.into(), value.into());
		self
	}

	/// Adds each entry of `defaults` whose key is not already set.
	pub fn default_context(mut self, defaults: &Map<String, Value>) -> Self {
		for (key, value) in defaults {
			if !self.context.contains_key(key) {
				self.context.insert(key.clone(), value.clone());
			}
		}
		self
	}

	pub fn build(self) -> LogRecord {
		let error = if self.level.carries_error() {
			self.error
		} else {
			None
		};

		LogRecord {
			level: self.level,
			message: self.message,
			code: self.code,
			error,
			timestamp: self.timestamp.unwrap_or_else(Utc::now),
			context: self.context,
		}
	}
}
