// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Handshake and lifecycle protocol between the logger and the flusher.
//!
//! | Direction | Message | Meaning |
//! |-----------|---------|---------|
//! | in | `MARCO` | liveness probe, sent once at startup |
//! | in | `LOG` | append one payload to the buffer |
//! | in | `FLUSH` | flush now regardless of buffer size |
//! | in | `STOP` | shut down, optionally draining first |
//! | out | `POLO` | reply to `MARCO`; ready for `LOG` |
//! | out | `REMAINING` | a flush succeeded; `count` records are still buffered |
//! | out | `ERROR` | a flush failed; the batch was requeued |
//! | out | `LOGS_LOST` | final message; `count` records were never sent |
//!
//! Both enums serialize as internally tagged JSON (`{"type": "LOG", ...}`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::level::Level;
use crate::record::LogRecord;
use crate::redact::RedactionRuleSet;

/// A redacted, serialized log record as held in the flusher buffer and sent
/// to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogPayload(Value);

impl LogPayload {
	/// Serializes `record` and applies `rules` to the result.
	pub fn from_record(record: &LogRecord, rules: &RedactionRuleSet) -> Self {
		let mut value = record.to_value();
		rules.redact(&mut value);
		Self(value)
	}

	/// Wraps an already-prepared JSON value without redacting it.
	pub fn from_value(value: Value) -> Self {
		Self(value)
	}

	pub fn as_value(&self) -> &Value {
		&self.0
	}

	pub fn into_value(self) -> Value {
		self.0
	}

	pub fn message(&self) -> Option<&str> {
		self.0.get("message").and_then(Value::as_str)
	}

	pub fn level(&self) -> Option<Level> {
		self.0
			.get("level")
			.and_then(Value::as_str)
			.and_then(|s| s.parse().ok())
	}
}

/// Messages sent from the logger to the flusher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
	Marco,
	Log { payload: LogPayload },
	Flush,
	Stop { drain: bool },
}

impl Command {
	/// Wire name of this message.
	pub fn kind(&self) -> &'static str {
		match self {
			Command::Marco => "MARCO",
			Command::Log { .. } => "LOG",
			Command::Flush => "FLUSH",
			Command::Stop { .. } => "STOP",
		}
	}

	/// Decodes a JSON-encoded command.
	pub fn decode(input: &str) -> Result<Self, ProtocolError> {
		let value: Value = serde_json::from_str(input)?;
		let kind = value
			.get("type")
			.and_then(Value::as_str)
			.ok_or_else(|| ProtocolError::UnknownType("<missing>".to_string()))?;

		if !matches!(kind, "MARCO" | "LOG" | "FLUSH" | "STOP") {
			return Err(ProtocolError::UnknownType(kind.to_string()));
		}

		Ok(serde_json::from_value(value)?)
	}

	pub fn encode(&self) -> Result<String, ProtocolError> {
		Ok(serde_json::to_string(self)?)
	}
}

/// Messages sent from the flusher back to the logger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlusherEvent {
	Polo,
	Remaining { sent: usize, count: usize },
	Error { error: String, requeued: usize },
	LogsLost { count: usize },
}

impl FlusherEvent {
	pub fn kind(&self) -> &'static str {
		match self {
			FlusherEvent::Polo => "POLO",
			FlusherEvent::Remaining { .. } => "REMAINING",
			FlusherEvent::Error { .. } => "ERROR",
			FlusherEvent::LogsLost { .. } => "LOGS_LOST",
		}
	}

	/// Whether this is the last message the flusher will send.
	pub fn is_terminal(&self) -> bool {
		matches!(self, FlusherEvent::LogsLost { .. })
	}
}
