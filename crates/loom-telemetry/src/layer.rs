// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracing layer that forwards events into a [`Logger`].

use std::fmt;

use loom_telemetry_core::{Level, LogRecord};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::logger::Logger;

/// Events from these targets are never forwarded, so the pipeline does not
/// feed its own diagnostics back into itself.
const SELF_TARGET_PREFIX: &str = "loom_telemetry";

/// A tracing `Layer` that turns events into log records.
///
/// The `message` field becomes the record message, every other field is
/// added to the record context, and the event target is stored as `source`.
#[derive(Clone)]
pub struct TelemetryLayer {
	logger: Logger,
}

impl TelemetryLayer {
	pub fn new(logger: Logger) -> Self {
		Self { logger }
	}

	pub fn logger(&self) -> &Logger {
		&self.logger
	}
}

/// Maps a tracing level onto the telemetry levels. TRACE folds into Debug.
pub fn level_from_tracing(level: &tracing::Level) -> Level {
	match *level {
		tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
		tracing::Level::INFO => Level::Info,
		tracing::Level::WARN => Level::Warn,
		tracing::Level::ERROR => Level::Error,
	}
}

impl<S> Layer<S> for TelemetryLayer
where
	S: Subscriber + for<'a> LookupSpan<'a>,
{
	fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
		let metadata = event.metadata();
		if metadata.target().starts_with(SELF_TARGET_PREFIX) {
			return;
		}

		let level = level_from_tracing(metadata.level());
		if !self.logger.enabled(level) {
			return;
		}

		let mut visitor = FieldVisitor::default();
		event.record(&mut visitor);

		let mut record = LogRecord::builder(level, visitor.message.unwrap_or_default())
			.context("source", metadata.target());
		for (key, value) in visitor.fields {
			record = record.context(key, value);
		}

		self.logger.log(record);
	}
}

#[derive(Default)]
struct FieldVisitor {
	message: Option<String>,
	fields: Map<String, Value>,
}

impl FieldVisitor {
	fn insert(&mut self, field: &Field, value: Value) {
		self.fields.insert(field.name().to_string(), value);
	}
}

impl Visit for FieldVisitor {
	fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
		let value = format!("{value:?}");
		if field.name() == "message" {
			self.message = Some(value);
		} else {
			self.insert(field, Value::String(value));
		}
	}

	fn record_str(&mut self, field: &Field, value: &str) {
		if field.name() == "message" {
			self.message = Some(value.to_string());
		} else {
			self.insert(field, Value::String(value.to_string()));
		}
	}

	fn record_i64(&mut self, field: &Field, value: i64) {
		self.insert(field, Value::from(value));
	}

	fn record_u64(&mut self, field: &Field, value: u64) {
		self.insert(field, Value::from(value));
	}

	fn record_bool(&mut self, field: &Field, value: bool) {
		self.insert(field, Value::from(value));
	}

	fn record_f64(&mut self, field: &Field, value: f64) {
		self.insert(field, Value::from(value));
	}

	fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
		self.insert(field, Value::String(value.to_string()));
	}
}
