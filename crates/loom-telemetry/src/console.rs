// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Console sink.
//!
//! Formats one [`LogRecord`] into a human-readable line and hands it to a
//! [`ConsoleWriter`] together with the stream chosen by severity. Output is
//! synchronous and unbuffered; write failures are swallowed.

use std::io::Write;
use std::sync::Arc;

use chrono::SecondsFormat;
use loom_telemetry_core::{ErrorInfo, Level, LogRecord};
use parking_lot::Mutex;

/// Logical console stream a line is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleStream {
	Debug,
	Info,
	Warn,
	Error,
}

impl ConsoleStream {
	pub fn for_level(level: Level) -> Self {
		match level {
			Level::Debug => ConsoleStream::Debug,
			Level::Info => ConsoleStream::Info,
			Level::Warn => ConsoleStream::Warn,
			Level::Error | Level::Panic => ConsoleStream::Error,
		}
	}

	/// Whether the stream maps to stderr on a standard terminal.
	pub fn is_stderr(self) -> bool {
		matches!(self, ConsoleStream::Warn | ConsoleStream::Error)
	}
}

/// Destination for formatted console lines.
pub trait ConsoleWriter: Send + Sync {
	/// Writes `line` to `stream`. An attached error is passed structurally,
	/// not folded into the line.
	fn write(&self, stream: ConsoleStream, line: &str, error: Option<&ErrorInfo>);
}

/// Formats a record as `[LEVEL] message` with an optional ` | code` suffix,
/// prefixed by an RFC 3339 timestamp when `timestamp_enabled` is set.
pub fn format_line(record: &LogRecord, timestamp_enabled: bool) -> String {
	let mut line = String::new();
	if timestamp_enabled {
		line.push_str(
			&record
				.timestamp
				.to_rfc3339_opts(SecondsFormat::Millis, true),
		);
		line.push(' ');
	}
	line.push('[');
	line.push_str(record.level.label());
	line.push_str("] ");
	line.push_str(&record.message);
	if let Some(code) = &record.code {
		line.push_str(" | ");
		line.push_str(code);
	}
	line
}

/// Formats records and forwards them to a writer.
#[derive(Clone)]
pub struct ConsoleSink {
	writer: Arc<dyn ConsoleWriter>,
	timestamp_enabled: bool,
}

impl ConsoleSink {
	pub fn new(writer: Arc<dyn ConsoleWriter>, timestamp_enabled: bool) -> Self {
		Self {
			writer,
			timestamp_enabled,
		}
	}

	pub fn emit(&self, record: &LogRecord) {
		let line = format_line(record, self.timestamp_enabled);
		self.writer.write(
			ConsoleStream::for_level(record.level),
			&line,
			record.error.as_ref(),
		);
	}
}

impl std::fmt::Debug for ConsoleSink {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConsoleSink")
			.field("timestamp_enabled", &self.timestamp_enabled)
			.finish_non_exhaustive()
	}
}

/// Writes debug/info to stdout and warn/error to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdConsole;

impl ConsoleWriter for StdConsole {
	fn write(&self, stream: ConsoleStream, line: &str, error: Option<&ErrorInfo>) {
		let rendered = render(line, error);
		if stream.is_stderr() {
			let _ = std::io::stderr().lock().write_all(rendered.as_bytes());
		} else {
			let _ = std::io::stdout().lock().write_all(rendered.as_bytes());
		}
	}
}

fn render(line: &str, error: Option<&ErrorInfo>) -> String {
	let mut out = String::with_capacity(line.len() + 1);
	out.push_str(line);
	out.push('\n');

	if let Some(error) = error {
		for (depth, info) in error.chain().enumerate() {
			let label = if depth == 0 { "error" } else { "caused by" };
			out.push_str(&format!("    {label}: {}: {}\n", info.name, info.message));
			if let Some(stack) = &info.stack {
				for frame in stack.lines() {
					out.push_str("        ");
					out.push_str(frame);
					out.push('\n');
				}
			}
		}
	}

	out
}

/// One line captured by [`CapturedConsole`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedLine {
	pub stream: ConsoleStream,
	pub line: String,
	pub error: Option<ErrorInfo>,
}

/// In-memory writer that records every line, for embedding hosts that
/// display logs themselves and for tests.
#[derive(Debug, Default, Clone)]
pub struct CapturedConsole {
	lines: Arc<Mutex<Vec<CapturedLine>>>,
}

impl CapturedConsole {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn lines(&self) -> Vec<CapturedLine> {
		self.lines.lock().clone()
	}

	pub fn len(&self) -> usize {
		self.lines.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl ConsoleWriter for CapturedConsole {
	fn write(&self, stream: ConsoleStream, line: &str, error: Option<&ErrorInfo>) {
		let entry = CapturedLine {
			stream,
			line: line.to_string(),
			error: error.cloned(),
		};
		self.lines.lock().push(entry);
	}
}
