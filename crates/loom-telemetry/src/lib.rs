// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Leveled logging with console output and batched, redacted remote delivery.
//!
//! # Overview
//!
//! A [`Logger`] filters each call by severity, writes it to the console, and,
//! when remote logging is enabled and a tokio runtime is available, redacts
//! it and hands it to a background flusher task. The flusher buffers records
//! and posts them in batches to an HTTP collector, requeueing a batch when
//! delivery fails and reporting how many records were lost at shutdown.
//!
//! # Example
//!
//! ```ignore
//! use loom_telemetry::{load_config, Logger};
//!
//! let logger = Logger::new(load_config()?)?;
//! logger.info("storefront started");
//! logger.warn_err("price lookup slow", Some("PRICE_01"), &err);
//!
//! let report = logger.shutdown(true).await;
//! if report.lost > 0 {
//!     eprintln!("{} log records were not delivered", report.lost);
//! }
//! ```

pub mod config;
pub mod console;
pub mod error;
pub mod flusher;
pub mod layer;
pub mod logger;
pub mod sources;
pub mod transport;

pub use config::{
	load_config, load_config_from_env, load_config_with_file, load_from_sources, TelemetryConfig,
	TelemetryConfigLayer,
};
pub use console::{
	format_line, CapturedConsole, CapturedLine, ConsoleSink, ConsoleStream, ConsoleWriter,
	StdConsole,
};
pub use error::{ConfigError, Result, TelemetryError};
pub use flusher::{spawn_flusher, FlushBuffer, FlusherConfig, FlusherHandle, SpawnedFlusher};
pub use layer::TelemetryLayer;
pub use logger::{DeliveryStats, Logger, LoggerBuilder, ShutdownReport};
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};
pub use transport::{HttpTransport, LogTransport};

pub use loom_telemetry_core::{
	should_emit, Command, ErrorInfo, FlusherEvent, Level, LogPayload, LogRecord, LogRecordBuilder,
	RedactionRuleSet,
};
