// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Logger facade.
//!
//! [`Logger`] is the public entry point. Each call is filtered by level,
//! written to the console sink, and, when remote logging is active, redacted
//! and handed to the background flusher without waiting on the network.
//!
//! # Example
//!
//! ```ignore
//! use loom_telemetry::{Logger, TelemetryConfig};
//!
//! let logger = Logger::new(TelemetryConfig::default())?;
//! logger.info("cart loaded");
//! logger.error_err("charge failed", Some("PAY_042"), &err);
//!
//! let report = logger.shutdown(true).await;
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loom_telemetry_core::{
	should_emit, Command, FlusherEvent, Level, LogPayload, LogRecord, LogRecordBuilder,
	RedactionRuleSet,
};
use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::TelemetryConfig;
use crate::console::{ConsoleSink, ConsoleWriter, StdConsole};
use crate::error::{Result, TelemetryError};
use crate::flusher::{spawn_flusher, FlusherConfig, FlusherHandle};
use crate::transport::{HttpTransport, LogTransport};

/// Capacity of the broadcast channel behind [`Logger::subscribe`].
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Delivery counters maintained by the supervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
	pub successful_flushes: u64,
	pub failed_flushes: u64,
	pub records_sent: u64,
	pub records_lost: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
	successful_flushes: AtomicU64,
	failed_flushes: AtomicU64,
	records_sent: AtomicU64,
	records_lost: AtomicU64,
}

impl StatsCounters {
	fn snapshot(&self) -> DeliveryStats {
		DeliveryStats {
			successful_flushes: self.successful_flushes.load(Ordering::Relaxed),
			failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
			records_sent: self.records_sent.load(Ordering::Relaxed),
			records_lost: self.records_lost.load(Ordering::Relaxed),
		}
	}
}

/// Outcome of [`Logger::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
	/// Records still buffered when the flusher stopped.
	pub lost: usize,
}

#[derive(Default)]
struct ShutdownState {
	flusher: Option<JoinHandle<usize>>,
	supervisor: Option<JoinHandle<()>>,
	report: Option<ShutdownReport>,
}

struct Remote {
	handle: FlusherHandle,
	events: broadcast::Sender<FlusherEvent>,
	ready: watch::Receiver<bool>,
	closed: AtomicBool,
	shutdown: Mutex<ShutdownState>,
}

struct Inner {
	min_level: Level,
	console: Option<ConsoleSink>,
	rules: RedactionRuleSet,
	remote: Option<Remote>,
	stats: Arc<StatsCounters>,
}

/// Leveled logger with console output and batched remote delivery.
///
/// Cheap to clone; clones share the console sink and the flusher.
#[derive(Clone)]
pub struct Logger {
	inner: Arc<Inner>,
	context: Arc<Map<String, Value>>,
}

impl Logger {
	/// Creates a logger from `config`, posting remote batches over HTTP.
	pub fn new(config: TelemetryConfig) -> Result<Self> {
		Self::builder().config(config).build()
	}

	/// Creates a logger that delivers remote batches through `transport`.
	///
	/// Fails when the flush limit or interval is zero.
	pub fn with_transport(
		config: TelemetryConfig,
		transport: Arc<dyn LogTransport>,
	) -> Result<Self> {
		Self::builder().config(config).transport(transport).build()
	}

	pub fn builder() -> LoggerBuilder {
		LoggerBuilder::new()
	}

	pub fn debug(&self, message: impl Into<String>) {
		self.log(LogRecord::builder(Level::Debug, message));
	}

	pub fn info(&self, message: impl Into<String>) {
		self.log(LogRecord::builder(Level::Info, message));
	}

	pub fn warn(&self, message: impl Into<String>) {
		self.log(LogRecord::builder(Level::Warn, message));
	}

	pub fn error(&self, message: impl Into<String>) {
		self.log(LogRecord::builder(Level::Error, message));
	}

	/// Logs at the highest severity. Does not unwind.
	pub fn panic(&self, message: impl Into<String>) {
		self.log(LogRecord::builder(Level::Panic, message));
	}

	pub fn warn_err(
		&self,
		message: impl Into<String>,
		code: Option<&str>,
		error: &(dyn std::error::Error + 'static),
	) {
		self.log_err(Level::Warn, message, code, error);
	}

	pub fn error_err(
		&self,
		message: impl Into<String>,
		code: Option<&str>,
		error: &(dyn std::error::Error + 'static),
	) {
		self.log_err(Level::Error, message, code, error);
	}

	pub fn panic_err(
		&self,
		message: impl Into<String>,
		code: Option<&str>,
		error: &(dyn std::error::Error + 'static),
	) {
		self.log_err(Level::Panic, message, code, error);
	}

	fn log_err(
		&self,
		level: Level,
		message: impl Into<String>,
		code: Option<&str>,
		error: &(dyn std::error::Error + 'static),
	) {
		if !self.enabled(level) {
			return;
		}
		let mut record = LogRecord::builder(level, message).source_error(error);
		if let Some(code) = code {
			record = record.code(code);
		}
		self.log(record);
	}

	/// Logs a fully specified record.
	pub fn log(&self, record: LogRecordBuilder) {
		if !self.enabled(record.level()) {
			return;
		}

		let record = record.default_context(&self.context).build();

		if let Some(console) = &self.inner.console {
			console.emit(&record);
		}

		if let Some(remote) = &self.inner.remote {
			if remote.closed.load(Ordering::Acquire) {
				return;
			}
			let payload = LogPayload::from_record(&record, &self.inner.rules);
			if remote.handle.send(Command::Log { payload }).is_err() {
				debug!("Telemetry flusher is gone; dropping record");
			}
		}
	}

	/// Whether a record at `level` would be emitted.
	pub fn enabled(&self, level: Level) -> bool {
		should_emit(level, self.inner.min_level)
	}

	/// Returns a handle that adds `key` to the context of every record.
	pub fn with_context(&self, key: impl Into<String>, value: impl Into<Value>) -> Logger {
		let mut context = (*self.context).clone();
		context.insert(key.into(), value.into());
		Logger {
			inner: Arc::clone(&self.inner),
			context: Arc::new(context),
		}
	}

	/// Default context merged into every record.
	pub fn context(&self) -> &Map<String, Value> {
		&self.context
	}

	/// Asks the flusher to deliver everything buffered now.
	pub fn flush(&self) {
		if let Some(remote) = self.active_remote() {
			let _ = remote.handle.send(Command::Flush);
		}
	}

	/// Whether records are currently forwarded to the flusher.
	pub fn is_remote_active(&self) -> bool {
		self.active_remote().is_some()
	}

	fn active_remote(&self) -> Option<&Remote> {
		self.inner
			.remote
			.as_ref()
			.filter(|r| !r.closed.load(Ordering::Acquire))
	}

	/// Waits until the flusher has answered the startup handshake.
	///
	/// Returns false when remote logging is inactive or `timeout` elapses.
	pub async fn wait_ready(&self, timeout: Duration) -> bool {
		let Some(remote) = &self.inner.remote else {
			return false;
		};
		let mut ready = remote.ready.clone();
		let waited = tokio::time::timeout(timeout, ready.wait_for(|r| *r)).await;
		matches!(waited, Ok(Ok(_)))
	}

	/// Subscribes to flusher events. Returns `None` when remote logging was
	/// never started.
	pub fn subscribe(&self) -> Option<broadcast::Receiver<FlusherEvent>> {
		self.inner.remote.as_ref().map(|r| r.events.subscribe())
	}

	pub fn stats(&self) -> DeliveryStats {
		self.inner.stats.snapshot()
	}

	/// Stops the flusher, optionally draining the buffer first, and reports
	/// how many records were never delivered.
	///
	/// Idempotent: later calls return the first report. Console output keeps
	/// working afterwards; remote dispatch becomes a no-op.
	pub async fn shutdown(&self, drain: bool) -> ShutdownReport {
		let Some(remote) = &self.inner.remote else {
			return ShutdownReport::default();
		};

		let mut state = remote.shutdown.lock().await;
		if let Some(report) = state.report {
			return report;
		}

		remote.closed.store(true, Ordering::Release);
		if remote.handle.send(Command::Stop { drain }).is_err() {
			debug!("Telemetry flusher already stopped");
		}

		let lost = match state.flusher.take() {
			Some(task) => match task.await {
				Ok(lost) => lost,
				Err(e) => {
					error!(error = %e, "Telemetry flusher task failed");
					0
				}
			},
			None => 0,
		};

		if let Some(supervisor) = state.supervisor.take() {
			if let Err(e) = supervisor.await {
				error!(error = %e, "Telemetry supervisor task failed");
			}
		}

		let report = ShutdownReport { lost };
		state.report = Some(report);
		info!(lost, drain, "Telemetry logger shut down");
		report
	}
}

impl std::fmt::Debug for Logger {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Logger")
			.field("min_level", &self.inner.min_level)
			.field("console", &self.inner.console.is_some())
			.field("remote_active", &self.is_remote_active())
			.finish_non_exhaustive()
	}
}

/// Builder for [`Logger`].
pub struct LoggerBuilder {
	config: TelemetryConfig,
	transport: Option<Arc<dyn LogTransport>>,
	console: Option<Arc<dyn ConsoleWriter>>,
	rules: RedactionRuleSet,
	context: Map<String, Value>,
}

impl LoggerBuilder {
	pub fn new() -> Self {
		Self {
			config: TelemetryConfig::default(),
			transport: None,
			console: None,
			rules: RedactionRuleSet::default(),
			context: Map::new(),
		}
	}

	pub fn config(mut self, config: TelemetryConfig) -> Self {
		self.config = config;
		self
	}

	/// Replaces the HTTP transport.
	pub fn transport(mut self, transport: Arc<dyn LogTransport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Replaces the standard-stream console writer.
	pub fn console_writer(mut self, writer: Arc<dyn ConsoleWriter>) -> Self {
		self.console = Some(writer);
		self
	}

	/// Replaces the default redaction rules.
	pub fn redaction(mut self, rules: RedactionRuleSet) -> Self {
		self.rules = rules;
		self
	}

	/// Adds a default context entry to every record.
	pub fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.context.insert(key.into(), value.into());
		self
	}

	/// Builds the logger.
	///
	/// Fails when the flush limit or interval is zero, or when remote logging
	/// is enabled without a custom transport and the configured endpoint
	/// cannot back an HTTP transport.
	pub fn build(self) -> Result<Logger> {
		self.config.validate_flush()?;

		let http = match (&self.transport, self.config.remote_enabled) {
			(None, true) => {
				let endpoint = self.config.endpoint.as_deref().ok_or_else(|| {
					TelemetryError::InvalidEndpoint("no endpoint configured".to_string())
				})?;
				let transport: Arc<dyn LogTransport> =
					Arc::new(HttpTransport::new(endpoint, self.config.request_timeout)?);
				Some(transport)
			}
			_ => None,
		};
		self.build_with(http)
	}

	fn build_with(self, http: Option<Arc<dyn LogTransport>>) -> Result<Logger> {
		let config = self.config;

		let console = config.console_enabled.then(|| {
			let writer = self
				.console
				.unwrap_or_else(|| Arc::new(StdConsole) as Arc<dyn ConsoleWriter>);
			ConsoleSink::new(writer, config.timestamp_enabled)
		});

		let mut context = base_context(&config);
		for (key, value) in self.context {
			context.insert(key, value);
		}

		let stats = Arc::new(StatsCounters::default());
		let transport = self.transport.or(http);
		let remote = if config.remote_enabled {
			start_remote(&config, transport, Arc::clone(&stats))?
		} else {
			None
		};

		Ok(Logger {
			inner: Arc::new(Inner {
				min_level: config.min_level,
				console,
				rules: self.rules,
				remote,
				stats,
			}),
			context: Arc::new(context),
		})
	}
}

impl Default for LoggerBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn base_context(config: &TelemetryConfig) -> Map<String, Value> {
	let mut context = Map::new();
	context.insert("app_name".to_string(), Value::from(config.app_name.clone()));
	context.insert(
		"app_version".to_string(),
		Value::from(config.app_version.clone()),
	);
	context.insert(
		"environment".to_string(),
		Value::from(config.environment.clone()),
	);
	context.insert(
		"session_id".to_string(),
		Value::from(uuid::Uuid::new_v4().to_string()),
	);
	context
}

fn start_remote(
	config: &TelemetryConfig,
	transport: Option<Arc<dyn LogTransport>>,
	stats: Arc<StatsCounters>,
) -> Result<Option<Remote>> {
	let Ok(runtime) = tokio::runtime::Handle::try_current() else {
		debug!("No tokio runtime available; remote logging disabled");
		return Ok(None);
	};
	let Some(transport) = transport else {
		debug!("No log transport available; remote logging disabled");
		return Ok(None);
	};

	let flusher = spawn_flusher(
		&runtime,
		FlusherConfig {
			limit: config.flush_limit,
			flush_interval: config.flush_interval,
		},
		transport,
	)?;

	let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
	let (ready_tx, ready) = watch::channel(false);
	let supervisor = runtime.spawn(supervise(
		flusher.events,
		stats,
		events.clone(),
		ready_tx,
	));

	if flusher.handle.send(Command::Marco).is_err() {
		debug!("Telemetry flusher exited before handshake");
	}

	Ok(Some(Remote {
		handle: flusher.handle,
		events,
		ready,
		closed: AtomicBool::new(false),
		shutdown: Mutex::new(ShutdownState {
			flusher: Some(flusher.task),
			supervisor: Some(supervisor),
			report: None,
		}),
	}))
}

/// Consumes flusher events: records stats, logs failures and rebroadcasts.
async fn supervise(
	mut events: mpsc::UnboundedReceiver<FlusherEvent>,
	stats: Arc<StatsCounters>,
	broadcast: broadcast::Sender<FlusherEvent>,
	ready: watch::Sender<bool>,
) {
	while let Some(event) = events.recv().await {
		match &event {
			FlusherEvent::Polo => {
				ready.send_replace(true);
				debug!("Telemetry flusher ready");
			}
			FlusherEvent::Remaining { sent, count } => {
				stats.successful_flushes.fetch_add(1, Ordering::Relaxed);
				stats
					.records_sent
					.fetch_add(*sent as u64, Ordering::Relaxed);
				debug!(sent, remaining = count, "Log batch flushed");
			}
			FlusherEvent::Error { error, requeued } => {
				stats.failed_flushes.fetch_add(1, Ordering::Relaxed);
				warn!(error = %error, requeued, "Failed to flush log batch; records requeued");
			}
			FlusherEvent::LogsLost { count } => {
				stats
					.records_lost
					.fetch_add(*count as u64, Ordering::Relaxed);
				if *count > 0 {
					warn!(count, "Log records lost at shutdown");
				} else {
					debug!("Telemetry flusher stopped with an empty buffer");
				}
			}
		}

		// No subscribers is fine.
		let _ = broadcast.send(event);
	}
}
