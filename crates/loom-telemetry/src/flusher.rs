// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Remote buffer and background flusher.
//!
//! The flusher is a tokio task that exclusively owns the record buffer and is
//! driven only by [`Command`] messages. It flushes when the buffer reaches the
//! configured limit, when asked to via `FLUSH`, and on a fixed timer. Results
//! are reported back as [`FlusherEvent`]s.
//!
//! At most one flush is in flight at a time. The in-flight send is polled in
//! the same `select!` loop that receives commands, so `LOG` messages arriving
//! during network I/O land in the fresh buffer. A trigger that fires while a
//! flush is in flight is remembered and honoured once that flush succeeds.
//! The loop checks for a finished flush before reading the inbox, so outcomes
//! are reported as soon as they are known.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use loom_telemetry_core::{Command, FlusherEvent, LogPayload};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result, TelemetryError};
use crate::transport::LogTransport;

/// Flusher tuning, taken from [`TelemetryConfig`](crate::TelemetryConfig).
#[derive(Debug, Clone)]
pub struct FlusherConfig {
	/// Buffer length that triggers an immediate flush.
	pub limit: usize,
	/// Period of the unconditional flush timer.
	pub flush_interval: Duration,
}

impl FlusherConfig {
	pub fn validate(&self) -> Result<()> {
		if self.limit == 0 {
			return Err(invalid("flusher limit must be greater than zero"));
		}
		if self.flush_interval.is_zero() {
			return Err(invalid("flusher interval must be greater than zero"));
		}
		Ok(())
	}
}

fn invalid(message: &str) -> TelemetryError {
	ConfigError::Validation(message.to_string()).into()
}

impl Default for FlusherConfig {
	fn default() -> Self {
		Self {
			limit: crate::config::DEFAULT_FLUSH_LIMIT,
			flush_interval: Duration::from_millis(crate::config::DEFAULT_FLUSH_INTERVAL_MS),
		}
	}
}

/// Ordered buffer of payloads awaiting delivery.
#[derive(Debug, Default)]
pub struct FlushBuffer {
	records: Vec<LogPayload>,
}

impl FlushBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a payload and returns the new length.
	pub fn append(&mut self, payload: LogPayload) -> usize {
		self.records.push(payload);
		self.records.len()
	}

	/// Takes every buffered payload, leaving the buffer empty.
	pub fn take_batch(&mut self) -> Vec<LogPayload> {
		std::mem::take(&mut self.records)
	}

	/// Puts a failed batch back in front of anything buffered since.
	pub fn requeue(&mut self, mut batch: Vec<LogPayload>) {
		batch.append(&mut self.records);
		self.records = batch;
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &LogPayload> {
		self.records.iter()
	}
}

/// Message accepted by the flusher task.
#[derive(Debug)]
enum Inbound {
	Command(Command),
	Encoded(String),
}

/// Sending side of the flusher's inbox.
///
/// Sends never block. Once the flusher has stopped they fail with
/// [`TelemetryError::Shutdown`].
#[derive(Debug, Clone)]
pub struct FlusherHandle {
	tx: mpsc::UnboundedSender<Inbound>,
}

impl FlusherHandle {
	pub fn send(&self, command: Command) -> Result<()> {
		self
			.tx
			.send(Inbound::Command(command))
			.map_err(|_| TelemetryError::Shutdown)
	}

	/// Sends a JSON-encoded command. Malformed or unknown messages are
	/// reported by the flusher and otherwise ignored.
	pub fn post_encoded(&self, message: impl Into<String>) -> Result<()> {
		self
			.tx
			.send(Inbound::Encoded(message.into()))
			.map_err(|_| TelemetryError::Shutdown)
	}

	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}

/// A running flusher: the inbox handle, the outbound event stream, and the
/// task, which resolves to the number of records lost at shutdown.
pub struct SpawnedFlusher {
	pub handle: FlusherHandle,
	pub events: mpsc::UnboundedReceiver<FlusherEvent>,
	pub task: JoinHandle<usize>,
}

/// Spawns a flusher on `runtime`. Fails when `config` has a zero limit or
/// period.
pub fn spawn_flusher(
	runtime: &tokio::runtime::Handle,
	config: FlusherConfig,
	transport: Arc<dyn LogTransport>,
) -> Result<SpawnedFlusher> {
	config.validate()?;

	let (tx, inbox) = mpsc::unbounded_channel();
	let (events_tx, events) = mpsc::unbounded_channel();

	let flusher = Flusher {
		config,
		transport,
		buffer: FlushBuffer::new(),
		inbox,
		events: events_tx,
	};
	let task = runtime.spawn(flusher.run());

	Ok(SpawnedFlusher {
		handle: FlusherHandle { tx },
		events,
		task,
	})
}

type SendOutcome = (Vec<LogPayload>, Result<()>);
type InFlight = BoxFuture<'static, SendOutcome>;

struct Flusher {
	config: FlusherConfig,
	transport: Arc<dyn LogTransport>,
	buffer: FlushBuffer,
	inbox: mpsc::UnboundedReceiver<Inbound>,
	events: mpsc::UnboundedSender<FlusherEvent>,
}

impl Flusher {
	async fn run(mut self) -> usize {
		info!(
			limit = self.config.limit,
			flush_interval_ms = self.config.flush_interval.as_millis() as u64,
			"Starting telemetry flusher"
		);

		let period = self.config.flush_interval;
		let mut ticker = interval_at(Instant::now() + period, period);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		let mut in_flight: Option<InFlight> = None;
		let mut pending = false;

		let drain = loop {
			tokio::select! {
				biased;

				(batch, result) = poll_in_flight(&mut in_flight) => {
					in_flight = None;
					let succeeded = self.complete(batch, result);
					if succeeded && (pending || self.buffer.len() >= self.config.limit) {
						in_flight = self.start_flush();
					}
					pending = false;
				}
				message = self.inbox.recv() => {
					let command = match message {
						Some(Inbound::Command(command)) => command,
						Some(Inbound::Encoded(raw)) => match Command::decode(&raw) {
							Ok(command) => command,
							Err(e) => {
								warn!(error = %e, "Ignoring malformed flusher message");
								continue;
							}
						},
						None => {
							debug!("Flusher inbox closed without STOP");
							break false;
						}
					};

					match command {
						Command::Marco => self.emit(FlusherEvent::Polo),
						Command::Log { payload } => {
							if self.buffer.append(payload) >= self.config.limit {
								self.trigger(&mut in_flight, &mut pending);
							}
						}
						Command::Flush => self.trigger(&mut in_flight, &mut pending),
						Command::Stop { drain } => break drain,
					}
				}
				_ = ticker.tick() => {
					self.trigger(&mut in_flight, &mut pending);
				}
			}
		};

		self.collect_stragglers();

		if let Some(flush) = in_flight.take() {
			let (batch, result) = flush.await;
			self.complete(batch, result);
		}

		if drain {
			if let Some(flush) = self.start_flush() {
				let (batch, result) = flush.await;
				self.complete(batch, result);
			}
		}

		let lost = self.buffer.len();
		self.emit(FlusherEvent::LogsLost { count: lost });
		info!(lost, drain, "Telemetry flusher stopped");
		lost
	}

	/// Closes the inbox and buffers any `LOG` that was queued behind `STOP`,
	/// so it is either drained or counted as lost.
	fn collect_stragglers(&mut self) {
		self.inbox.close();

		let mut late = 0usize;
		while let Ok(message) = self.inbox.try_recv() {
			let command = match message {
				Inbound::Command(command) => command,
				Inbound::Encoded(raw) => match Command::decode(&raw) {
					Ok(command) => command,
					Err(e) => {
						warn!(error = %e, "Ignoring malformed flusher message");
						continue;
					}
				},
			};
			if let Command::Log { payload } = command {
				self.buffer.append(payload);
				late += 1;
			}
		}

		if late > 0 {
			debug!(late, "Buffered records received after STOP");
		}
	}

	/// Starts a flush now, or marks one pending if a flush is in flight.
	fn trigger(&mut self, in_flight: &mut Option<InFlight>, pending: &mut bool) {
		if in_flight.is_some() {
			*pending = true;
		} else {
			*in_flight = self.start_flush();
		}
	}

	fn start_flush(&mut self) -> Option<InFlight> {
		if self.buffer.is_empty() {
			return None;
		}

		let batch = self.buffer.take_batch();
		debug!(count = batch.len(), "Flushing log batch");

		let transport = Arc::clone(&self.transport);
		Some(Box::pin(async move {
			let result = transport.send_batch(&batch).await;
			(batch, result)
		}))
	}

	/// Applies the outcome of a flush and reports it. Returns true on success.
	fn complete(&mut self, batch: Vec<LogPayload>, result: Result<()>) -> bool {
		match result {
			Ok(()) => {
				let sent = batch.len();
				let count = self.buffer.len();
				debug!(sent, remaining = count, "Log batch delivered");
				self.emit(FlusherEvent::Remaining { sent, count });
				true
			}
			Err(e) => {
				let requeued = batch.len();
				debug!(error = %e, requeued, "Log batch delivery failed; requeueing");
				self.buffer.requeue(batch);
				self.emit(FlusherEvent::Error {
					error: e.to_string(),
					requeued,
				});
				false
			}
		}
	}

	fn emit(&self, event: FlusherEvent) {
		// The receiver may already be gone during teardown.
		let _ = self.events.send(event);
	}
}

async fn poll_in_flight(in_flight: &mut Option<InFlight>) -> SendOutcome {
	match in_flight {
		Some(flush) => flush.await,
		None => std::future::pending().await,
	}
}
