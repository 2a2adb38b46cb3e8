// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loom_telemetry::{
	FlusherEvent, Level, LogPayload, LogTransport, TelemetryConfig, TelemetryError,
};
use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};

/// Transport that records every batch it is asked to send.
#[derive(Default)]
pub struct MockTransport {
	batches: Mutex<Vec<Vec<LogPayload>>>,
	attempts: AtomicUsize,
	should_fail: AtomicBool,
	gate: Option<Arc<Notify>>,
}

impl MockTransport {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// A transport whose sends block until `gate` is notified once per send.
	pub fn gated(gate: Arc<Notify>) -> Arc<Self> {
		Arc::new(Self {
			gate: Some(gate),
			..Self::default()
		})
	}

	pub fn set_should_fail(&self, fail: bool) {
		self.should_fail.store(fail, Ordering::SeqCst);
	}

	pub fn attempts(&self) -> usize {
		self.attempts.load(Ordering::SeqCst)
	}

	/// Messages of every attempted batch, in send order.
	pub fn messages(&self) -> Vec<Vec<String>> {
		self.batches
			.lock()
			.iter()
			.map(|batch| {
				batch
					.iter()
					.map(|p| p.message().unwrap_or_default().to_string())
					.collect()
			})
			.collect()
	}

	pub fn payloads(&self) -> Vec<Vec<LogPayload>> {
		self.batches.lock().clone()
	}
}

#[async_trait::async_trait]
impl LogTransport for MockTransport {
	async fn send_batch(&self, batch: &[LogPayload]) -> loom_telemetry::Result<()> {
		if let Some(gate) = &self.gate {
			gate.notified().await;
		}
		self.attempts.fetch_add(1, Ordering::SeqCst);
		self.batches.lock().push(batch.to_vec());
		if self.should_fail.load(Ordering::SeqCst) {
			return Err(TelemetryError::ServerError {
				status: 502,
				message: "bad gateway".to_string(),
			});
		}
		Ok(())
	}
}

/// Remote-enabled config with a timer long enough to never fire in a test.
pub fn remote_config(min_level: Level, flush_limit: usize) -> TelemetryConfig {
	TelemetryConfig {
		min_level,
		remote_enabled: true,
		timestamp_enabled: false,
		flush_limit,
		flush_interval: Duration::from_secs(3600),
		endpoint: Some("http://collector.invalid/logs".to_string()),
		..Default::default()
	}
}

/// Waits for the next event matching `pred`, skipping others.
pub async fn wait_for_event(
	events: &mut broadcast::Receiver<FlusherEvent>,
	pred: impl Fn(&FlusherEvent) -> bool,
) -> FlusherEvent {
	tokio::time::timeout(Duration::from_secs(5), async {
		loop {
			match events.recv().await {
				Ok(event) if pred(&event) => return event,
				Ok(_) => continue,
				Err(broadcast::error::RecvError::Lagged(_)) => continue,
				Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
			}
		}
	})
	.await
	.expect("timed out waiting for flusher event")
}
