// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery of log batches to a remote collector.

use std::time::Duration;

use loom_telemetry_core::LogPayload;
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION};
use reqwest::Client;
use tracing::debug;

use crate::error::{Result, TelemetryError};

/// SDK identifier sent in the `User-Agent` header.
pub const SDK_NAME: &str = "loom-telemetry";
/// SDK version sent in the `User-Agent` header.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sends one batch of payloads to the collector.
///
/// Implementations perform exactly one attempt per call. Retrying is the
/// flusher's job: a failed batch is requeued and waits for the next trigger.
#[async_trait::async_trait]
pub trait LogTransport: Send + Sync {
	async fn send_batch(&self, batch: &[LogPayload]) -> Result<()>;
}

/// Posts batches as a JSON array to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	client: Client,
	endpoint: reqwest::Url,
}

impl HttpTransport {
	/// Creates a transport for `endpoint` with the given request timeout.
	pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
		let endpoint = reqwest::Url::parse(endpoint)
			.map_err(|e| TelemetryError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
		if !matches!(endpoint.scheme(), "http" | "https") {
			return Err(TelemetryError::InvalidEndpoint(format!(
				"{endpoint}: unsupported scheme '{}'",
				endpoint.scheme()
			)));
		}

		let mut headers = HeaderMap::new();
		headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

		let client = Client::builder()
			.user_agent(user_agent())
			.default_headers(headers)
			.timeout(timeout)
			.build()?;

		Ok(Self { client, endpoint })
	}

	/// Creates a transport reusing an existing client.
	pub fn with_client(client: Client, endpoint: reqwest::Url) -> Self {
		Self { client, endpoint }
	}

	pub fn endpoint(&self) -> &reqwest::Url {
		&self.endpoint
	}
}

#[async_trait::async_trait]
impl LogTransport for HttpTransport {
	async fn send_batch(&self, batch: &[LogPayload]) -> Result<()> {
		debug!(
			url = %self.endpoint,
			count = batch.len(),
			"Sending log batch"
		);

		let response = self
			.client
			.post(self.endpoint.clone())
			.json(batch)
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			return Err(TelemetryError::ServerError {
				status: status.as_u16(),
				message: response.text().await.unwrap_or_default(),
			});
		}

		Ok(())
	}
}

/// `loom-telemetry/{version}`.
pub fn user_agent() -> String {
	format!("{SDK_NAME}/{SDK_VERSION}")
}
