// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use loom_telemetry::{FlusherEvent, Level, LogRecord, Logger, TelemetryConfig};
use serde_json::Value;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(endpoint: String, flush_limit: usize) -> TelemetryConfig {
	TelemetryConfig {
		min_level: Level::Info,
		console_enabled: false,
		remote_enabled: true,
		flush_limit,
		flush_interval: Duration::from_secs(3600),
		endpoint: Some(endpoint),
		app_name: "storefront".to_string(),
		environment: "test".to_string(),
		..Default::default()
	}
}

#[tokio::test]
async fn test_batches_are_posted_redacted() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/logs"))
		.and(header("content-type", "application/json"))
		.respond_with(ResponseTemplate::new(200))
		.mount(&server)
		.await;

	let logger = Logger::new(config(format!("{}/v1/logs", server.uri()), 2)).unwrap();
	logger.log(
		LogRecord::builder(Level::Info, "login")
			.context("email", "bob@example.com")
			.context("url", "/account"),
	);
	logger.warn("slow checkout");

	assert_eq!(logger.shutdown(true).await.lost, 0);

	let requests = server.received_requests().await.unwrap();
	assert_eq!(requests.len(), 1);

	let user_agent = requests[0]
		.headers
		.get("user-agent")
		.and_then(|v| v.to_str().ok())
		.unwrap_or_default()
		.to_string();
	assert!(user_agent.starts_with("loom-telemetry/"));

	let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
	let batch = body.as_array().unwrap();
	assert_eq!(batch.len(), 2);
	assert_eq!(batch[0]["message"], "login");
	assert_eq!(batch[0]["level"], "info");
	assert_eq!(batch[0]["context"]["email"], "[REDACTED]");
	assert_eq!(batch[0]["context"]["url"], "/account");
	assert_eq!(batch[0]["context"]["app_name"], "storefront");
	assert_eq!(batch[0]["context"]["environment"], "test");
	assert!(batch[0]["timestamp"].is_string());
	assert_eq!(batch[1]["level"], "warn");
}

#[tokio::test]
async fn test_server_error_requeues_and_reports() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(500).set_body_string("boom"))
		.mount(&server)
		.await;

	let logger = Logger::new(config(server.uri(), 10)).unwrap();
	let mut events = logger.subscribe().unwrap();

	logger.info("one");
	logger.flush();

	let event = tokio::time::timeout(Duration::from_secs(5), async {
		loop {
			match events.recv().await {
				Ok(event @ FlusherEvent::Error { .. }) => return event,
				Ok(_) => continue,
				Err(e) => panic!("event stream failed: {e}"),
			}
		}
	})
	.await
	.unwrap();

	match event {
		FlusherEvent::Error { error, requeued } => {
			assert_eq!(requeued, 1);
			assert!(error.contains("500"));
		}
		other => panic!("unexpected event {other:?}"),
	}

	assert_eq!(logger.shutdown(false).await.lost, 1);
}

#[tokio::test]
async fn test_drain_on_shutdown_delivers_buffer() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(204))
		.expect(1)
		.mount(&server)
		.await;

	let logger = Logger::new(config(server.uri(), 100)).unwrap();
	for i in 0..5 {
		logger.info(format!("buffered {i}"));
	}

	let report = logger.shutdown(true).await;
	assert_eq!(report.lost, 0);
	assert_eq!(logger.stats().records_sent, 5);
}
