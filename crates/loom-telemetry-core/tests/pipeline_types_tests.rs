// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_telemetry_core::{
	should_emit, Command, ErrorInfo, Level, LogPayload, LogRecord, RedactionRuleSet, CENSOR,
};

#[test]
fn test_threshold_blocks_info_under_warn() {
	assert!(!should_emit(Level::Info, Level::Warn));
	assert!(should_emit(Level::Warn, Level::Warn));
	assert!(should_emit(Level::Error, Level::Warn));
}

#[test]
fn test_payload_keeps_error_but_censors_context() {
	let record = LogRecord::builder(Level::Error, "card charge failed")
		.code("PAY_042")
		.error(ErrorInfo::new("GatewayError", "timeout"))
		.context("cardNumber", "4111111111111111")
		.context("url", "/checkout/pay")
		.build();

	let payload = LogPayload::from_record(&record, &RedactionRuleSet::default());
	let value = payload.as_value();

	assert_eq!(value["code"], "PAY_042");
	assert_eq!(value["error"]["name"], "GatewayError");
	assert_eq!(value["context"]["cardNumber"], CENSOR);
	assert_eq!(value["context"]["url"], "/checkout/pay");
}

#[test]
fn test_log_command_survives_encoding() {
	let record = LogRecord::builder(Level::Warn, "slow response")
		.context("token", "abc")
		.build();
	let payload = LogPayload::from_record(&record, &RedactionRuleSet::default());
	let command = Command::Log {
		payload: payload.clone(),
	};

	let decoded = Command::decode(&command.encode().unwrap()).unwrap();

	assert_eq!(decoded, Command::Log { payload });
}

#[test]
fn test_redaction_does_not_touch_record() {
	let record = LogRecord::builder(Level::Info, "profile updated")
		.context("phone", "555-0100")
		.build();

	let _ = LogPayload::from_record(&record, &RedactionRuleSet::default());

	assert_eq!(record.context["phone"], "555-0100");
}
