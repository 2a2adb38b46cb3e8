// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the telemetry core.

use thiserror::Error;

/// Errors raised while decoding protocol messages or parsing core values.
#[derive(Debug, Error)]
pub enum ProtocolError {
	#[error("malformed message: {0}")]
	Malformed(#[from] serde_json::Error),

	#[error("unknown message type: {0}")]
	UnknownType(String),

	#[error("invalid log level: {0}")]
	InvalidLevel(String),
}
