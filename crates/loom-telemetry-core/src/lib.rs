// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom telemetry pipeline.
//!
//! This crate holds the pure, I/O-free parts of the pipeline and is shared by
//! the runtime crate (`loom-telemetry`) and anything that needs to speak the
//! flusher protocol:
//!
//! - [`Level`] and [`should_emit`]: the severity ordering and threshold check
//! - [`LogRecord`] and [`ErrorInfo`]: one logging call's payload
//! - [`RedactionRuleSet`]: path-based censorship applied before transmission
//! - [`Command`] and [`FlusherEvent`]: the handshake/lifecycle protocol

pub mod error;
pub mod level;
pub mod protocol;
pub mod record;
pub mod redact;

pub use error::ProtocolError;
pub use level::{should_emit, Level};
pub use protocol::{Command, FlusherEvent, LogPayload};
pub use record::{ErrorInfo, LogRecord, LogRecordBuilder};
pub use redact::{RedactionRuleSet, CENSOR, DEFAULT_REDACTED_FIELDS};
