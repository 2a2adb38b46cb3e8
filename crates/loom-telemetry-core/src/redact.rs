// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Path-based redaction of structured payloads.
//!
//! A rule is a dot-separated field path such as `password` or `*.token`.
//! Each segment matches one level of nesting; `*` matches any object key or
//! array element at that level. The value found at the end of a matching
//! path is replaced with the censor token. Everything else, including key
//! order, is left untouched.

use serde_json::Value;

/// Default censor token.
pub const CENSOR: &str = "[REDACTED]";

/// Field names censored by the default rule set, both at the top level and
/// one level down (`*.<field>`).
pub const DEFAULT_REDACTED_FIELDS: &[&str] = &[
	"password",
	"token",
	"apiKey",
	"secret",
	"authorization",
	"creditCard",
	"cardNumber",
	"cvv",
	"ssn",
	"pin",
	"email",
	"phone",
	"address",
];

const WILDCARD: &str = "*";

/// An immutable set of redaction paths plus the censor replacement value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionRuleSet {
	paths: Vec<Vec<String>>,
	censor: String,
}

impl RedactionRuleSet {
	/// Creates a rule set from explicit paths (`a.b`, `*.c`).
	pub fn new<I, S>(paths: I, censor: impl Into<String>) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let paths = paths
			.into_iter()
			.map(|p| {
				p.as_ref()
					.split('.')
					.filter(|s| !s.is_empty())
					.map(str::to_string)
					.collect::<Vec<_>>()
			})
			.filter(|segments| !segments.is_empty())
			.collect();

		Self {
			paths,
			censor: censor.into(),
		}
	}

	/// Creates a rule set that censors each field at the top level and under
	/// any first-level key.
	pub fn for_fields<I, S>(fields: I, censor: impl Into<String>) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut paths = Vec::new();
		for field in fields {
			let field = field.as_ref();
			paths.push(field.to_string());
			paths.push(format!("{WILDCARD}.{field}"));
		}
		Self::new(paths, censor)
	}

	/// A rule set that censors nothing.
	pub fn empty() -> Self {
		Self {
			paths: Vec::new(),
			censor: CENSOR.to_string(),
		}
	}

	pub fn censor(&self) -> &str {
		&self.censor
	}

	/// The configured paths in dotted form.
	pub fn paths(&self) -> impl Iterator<Item = String> + '_ {
		self.paths.iter().map(|segments| segments.join("."))
	}

	pub fn is_empty(&self) -> bool {
		self.paths.is_empty()
	}

	/// Censors every matching location in `value` in place.
	///
	/// Returns the number of values replaced.
	pub fn redact(&self, value: &mut Value) -> usize {
		self.paths
			.iter()
			.map(|segments| redact_path(value, segments, &self.censor))
			.sum()
	}

	/// Returns a censored copy of `value`.
	pub fn redacted(&self, value: &Value) -> Value {
		let mut copy = value.clone();
		self.redact(&mut copy);
		copy
	}
}

impl Default for RedactionRuleSet {
	fn default() -> Self {
		Self::for_fields(DEFAULT_REDACTED_FIELDS.iter().copied(), CENSOR)
	}
}

fn redact_path(value: &mut Value, segments: &[String], censor: &str) -> usize {
	let Some((head, rest)) = segments.split_first() else {
		return 0;
	};

	match value {
		Value::Object(map) => {
			if head == WILDCARD {
				map.values_mut()
					.map(|child| apply(child, rest, censor))
					.sum()
			} else if let Some(child) = map.get_mut(head.as_str()) {
				apply(child, rest, censor)
			} else {
				0
			}
		}
		Value::Array(items) => {
			if head == WILDCARD {
				items.iter_mut().map(|child| apply(child, rest, censor)).sum()
			} else if let Some(child) = head.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
				apply(child, rest, censor)
			} else {
				0
			}
		}
		_ => 0,
	}
}

fn apply(child: &mut Value, rest: &[String], censor: &str) -> usize {
	if rest.is_empty() {
		*child = Value::String(censor.to_string());
		1
	} else {
		redact_path(child, rest, censor)
	}
}
