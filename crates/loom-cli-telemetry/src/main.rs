// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reads lines from stdin and ships each one through the telemetry pipeline.
//!
//! Useful for smoke-testing a collector:
//!
//! ```text
//! printf 'hello\nworld\n' | loom-telemetry-tail --endpoint http://localhost:4318/logs
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use loom_telemetry::{
	load_config, load_config_with_file, Level, LogRecord, Logger, TelemetryConfig,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "loom-telemetry-tail", version, about)]
struct Args {
	/// Telemetry config file (defaults to the user config directory).
	#[arg(long, env = "LOOM_TELEMETRY_CONFIG")]
	config: Option<PathBuf>,

	/// Level every line is logged at.
	#[arg(long, default_value = "info", value_parser = parse_level)]
	level: Level,

	/// Collector URL; enables remote delivery.
	#[arg(long)]
	endpoint: Option<String>,

	/// Attach a code to every record.
	#[arg(long)]
	code: Option<String>,

	/// Flush buffered records before exiting (the default).
	#[arg(long, overrides_with = "no_drain")]
	drain: bool,

	/// Exit without flushing buffered records.
	#[arg(long = "no-drain", overrides_with = "drain")]
	no_drain: bool,
}

impl Args {
	fn drain(&self) -> bool {
		self.drain || !self.no_drain
	}
}

fn parse_level(value: &str) -> Result<Level, String> {
	value.parse().map_err(|e| format!("{e}"))
}

fn resolve_config(args: &Args) -> Result<TelemetryConfig> {
	let mut config = match &args.config {
		Some(path) => load_config_with_file(path)
			.with_context(|| format!("loading telemetry config from {}", path.display()))?,
		None => load_config().context("loading telemetry config")?,
	};

	if let Some(endpoint) = &args.endpoint {
		config.endpoint = Some(endpoint.clone());
		config.remote_enabled = true;
	}
	config.validate().context("invalid telemetry configuration")?;

	Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	let args = Args::parse();
	let config = resolve_config(&args)?;
	let logger = Logger::new(config).context("starting telemetry logger")?;

	if logger.is_remote_active() && !logger.wait_ready(std::time::Duration::from_secs(5)).await {
		debug!("flusher did not answer the handshake in time");
	}

	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut count = 0usize;
	while let Some(line) = lines.next_line().await.context("reading stdin")? {
		if line.is_empty() {
			continue;
		}
		let mut record = LogRecord::builder(args.level, line).context("source", "stdin");
		if let Some(code) = &args.code {
			record = record.code(code.clone());
		}
		logger.log(record);
		count += 1;
	}

	let report = logger.shutdown(args.drain()).await;
	let stats = logger.stats();
	info!(
		lines = count,
		sent = stats.records_sent,
		lost = report.lost,
		"Finished"
	);
	eprintln!("lost: {}", report.lost);

	if report.lost > 0 {
		bail!("{} log record(s) were not delivered", report.lost);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn test_cli_definition_is_valid() {
		Args::command().debug_assert();
	}

	#[test]
	fn test_defaults() {
		let args = Args::try_parse_from(["loom-telemetry-tail"]).unwrap();
		assert_eq!(args.level, Level::Info);
		assert!(args.drain());
		assert!(args.endpoint.is_none());
	}

	#[test]
	fn test_no_drain_and_level() {
		let args =
			Args::try_parse_from(["loom-telemetry-tail", "--no-drain", "--level", "WARNING"]).unwrap();
		assert_eq!(args.level, Level::Warn);
		assert!(!args.drain());
	}

	#[test]
	fn test_rejects_unknown_level() {
		assert!(Args::try_parse_from(["loom-telemetry-tail", "--level", "loud"]).is_err());
	}

	#[test]
	fn test_endpoint_enables_remote() {
		let dir = std::env::temp_dir().join("loom-telemetry-tail-test-missing.toml");
		let args = Args::try_parse_from([
			"loom-telemetry-tail",
			"--config",
			dir.to_str().unwrap(),
			"--endpoint",
			"http://localhost:4318/logs",
		])
		.unwrap();

		let config = resolve_config(&args).unwrap();
		assert!(config.remote_enabled);
		assert_eq!(config.endpoint.as_deref(), Some("http://localhost:4318/logs"));
	}

	#[test]
	fn test_bad_endpoint_is_rejected() {
		let dir = std::env::temp_dir().join("loom-telemetry-tail-test-missing.toml");
		let args = Args::try_parse_from([
			"loom-telemetry-tail",
			"--config",
			dir.to_str().unwrap(),
			"--endpoint",
			"localhost",
		])
		.unwrap();

		assert!(resolve_config(&args).is_err());
	}
}
