// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use loom_track::{resolve_environment, SessionOptions, ENVIRONMENT_VAR};

/// Environments that are only drained when `--force` is given.
const LOCAL_ENVIRONMENTS: &[&str] = &["development", "test"];

/// Deliver queued tracking events from a log directory.
#[derive(Parser, Debug)]
#[command(name = "loom-track-send", version)]
pub struct Args {
	/// Directory holding the queue segments
	pub log_dir: PathBuf,

	/// Collection host, e.g. https://trk.kissmetrics.io
	pub host: String,

	/// Environment whose segments are drained
	#[arg(short, long, env = ENVIRONMENT_VAR)]
	pub environment: Option<String>,

	/// Drain local environments (development, test) too
	#[arg(short, long)]
	pub force: bool,

	/// Record lines as sent without contacting the host
	#[arg(long)]
	pub dry_run: bool,

	/// Log file name prefix
	#[arg(long)]
	pub prefix: Option<String>,

	/// TOML file with session options; flags take precedence
	#[arg(long)]
	pub config: Option<PathBuf>,

	/// Per-request timeout in seconds
	#[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
	pub timeout: Option<u64>,
}

impl Args {
	/// Options set on the command line.
	pub fn options(&self) -> SessionOptions {
		let mut options = SessionOptions::new()
			.log_dir(self.log_dir.clone())
			.host(self.host.clone());
		if let Some(env) = &self.environment {
			options = options.environment(env.clone());
		}
		if self.dry_run {
			options = options.dryrun(true);
		}
		if let Some(prefix) = &self.prefix {
			options = options.log_prefix(prefix.clone());
		}
		if let Some(secs) = self.timeout {
			options = options.request_timeout(Duration::from_secs(secs));
		}
		options
	}

	/// Whether `environment` may be drained with the given flags.
	pub fn should_drain(&self, environment: &str) -> bool {
		self.force || !LOCAL_ENVIRONMENTS.contains(&environment)
	}
}

/// Environment the options resolve to, falling back to the ambient variable.
pub fn environment_of(options: &SessionOptions, ambient: Option<&str>) -> String {
	resolve_environment(options.environment.as_deref(), ambient)
}
