// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `loom-track-send`: one drain pass over a tracking log directory, meant
//! to be run from cron.

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use loom_track::{ambient_environment, Drainer, Session, SessionOptions};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use args::{environment_of, Args};

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.with_writer(std::io::stderr)
		.init();

	let args = Args::parse();

	let file_options = match &args.config {
		Some(path) => SessionOptions::load(path)
			.with_context(|| format!("loading config {}", path.display()))?,
		None => SessionOptions::new(),
	};
	let options = file_options.merge(args.options());

	let ambient = ambient_environment();
	let environment = environment_of(&options, ambient.as_deref());
	if !args.should_drain(&environment) {
		warn!(
			environment = %environment,
			"Refusing to drain a local environment without --force"
		);
		return Ok(());
	}

	// Queued lines already carry their project key.
	let session = Session::init_with_ambient("", options, ambient.as_deref());
	let drainer = Drainer::from_session(&session).context("building delivery client")?;

	let reports = drainer.drain_pending().await;
	let delivered: usize = reports.iter().map(|r| r.delivered).sum();
	let requeued: usize = reports.iter().map(|r| r.requeued).sum();
	let lost: usize = reports.iter().map(|r| r.lost).sum();
	let dropped: usize = reports.iter().map(|r| r.dropped).sum();

	info!(
		log_dir = %session.log_dir().display(),
		host = %session.host(),
		environment = %environment,
		passes = reports.len(),
		delivered,
		requeued,
		lost,
		dropped,
		"Drain finished"
	);
	Ok(())
}
