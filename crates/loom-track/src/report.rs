// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error reporting: the persistent error segment plus an optional external
//! sink.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use loom_track_core::{Clock, SegmentKind, SystemClock};
use tracing::{error, warn};

use crate::error::TrackError;
use crate::queue::LogStore;

/// External error-reporting sink, notified of every reported error.
///
/// Reporting is best effort: a sink that panics is logged and ignored.
pub trait ErrorReporter: Send + Sync {
	fn report(&self, error: &TrackError);
}

/// Writes error records and forwards them to the sink.
#[derive(Clone)]
pub struct ErrorLog {
	store: LogStore,
	sink: Option<Arc<dyn ErrorReporter>>,
	clock: Arc<dyn Clock>,
	emit_to_console: bool,
}

impl ErrorLog {
	pub fn new(store: LogStore, emit_to_console: bool) -> Self {
		Self {
			store,
			sink: None,
			clock: Arc::new(SystemClock),
			emit_to_console,
		}
	}

	pub fn with_sink(mut self, sink: Arc<dyn ErrorReporter>) -> Self {
		self.sink = Some(sink);
		self
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	/// Reports an error.
	///
	/// [`TrackError::Uninitialized`] is not written to disk: an
	/// uninitialized session must not touch the log directory.
	pub fn report(&self, err: &TrackError) {
		if self.emit_to_console {
			error!(error = %err, "Tracking error");
		}
		if !matches!(err, TrackError::Uninitialized) {
			let record = format!("{} {}", self.stamp(), err);
			self.store.append_audit(SegmentKind::Error, &record);
		}
		self.notify(err);
	}

	/// Reports a failure to handle a specific queued line.
	pub fn report_line(&self, err: &TrackError, line: &str) {
		if self.emit_to_console {
			error!(error = %err, line = %line, "Tracking error");
		}
		let record = format!("{} {}: {}", self.stamp(), err, line);
		self.store.append_audit(SegmentKind::Error, &record);
		self.notify(err);
	}

	fn stamp(&self) -> String {
		format!("<{}>", self.clock.now().format("%c"))
	}

	fn notify(&self, err: &TrackError) {
		let Some(sink) = &self.sink else {
			return;
		};
		if catch_unwind(AssertUnwindSafe(|| sink.report(err))).is_err() {
			warn!("Error reporter panicked; ignoring");
		}
	}
}

impl std::fmt::Debug for ErrorLog {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ErrorLog")
			.field("store", &self.store)
			.field("has_sink", &self.sink.is_some())
			.field("emit_to_console", &self.emit_to_console)
			.finish()
	}
}
