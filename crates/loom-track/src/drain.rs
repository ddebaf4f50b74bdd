// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Drain engine: replays a claimed snapshot through the delivery client.
//!
//! A pass claims one pending segment, delivers it line by line, re-queues
//! every line that fails into the current pending segment and finally
//! removes the snapshot. One failing line never stops the lines after it.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use loom_track_core::{Clock, EncodedQuery, SegmentKind, SystemClock};
use tracing::{debug, error, info, instrument, warn};

use crate::delivery::{DeliveryClient, HttpTransport};
use crate::error::{Result, TrackError};
use crate::queue::{LogStore, Snapshot};
use crate::report::ErrorLog;
use crate::session::Session;

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
	/// The snapshot drained, if a pending segment was found.
	pub snapshot: Option<PathBuf>,
	/// Which pending segment the snapshot was claimed from.
	pub source: Option<SegmentKind>,
	/// Lines the host accepted (or dryrun simulated).
	pub delivered: usize,
	/// Lines that failed and were appended back to the pending segment.
	pub requeued: usize,
	/// Lines that failed and could not be re-queued either. Each one is
	/// written to the error segment together with the line.
	pub lost: usize,
	/// Lines no retry can deliver (not valid UTF-8, or a permanent
	/// failure). Written to the error segment instead of the queue.
	pub dropped: usize,
	/// Whether the snapshot was deleted at the end of the pass.
	pub snapshot_removed: bool,
}

impl DrainReport {
	/// No pending segment was found.
	pub fn is_empty(&self) -> bool {
		self.snapshot.is_none()
	}

	/// Lines read from the snapshot.
	pub fn attempted(&self) -> usize {
		self.delivered + self.requeued + self.lost + self.dropped
	}
}

/// Drains pending segments of one log directory.
#[derive(Clone)]
pub struct Drainer {
	store: LogStore,
	delivery: DeliveryClient,
	errors: ErrorLog,
	clock: Arc<dyn Clock>,
}

impl Drainer {
	pub fn new(
		store: LogStore,
		delivery: DeliveryClient,
		errors: ErrorLog,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self {
			store,
			delivery,
			errors,
			clock,
		}
	}

	/// Drainer delivering over HTTP to the session host.
	///
	/// No project key is needed: queued lines already carry their `_k`.
	pub fn from_session(session: &Session) -> Result<Self> {
		let store = LogStore::from_session(session);
		let transport = HttpTransport::from_session(session)?;
		let delivery = DeliveryClient::new(Arc::new(transport), store.clone(), session.dryrun());
		let errors = ErrorLog::new(store.clone(), session.emit_to_console());
		Ok(Self::new(store, delivery, errors, Arc::new(SystemClock)))
	}

	pub fn store(&self) -> &LogStore {
		&self.store
	}

	/// Performs exactly one pass over one claimed snapshot.
	///
	/// Never fails: claim, read and delete errors are reported to the error
	/// log and reflected in the returned report.
	#[instrument(skip(self), fields(log_dir = %self.store.layout().log_dir().display()))]
	pub async fn drain(&self) -> DrainReport {
		let snapshot = match self.store.claim_pending(self.clock.as_ref()) {
			Ok(Some(snapshot)) => snapshot,
			Ok(None) => {
				debug!("No pending segment to drain");
				return DrainReport::default();
			}
			Err(e) => {
				self.errors.report(&e);
				return DrainReport::default();
			}
		};

		self.drain_snapshot(snapshot).await
	}

	/// Drains the legacy segment and then the current one, so both are
	/// emptied in a single run.
	///
	/// The second pass only runs when the first drained the legacy segment
	/// without re-queueing anything; otherwise it would immediately retry
	/// the lines that just failed.
	pub async fn drain_pending(&self) -> Vec<DrainReport> {
		let first = self.drain().await;
		if first.is_empty() {
			return Vec::new();
		}

		let retry_current = first.source == Some(SegmentKind::QueryLegacy)
			&& first.requeued == 0
			&& first.lost == 0;
		let mut reports = vec![first];
		if retry_current {
			let second = self.drain().await;
			if !second.is_empty() {
				reports.push(second);
			}
		}
		reports
	}

	async fn drain_snapshot(&self, snapshot: Snapshot) -> DrainReport {
		let mut report = DrainReport {
			snapshot: Some(snapshot.path.clone()),
			source: Some(snapshot.source),
			..DrainReport::default()
		};

		let file = match File::open(&snapshot.path) {
			Ok(file) => file,
			Err(e) => {
				self.errors.report(&TrackError::io(&snapshot.path, e));
				return report;
			}
		};

		let mut reader = BufReader::new(file);
		let mut buf = Vec::new();
		loop {
			buf.clear();
			match reader.read_until(b'\n', &mut buf) {
				Ok(0) => break,
				Ok(_) => {}
				Err(e) => {
					error!(
						snapshot = %snapshot.path.display(),
						error = %e,
						"Snapshot read failed; leaving it in place"
					);
					self.errors.report(&TrackError::io(&snapshot.path, e));
					return report;
				}
			}

			let line = match std::str::from_utf8(&buf) {
				Ok(line) => line,
				Err(e) => {
					let lossy = String::from_utf8_lossy(&buf);
					let err = TrackError::Encoding(format!("line is not valid UTF-8: {e}"));
					self.drop_line(lossy.trim_end_matches(['\r', '\n']), &err, &mut report);
					continue;
				}
			};

			let query = EncodedQuery::from_line(line);
			if query.as_str().trim().is_empty() {
				continue;
			}

			match self.delivery.deliver(&query).await {
				Ok(_) => report.delivered += 1,
				Err(e) => self.recover(&query, &e, &mut report),
			}
		}

		match fs::remove_file(&snapshot.path) {
			Ok(()) => report.snapshot_removed = true,
			Err(e) => {
				error!(
					snapshot = %snapshot.path.display(),
					error = %e,
					"Failed to remove drained snapshot; its lines may be sent again"
				);
				self.errors.report(&TrackError::io(&snapshot.path, e));
			}
		}

		info!(
			snapshot = %snapshot.path.display(),
			delivered = report.delivered,
			requeued = report.requeued,
			lost = report.lost,
			dropped = report.dropped,
			"Drain pass complete"
		);
		report
	}

	/// Puts a line whose delivery may succeed later back on the pending
	/// segment, then records why it failed.
	fn recover(&self, query: &EncodedQuery, cause: &TrackError, report: &mut DrainReport) {
		if !cause.is_transient() {
			self.drop_line(query.as_str(), cause, report);
			return;
		}

		match self.store.append(SegmentKind::Query, query.as_str()) {
			Ok(()) => report.requeued += 1,
			Err(requeue) => {
				warn!(error = %requeue, line = %query, "Failed to re-queue line");
				self.errors.report_line(&requeue, query.as_str());
				report.lost += 1;
			}
		}
		self.errors.report_line(cause, query.as_str());
	}

	fn drop_line(&self, line: &str, cause: &TrackError, report: &mut DrainReport) {
		warn!(error = %cause, line = %line, "Dropping line that cannot be delivered");
		self.errors.report_line(cause, line);
		report.dropped += 1;
	}
}

impl std::fmt::Debug for Drainer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Drainer")
			.field("store", &self.store)
			.field("delivery", &self.delivery)
			.finish_non_exhaustive()
	}
}
