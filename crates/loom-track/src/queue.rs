// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! File-backed event queue.
//!
//! The pending segment on disk *is* the queue; there is no in-process
//! state. Writers serialize on an exclusive advisory lock for the length of
//! one line. A drain claims the whole pending segment by renaming it to a
//! uniquely named `sending` snapshot, after which new appends land in a
//! fresh pending file while the drain reads the frozen snapshot.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use loom_track_core::{Clock, SegmentKind, SegmentLayout};
use tracing::{debug, info, warn};

use crate::error::{Result, TrackError};
use crate::session::Session;

/// How many times an append reopens a pending segment that a concurrent
/// drain renamed out from under it.
const MAX_REOPEN_ATTEMPTS: usize = 8;

/// A pending segment claimed for draining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
	/// Path of the renamed `sending` file.
	pub path: PathBuf,
	/// Which pending segment the snapshot was taken from.
	pub source: SegmentKind,
	/// The `sending` segment the snapshot now lives in.
	pub segment: SegmentKind,
}

/// Appends to and claims queue segments under one log directory.
#[derive(Debug, Clone)]
pub struct LogStore {
	layout: SegmentLayout,
}

impl LogStore {
	pub fn new(layout: SegmentLayout) -> Self {
		Self { layout }
	}

	pub fn from_session(session: &Session) -> Self {
		Self::new(session.layout())
	}

	pub fn layout(&self) -> &SegmentLayout {
		&self.layout
	}

	pub fn path(&self, kind: SegmentKind) -> PathBuf {
		self.layout.path(kind)
	}

	/// Appends one line to a segment under an exclusive lock.
	///
	/// The legacy pending segment and `sending` snapshots are read-only.
	pub fn append(&self, kind: SegmentKind, line: &str) -> Result<()> {
		let path = self.path(kind);
		let writable = match kind {
			SegmentKind::QueryLegacy => self.layout.legacy_is_current(),
			SegmentKind::Sending { .. } => false,
			_ => true,
		};
		if !writable {
			return Err(TrackError::io(
				&path,
				io::Error::new(io::ErrorKind::PermissionDenied, "segment is read-only"),
			));
		}
		append_line(&path, line).map_err(|source| TrackError::io(&path, source))
	}

	/// Best-effort append to an audit segment (`sent`, `error`); failures
	/// are logged and dropped.
	pub fn append_audit(&self, kind: SegmentKind, line: &str) {
		if let Err(e) = self.append(kind, line) {
			warn!(error = %e, "Failed to write audit record");
		}
	}

	/// Claims the next pending segment for draining.
	///
	/// The legacy segment is preferred; otherwise the environment-scoped
	/// one. Returns `None` when neither exists. A rename that loses the race
	/// to another drain counts as not found.
	pub fn claim_pending(&self, clock: &dyn Clock) -> Result<Option<Snapshot>> {
		let candidates: &[SegmentKind] = if self.layout.legacy_is_current() {
			&[SegmentKind::Query]
		} else {
			&[SegmentKind::QueryLegacy, SegmentKind::Query]
		};

		for &source in candidates {
			let pending = self.path(source);
			if !pending.exists() {
				continue;
			}

			let segment = SegmentKind::Sending {
				created_at: clock.unix_now(),
				id: fastrand::u64(..),
			};
			let path = self.path(segment);

			match fs::rename(&pending, &path) {
				Ok(()) => {
					settle(&path).map_err(|source| TrackError::io(&path, source))?;
					info!(
						pending = %pending.display(),
						snapshot = %path.display(),
						"Claimed pending segment"
					);
					return Ok(Some(Snapshot {
						path,
						source,
						segment,
					}));
				}
				Err(e) if e.kind() == io::ErrorKind::NotFound => {
					debug!(pending = %pending.display(), "Pending segment claimed concurrently");
					continue;
				}
				Err(e) => return Err(TrackError::io(&pending, e)),
			}
		}

		Ok(None)
	}
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
	let mut record = String::with_capacity(line.len() + 1);
	record.push_str(line);
	record.push('\n');

	for _ in 0..MAX_REOPEN_ATTEMPTS {
		let mut file = OpenOptions::new().create(true).append(true).open(path)?;
		FileExt::lock_exclusive(&file)?;

		if !still_linked(&file, path)? {
			FileExt::unlock(&file)?;
			continue;
		}

		let written = file
			.write_all(record.as_bytes())
			.and_then(|()| file.sync_data());
		FileExt::unlock(&file)?;
		return written;
	}

	Err(io::Error::new(
		io::ErrorKind::Other,
		"segment was repeatedly claimed while appending",
	))
}

/// Waits out any writer that locked the segment before it was renamed.
fn settle(path: &Path) -> io::Result<()> {
	let file = File::open(path)?;
	FileExt::lock_exclusive(&file)?;
	FileExt::unlock(&file)
}

/// Whether `file` is still the file at `path`. A drain may have renamed the
/// segment between our open and our lock.
#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> io::Result<bool> {
	use std::os::unix::fs::MetadataExt;

	let held = file.metadata()?;
	match fs::metadata(path) {
		Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
		Err(e) => Err(e),
	}
}

#[cfg(not(unix))]
fn still_linked(_file: &File, _path: &Path) -> io::Result<bool> {
	Ok(true)
}
