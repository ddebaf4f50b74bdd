// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Queue segment file naming.
//!
//! Layout under the log directory, for prefix `kissmetrics` and environment
//! `production`:
//!
//! ```text
//! kissmetrics_production_query.log    pending events (current)
//! kissmetrics_query.log               pending events (legacy, unscoped)
//! kissmetrics_production_sent.log     audit trail of dispatched lines
//! kissmetrics_production_error.log    audit trail of failures
//! 1700000000_9f3a..._kissmetrics_production_sending.log   snapshot being drained
//! ```

use std::path::{Path, PathBuf};

/// Default file name prefix.
pub const DEFAULT_PREFIX: &str = "kissmetrics";

/// Which queue segment a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
	/// Pending events for the current environment.
	Query,
	/// Pending events written before segments were environment-scoped.
	/// Only ever read, never written.
	QueryLegacy,
	/// A uniquely named snapshot claimed by one drain run.
	Sending { created_at: i64, id: u64 },
	/// Lines that were dispatched.
	Sent,
	/// Failure records.
	Error,
}

/// Pure mapping from `(log_dir, prefix, environment, kind)` to a file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentLayout {
	log_dir: PathBuf,
	prefix: String,
	environment: Option<String>,
}

impl SegmentLayout {
	pub fn new(
		log_dir: impl Into<PathBuf>,
		prefix: impl Into<String>,
		environment: Option<String>,
	) -> Self {
		Self {
			log_dir: log_dir.into(),
			prefix: prefix.into(),
			environment: environment.filter(|e| !e.is_empty()),
		}
	}

	pub fn log_dir(&self) -> &Path {
		&self.log_dir
	}

	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	pub fn environment(&self) -> Option<&str> {
		self.environment.as_deref()
	}

	fn env_suffix(&self) -> String {
		match &self.environment {
			Some(env) => format!("_{env}"),
			None => String::new(),
		}
	}

	pub fn file_name(&self, kind: SegmentKind) -> String {
		let scoped = format!("{}{}", self.prefix, self.env_suffix());
		match kind {
			SegmentKind::Query => format!("{scoped}_query.log"),
			SegmentKind::QueryLegacy => format!("{}_query.log", self.prefix),
			SegmentKind::Sent => format!("{scoped}_sent.log"),
			SegmentKind::Error => format!("{scoped}_error.log"),
			SegmentKind::Sending { created_at, id } => {
				format!("{created_at}_{id:x}_{scoped}_sending.log")
			}
		}
	}

	pub fn path(&self, kind: SegmentKind) -> PathBuf {
		self.log_dir.join(self.file_name(kind))
	}

	/// True when the legacy and current pending segments are the same file,
	/// which happens when no environment is configured.
	pub fn legacy_is_current(&self) -> bool {
		self.environment.is_none()
	}
}
