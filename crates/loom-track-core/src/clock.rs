// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Time source used for `_t` stamping and log file naming.

use chrono::{DateTime, TimeZone, Utc};

/// A source of the current time.
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;

	/// Current unix time in whole seconds.
	fn unix_now(&self) -> i64 {
		self.now().timestamp()
	}
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock pinned to a single instant, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
	pub fn new(at: DateTime<Utc>) -> Self {
		Self(at)
	}

	/// Pins the clock to a unix timestamp. Out-of-range values fall back to
	/// the epoch.
	pub fn at_unix(secs: i64) -> Self {
		Self(Utc.timestamp_opt(secs, 0).single().unwrap_or_default())
	}
}

impl Clock for FixedClock {
	fn now(&self) -> DateTime<Utc> {
		self.0
	}
}
