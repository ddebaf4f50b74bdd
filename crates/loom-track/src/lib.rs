// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Disk-queued event tracking agent.
//!
//! Events are encoded into query lines and either delivered inline or, in
//! cron mode, appended to a pending segment in the log directory. A
//! separately triggered [`Drainer`] later replays pending lines over HTTP,
//! re-queueing any line that fails so nothing is lost.
//!
//! # Example
//!
//! ```ignore
//! use loom_track::{Properties, Session, SessionOptions, Tracker};
//!
//! let session = Session::init(
//!     "KM_KEY",
//!     SessionOptions::new().log_dir("/var/log/tracking").use_cron(true),
//! );
//! let tracker = Tracker::new(session)?;
//!
//! tracker
//!     .record("bob", "Signup", Properties::new().insert("plan", "pro"))
//!     .await?;
//!
//! // Later, from a scheduled job:
//! let reports = tracker.drainer().drain_pending().await;
//! ```

mod client;
mod delivery;
mod drain;
mod error;
mod queue;
mod report;
mod session;

pub use client::{Dispatch, Identified, Tracker, TrackerBuilder};
pub use delivery::{normalize_host, Delivered, DeliveryClient, HttpTransport, Transport};
pub use drain::{DrainReport, Drainer};
pub use error::{BoxError, ConfigError, Result, TrackError};
pub use queue::{LogStore, Snapshot};
pub use report::{ErrorLog, ErrorReporter};
pub use session::{
	ambient_environment, resolve_environment, Session, SessionOptions, DEFAULT_ENVIRONMENT,
	DEFAULT_HOST, DEFAULT_LOG_DIR, DEFAULT_REQUEST_TIMEOUT, ENVIRONMENT_VAR,
};

pub use loom_track_core::{
	Clock, EncodedQuery, Event, FixedClock, Properties, QueryType, SegmentKind, SegmentLayout,
	SystemClock,
};
