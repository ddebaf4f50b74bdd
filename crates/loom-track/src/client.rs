// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracker facade for recording events, setting properties and aliasing
//! identities.

use std::sync::Arc;

use loom_track_core::{encode, Clock, EncodedQuery, Event, Properties, SegmentKind, SystemClock};
use tracing::{debug, info};

use crate::delivery::{DeliveryClient, HttpTransport, Transport};
use crate::drain::Drainer;
use crate::error::{Result, TrackError};
use crate::queue::LogStore;
use crate::report::{ErrorLog, ErrorReporter};
use crate::session::Session;

/// Where an event ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
	/// Appended to the pending segment for a later drain.
	Queued,
	/// Delivered inline (or simulated in dryrun).
	Delivered,
}

/// Builder for constructing a [`Tracker`].
pub struct TrackerBuilder {
	session: Session,
	transport: Option<Arc<dyn Transport>>,
	clock: Option<Arc<dyn Clock>>,
	reporter: Option<Arc<dyn ErrorReporter>>,
}

impl TrackerBuilder {
	pub fn new(session: Session) -> Self {
		Self {
			session,
			transport: None,
			clock: None,
			reporter: None,
		}
	}

	/// Replaces the HTTP transport, e.g. with a test double.
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Sets the clock used for `_t` and error record timestamps.
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);
		self
	}

	/// Sets the external sink notified of every reported error.
	pub fn reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
		self.reporter = Some(reporter);
		self
	}

	pub fn build(self) -> Result<Tracker> {
		let transport: Arc<dyn Transport> = match self.transport {
			Some(transport) => transport,
			None => Arc::new(HttpTransport::from_session(&self.session)?),
		};
		let clock: Arc<dyn Clock> = match self.clock {
			Some(clock) => clock,
			None => Arc::new(SystemClock),
		};

		let store = LogStore::from_session(&self.session);
		let delivery = DeliveryClient::new(transport, store.clone(), self.session.dryrun());
		let mut errors =
			ErrorLog::new(store.clone(), self.session.emit_to_console()).with_clock(clock.clone());
		if let Some(reporter) = self.reporter {
			errors = errors.with_sink(reporter);
		}

		info!(
			host = %self.session.host(),
			environment = %self.session.environment(),
			use_cron = self.session.use_cron(),
			"Tracker initialized"
		);

		Ok(Tracker {
			session: self.session,
			store,
			delivery,
			errors,
			clock,
		})
	}
}

/// Records events for one [`Session`].
///
/// In cron mode every event is appended to the pending segment and left for
/// a [`Drainer`]. Otherwise events are delivered inline and only queued when
/// delivery fails.
pub struct Tracker {
	session: Session,
	store: LogStore,
	delivery: DeliveryClient,
	errors: ErrorLog,
	clock: Arc<dyn Clock>,
}

impl Tracker {
	/// Tracker delivering over HTTP with the system clock.
	pub fn new(session: Session) -> Result<Self> {
		TrackerBuilder::new(session).build()
	}

	pub fn builder(session: Session) -> TrackerBuilder {
		TrackerBuilder::new(session)
	}

	pub fn session(&self) -> &Session {
		&self.session
	}

	/// Records a named event for `subject`.
	pub async fn record(
		&self,
		subject: impl Into<String>,
		name: impl Into<String>,
		properties: Properties,
	) -> Result<Dispatch> {
		self.dispatch(Event::record(subject, name, properties)).await
	}

	/// Sets properties on `subject`.
	pub async fn set(
		&self,
		subject: impl Into<String>,
		properties: Properties,
	) -> Result<Dispatch> {
		self.dispatch(Event::set(subject, properties)).await
	}

	/// Links two identities.
	pub async fn alias(
		&self,
		name: impl Into<String>,
		alias_to: impl Into<String>,
	) -> Result<Dispatch> {
		self.dispatch(Event::alias(name, alias_to)).await
	}

	/// Binds a subject so later calls need not repeat it. Sends nothing.
	pub fn identify(&self, subject: impl Into<String>) -> Identified<'_> {
		Identified {
			tracker: self,
			subject: subject.into(),
		}
	}

	/// A drainer sharing this tracker's store, transport and error log.
	pub fn drainer(&self) -> Drainer {
		Drainer::new(
			self.store.clone(),
			self.delivery.clone(),
			self.errors.clone(),
			self.clock.clone(),
		)
	}

	async fn dispatch(&self, event: Event) -> Result<Dispatch> {
		let Some(options) = self.session.encode_options() else {
			let err = TrackError::Uninitialized;
			self.errors.report(&err);
			return Err(err);
		};

		let query = encode(event, &options, self.clock.as_ref());
		if self.session.use_cron() {
			return self.enqueue(&query);
		}

		match self.delivery.deliver(&query).await {
			Ok(delivered) => {
				debug!(query = %query, ?delivered, "Delivered inline");
				Ok(Dispatch::Delivered)
			}
			Err(e) => {
				let queued = self.enqueue(&query);
				self.errors.report(&e);
				queued
			}
		}
	}

	fn enqueue(&self, query: &EncodedQuery) -> Result<Dispatch> {
		match self.store.append(SegmentKind::Query, query.as_str()) {
			Ok(()) => Ok(Dispatch::Queued),
			Err(e) => {
				self.errors.report(&e);
				Err(e)
			}
		}
	}
}

impl std::fmt::Debug for Tracker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Tracker")
			.field("session", &self.session)
			.field("store", &self.store)
			.finish_non_exhaustive()
	}
}

/// A [`Tracker`] bound to one subject by [`Tracker::identify`].
#[derive(Debug)]
pub struct Identified<'a> {
	tracker: &'a Tracker,
	subject: String,
}

impl Identified<'_> {
	pub fn subject(&self) -> &str {
		&self.subject
	}

	pub async fn record(
		&self,
		name: impl Into<String>,
		properties: Properties,
	) -> Result<Dispatch> {
		self.tracker
			.record(self.subject.clone(), name, properties)
			.await
	}

	pub async fn set(&self, properties: Properties) -> Result<Dispatch> {
		self.tracker.set(self.subject.clone(), properties).await
	}
}
