// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery of encoded queries to the collection host.

use std::sync::Arc;
use std::time::Duration;

use loom_common_http::{classify_status, is_transient_error, ResponseClass};
use loom_track_core::{EncodedQuery, SegmentKind};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::{Result, TrackError};
use crate::queue::LogStore;
use crate::session::Session;

/// Issues a single request for an encoded query.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
	/// Sends one GET whose path and query are exactly `query`, returning the
	/// response status. Failures to obtain any response are
	/// [`TrackError::Transport`].
	async fn get(&self, query: &EncodedQuery) -> Result<StatusCode>;

	/// The host requests are sent to, for error context.
	fn host(&self) -> &str;
}

/// Prepends `http://` when `host` has no scheme and strips trailing slashes.
pub fn normalize_host(host: &str) -> String {
	let host = host.trim().trim_end_matches('/');
	if host.contains("://") {
		host.to_string()
	} else {
		format!("http://{host}")
	}
}

/// [`Transport`] over reqwest. TLS is used when the host scheme is `https`.
pub struct HttpTransport {
	http_client: Client,
	base_url: String,
}

impl HttpTransport {
	pub fn new(host: &str, request_timeout: Duration) -> Result<Self> {
		let base_url = normalize_host(host);
		let http_client = loom_common_http::client_with_timeout(request_timeout)
			.map_err(|e| TrackError::transport(&base_url, e))?;

		Ok(Self {
			http_client,
			base_url,
		})
	}

	pub fn from_session(session: &Session) -> Result<Self> {
		Self::new(session.host(), session.request_timeout())
	}
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
	async fn get(&self, query: &EncodedQuery) -> Result<StatusCode> {
		let url = format!("{}{}", self.base_url, query.as_str());

		debug!(url = %url, "Delivering tracking query");

		let response = self.http_client.get(&url).send().await.map_err(|e| {
			debug!(error = %e, transient = is_transient_error(&e), "Delivery request failed");
			TrackError::transport(&self.base_url, e)
		})?;

		Ok(response.status())
	}

	fn host(&self) -> &str {
		&self.base_url
	}
}

/// How a query was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivered {
	/// The host accepted the request.
	Sent,
	/// Dryrun: recorded as sent without a network call.
	Simulated,
	/// The host refused the request outright. Sending it again cannot
	/// succeed, so it is audited as sent.
	Rejected { status: u16 },
}

/// Delivers queries and keeps the `sent` audit trail.
///
/// Delivery never retries; a failed line is handed back to the caller, which
/// decides whether to queue it.
#[derive(Clone)]
pub struct DeliveryClient {
	transport: Arc<dyn Transport>,
	store: LogStore,
	dryrun: bool,
}

impl DeliveryClient {
	pub fn new(transport: Arc<dyn Transport>, store: LogStore, dryrun: bool) -> Self {
		Self {
			transport,
			store,
			dryrun,
		}
	}

	pub fn is_dryrun(&self) -> bool {
		self.dryrun
	}

	pub async fn deliver(&self, query: &EncodedQuery) -> Result<Delivered> {
		if self.dryrun {
			self.store.append_audit(SegmentKind::Sent, query.as_str());
			return Ok(Delivered::Simulated);
		}

		let status = self.transport.get(query).await?;
		let delivered = match classify_status(status) {
			ResponseClass::Accepted => Delivered::Sent,
			ResponseClass::Transient => {
				return Err(TrackError::Status {
					host: self.transport.host().to_string(),
					status: status.as_u16(),
				});
			}
			ResponseClass::Rejected => {
				warn!(
					host = %self.transport.host(),
					status = status.as_u16(),
					query = %query,
					"Collection host rejected query"
				);
				Delivered::Rejected {
					status: status.as_u16(),
				}
			}
		};

		self.store.append_audit(SegmentKind::Sent, query.as_str());
		Ok(delivered)
	}
}

impl std::fmt::Debug for DeliveryClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DeliveryClient")
			.field("host", &self.transport.host())
			.field("store", &self.store)
			.field("dryrun", &self.dryrun)
			.finish()
	}
}
