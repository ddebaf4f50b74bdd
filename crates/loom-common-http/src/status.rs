// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Classification of HTTP responses into delivered, transient, or rejected.

use reqwest::StatusCode;

/// Statuses worth sending again later.
pub const TRANSIENT_STATUSES: [StatusCode; 6] = [
	StatusCode::TOO_MANY_REQUESTS,
	StatusCode::REQUEST_TIMEOUT,
	StatusCode::INTERNAL_SERVER_ERROR,
	StatusCode::BAD_GATEWAY,
	StatusCode::SERVICE_UNAVAILABLE,
	StatusCode::GATEWAY_TIMEOUT,
];

/// What a response status means for the request that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
	/// 2xx/3xx: the server accepted the request.
	Accepted,
	/// The server may accept the same request later.
	Transient,
	/// The server will never accept this request.
	Rejected,
}

pub fn classify_status(status: StatusCode) -> ResponseClass {
	if TRANSIENT_STATUSES.contains(&status) || status.is_server_error() {
		ResponseClass::Transient
	} else if status.is_client_error() {
		ResponseClass::Rejected
	} else {
		ResponseClass::Accepted
	}
}

/// Whether a transport-level error (no response) is likely transient.
pub fn is_transient_error(err: &reqwest::Error) -> bool {
	if err.is_timeout() || err.is_connect() || err.is_request() {
		return true;
	}
	match err.status() {
		Some(status) => classify_status(status) == ResponseClass::Transient,
		None => false,
	}
}
