// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for Loom.
//!
//! This crate provides:
//! - Client construction with a consistent User-Agent header and timeout
//! - Classification of response statuses into accepted, transient, rejected

mod client;
mod status;

pub use client::{builder, client_with_timeout, user_agent};
pub use status::{classify_status, is_transient_error, ResponseClass, TRANSIENT_STATUSES};
