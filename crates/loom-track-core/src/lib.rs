// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom tracking agent.
//!
//! This crate is I/O free. It provides:
//! - [`Properties`], the ordered string mapping attached to an event
//! - the query encoder turning an [`Event`] into an [`EncodedQuery`] line
//! - [`SegmentLayout`], the pure naming scheme for queue segment files
//! - the [`Clock`] abstraction so timestamps can be pinned in tests

pub mod clock;
pub mod properties;
pub mod query;
pub mod segment;

pub use clock::{Clock, FixedClock, SystemClock};
pub use properties::Properties;
pub use query::{
	encode, EncodeOptions, EncodedQuery, Event, QueryType, DELAYED_KEY, NAME_KEY, PROJECT_KEY,
	SUBJECT_KEY, TIMESTAMP_KEY,
};
pub use segment::{SegmentKind, SegmentLayout, DEFAULT_PREFIX};
