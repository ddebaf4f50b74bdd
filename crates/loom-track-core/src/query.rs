// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Canonical query-string encoding of tracking events.
//!
//! Every event becomes a single line of the form `/<type>?k1=v1&k2=v2...`.
//! The same line is what gets appended to the pending queue and, later, what
//! is requested verbatim from the collection host, so the encoding has to be
//! deterministic for a given input and clock reading.
//!
//! Reserved keys are injected after the caller's properties, in this order,
//! when not already present:
//!
//! | Key  | Meaning                                   |
//! |------|-------------------------------------------|
//! | `_p` | subject (person) the event is attributed to |
//! | `_n` | event name, or alias target               |
//! | `_d` | `1` when `_t` may predate network arrival |
//! | `_t` | unix timestamp in seconds                 |
//! | `_k` | project key                               |

use std::borrow::Cow;
use std::fmt;

use crate::clock::Clock;
use crate::properties::Properties;

/// Subject (principal) id.
pub const SUBJECT_KEY: &str = "_p";
/// Event name or alias target.
pub const NAME_KEY: &str = "_n";
/// Delayed-delivery marker.
pub const DELAYED_KEY: &str = "_d";
/// Unix timestamp.
pub const TIMESTAMP_KEY: &str = "_t";
/// Project key.
pub const PROJECT_KEY: &str = "_k";

/// Kind of wire request an event is sent as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
	/// `/e`: a behavioral event.
	Event,
	/// `/s`: a property update on a subject.
	Set,
	/// `/a`: links two subject identities.
	Alias,
}

impl QueryType {
	pub fn as_str(&self) -> &'static str {
		match self {
			QueryType::Event => "e",
			QueryType::Set => "s",
			QueryType::Alias => "a",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"e" => Some(QueryType::Event),
			"s" => Some(QueryType::Set),
			"a" => Some(QueryType::Alias),
			_ => None,
		}
	}
}

impl fmt::Display for QueryType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// An event before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
	pub query_type: QueryType,
	pub subject_id: Option<String>,
	pub name: Option<String>,
	pub properties: Properties,
}

impl Event {
	/// A named behavioral event attributed to `subject`.
	pub fn record(
		subject: impl Into<String>,
		name: impl Into<String>,
		properties: Properties,
	) -> Self {
		Self {
			query_type: QueryType::Event,
			subject_id: Some(subject.into()),
			name: Some(name.into()),
			properties,
		}
	}

	/// A property update on `subject`.
	pub fn set(subject: impl Into<String>, properties: Properties) -> Self {
		Self {
			query_type: QueryType::Set,
			subject_id: Some(subject.into()),
			name: None,
			properties,
		}
	}

	/// Links `name` to `alias_to`. The identities travel as plain properties;
	/// no subject is injected.
	pub fn alias(name: impl Into<String>, alias_to: impl Into<String>) -> Self {
		let properties = Properties::new()
			.insert(NAME_KEY, alias_to.into())
			.insert(SUBJECT_KEY, name.into());
		Self {
			query_type: QueryType::Alias,
			subject_id: None,
			name: None,
			properties,
		}
	}
}

/// Session-derived knobs that influence reserved-key injection.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions<'a> {
	/// Project key injected as `_k`.
	pub key: &'a str,
	/// Overwrite a caller-supplied `_k` instead of only filling it when absent.
	pub force_key: bool,
	/// Events are queued for a later drain, so `_t` predates delivery.
	pub deferred: bool,
}

/// An immutable, fully encoded query line (`/<type>?<pairs>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedQuery(String);

impl EncodedQuery {
	/// Wraps a line read back from a queue segment, without re-encoding.
	pub fn from_line(line: impl Into<String>) -> Self {
		let mut line = line.into();
		while line.ends_with('\n') || line.ends_with('\r') {
			line.pop();
		}
		Self(line)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_string(self) -> String {
		self.0
	}

	/// The wire type, if the line is well formed.
	pub fn query_type(&self) -> Option<QueryType> {
		let path = self.0.strip_prefix('/')?;
		let ty = path.split('?').next()?;
		QueryType::parse(ty)
	}

	/// Decodes the query string back into ordered key/value pairs.
	pub fn pairs(&self) -> Vec<(String, String)> {
		let Some((_, query)) = self.0.split_once('?') else {
			return Vec::new();
		};
		query
			.split('&')
			.filter(|pair| !pair.is_empty())
			.map(|pair| {
				let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
				(decode_component(k), decode_component(v))
			})
			.collect()
	}

	/// Looks up a decoded value by key.
	pub fn get(&self, key: &str) -> Option<String> {
		self
			.pairs()
			.into_iter()
			.find(|(k, _)| k == key)
			.map(|(_, v)| v)
	}
}

impl fmt::Display for EncodedQuery {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for EncodedQuery {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

/// Encodes an event into its canonical query line.
///
/// Caller properties keep their order; reserved keys are then applied:
/// `_p` and `_n` always overwrite when the event carries them, `_d` is set
/// when the caller supplied `_t` or delivery is deferred, `_t` is filled only
/// when absent, and `_k` follows the `force_key` policy.
pub fn encode(event: Event, options: &EncodeOptions<'_>, clock: &dyn Clock) -> EncodedQuery {
	let Event {
		query_type,
		subject_id,
		name,
		mut properties,
	} = event;

	if let Some(subject) = subject_id {
		properties.set(SUBJECT_KEY, subject);
	}
	if let Some(name) = name {
		properties.set(NAME_KEY, name);
	}
	if properties.contains_key(TIMESTAMP_KEY) || options.deferred {
		properties.set(DELAYED_KEY, 1);
	}
	properties.set_if_absent(TIMESTAMP_KEY, clock.unix_now());
	if options.force_key {
		properties.set(PROJECT_KEY, options.key);
	} else {
		properties.set_if_absent(PROJECT_KEY, options.key);
	}

	let pairs: Vec<String> = properties
		.iter()
		.map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
		.collect();

	EncodedQuery(format!("/{}?{}", query_type, pairs.join("&")))
}

fn decode_component(raw: &str) -> String {
	match urlencoding::decode(raw) {
		Ok(decoded) => decoded.into_owned(),
		Err(_) => {
			let bytes = urlencoding::decode_binary(raw.as_bytes());
			match bytes {
				Cow::Borrowed(b) => String::from_utf8_lossy(b).into_owned(),
				Cow::Owned(b) => String::from_utf8_lossy(&b).into_owned(),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::FixedClock;
	use proptest::prelude::*;

	fn opts(key: &str) -> EncodeOptions<'_> {
		EncodeOptions {
			key,
			force_key: true,
			deferred: false,
		}
	}

	#[test]
	fn test_record_line_orders_caller_props_before_reserved_keys() {
		let clock = FixedClock::at_unix(1234567890);
		let event = Event::record("bob", "Signup", Properties::new().insert("age", 26));

		let query = encode(event, &opts("K"), &clock);

		assert_eq!(
			query.as_str(),
			"/e?age=26&_p=bob&_n=Signup&_t=1234567890&_k=K"
		);
	}

	#[test]
	fn test_caller_timestamp_marks_event_delayed() {
		let clock = FixedClock::at_unix(1234567890);
		let event = Event::record(
			"bob",
			"Signup",
			Properties::new().insert("_t", "1234567891"),
		);

		let query = encode(event, &opts("K"), &clock);

		assert_eq!(query.get("_t").as_deref(), Some("1234567891"));
		assert_eq!(query.get("_d").as_deref(), Some("1"));
	}

	#[test]
	fn test_deferred_mode_marks_event_delayed() {
		let clock = FixedClock::at_unix(1234567890);
		let options = EncodeOptions {
			key: "K",
			force_key: true,
			deferred: true,
		};

		let query = encode(Event::set("bob", Properties::new()), &options, &clock);

		assert_eq!(query.as_str(), "/s?_p=bob&_d=1&_t=1234567890&_k=K");
	}

	#[test]
	fn test_reserved_keys_not_overridden_by_caller() {
		let clock = FixedClock::at_unix(1234567890);
		let props = Properties::new()
			.insert("age", 26)
			.insert("_p", "billybob")
			.insert("_k", "foo")
			.insert("_n", "something else");

		let query = encode(Event::record("bob", "Signup", props), &opts("KM_KEY"), &clock);

		assert_eq!(query.get("_p").as_deref(), Some("bob"));
		assert_eq!(query.get("_k").as_deref(), Some("KM_KEY"));
		assert_eq!(query.get("_n").as_deref(), Some("Signup"));
		assert_eq!(query.get("age").as_deref(), Some("26"));
		assert_eq!(query.pairs().len(), 5);
	}

	#[test]
	fn test_caller_key_survives_without_force_key() {
		let clock = FixedClock::at_unix(1);
		let options = EncodeOptions {
			key: "KM_OTHER",
			force_key: false,
			deferred: false,
		};
		let props = Properties::new().insert("_k", "OTHER_KEY");

		let query = encode(Event::record("bob", "Signup", props), &options, &clock);
		assert_eq!(query.get("_k").as_deref(), Some("OTHER_KEY"));

		let query = encode(
			Event::record("bob", "Signup", Properties::new()),
			&options,
			&clock,
		);
		assert_eq!(query.get("_k").as_deref(), Some("KM_OTHER"));
	}

	#[test]
	fn test_alias_carries_identities_as_properties() {
		let clock = FixedClock::at_unix(1234567890);

		let query = encode(Event::alias("peter", "joe"), &opts("KM_KEY"), &clock);

		assert_eq!(query.query_type(), Some(QueryType::Alias));
		assert_eq!(
			query.as_str(),
			"/a?_n=joe&_p=peter&_t=1234567890&_k=KM_KEY"
		);
	}

	#[test]
	fn test_at_sign_is_escaped() {
		let clock = FixedClock::at_unix(1);
		let props = Properties::new().insert("email", "test@blah.com");

		let query = encode(
			Event::record("bob", "prop_with_@_in", props),
			&opts("K"),
			&clock,
		);

		assert!(!query.as_str().contains('@'));
		assert_eq!(query.get("email").as_deref(), Some("test@blah.com"));
		assert_eq!(query.get("_n").as_deref(), Some("prop_with_@_in"));
	}

	#[test]
	fn test_spaces_in_keys_and_values() {
		let clock = FixedClock::at_unix(1);
		let props = Properties::new().insert("city of residence", "eug ene");

		let query = encode(Event::set("bob", props), &opts("K"), &clock);

		assert!(query.as_str().contains("city%20of%20residence=eug%20ene"));
		assert_eq!(query.get("city of residence").as_deref(), Some("eug ene"));
	}

	#[test]
	fn test_from_line_strips_terminator() {
		let query = EncodedQuery::from_line("/e?_k=K&_t=1\r\n");
		assert_eq!(query.as_str(), "/e?_k=K&_t=1");
		assert_eq!(query.query_type(), Some(QueryType::Event));
	}

	#[test]
	fn test_query_type_of_malformed_line() {
		assert_eq!(EncodedQuery::from_line("garbage").query_type(), None);
		assert_eq!(EncodedQuery::from_line("/x?a=b").query_type(), None);
		assert!(EncodedQuery::from_line("/e").pairs().is_empty());
	}

	proptest! {
		#[test]
		fn encoded_properties_decode_back(
			entries in proptest::collection::vec(
				("[a-z @+&=/]{1,12}", "[a-zA-Z0-9 @+&=/%]{0,24}"),
				0..8,
			),
		) {
			let props: Properties = entries
				.into_iter()
				.filter(|(k, _)| !k.starts_with('_'))
				.collect();
			let clock = FixedClock::at_unix(1234567890);

			let query = encode(Event::set("subject", props.clone()), &opts("K"), &clock);
			let decoded = query.pairs();

			for (k, v) in props.iter() {
				prop_assert!(decoded.iter().any(|(dk, dv)| dk == k && dv == v));
			}
			prop_assert_eq!(decoded.len(), props.len() + 3);
		}

		#[test]
		fn forced_key_is_stable_across_encodings(caller_key in "[A-Za-z0-9]{0,16}") {
			let clock = FixedClock::at_unix(1234567890);
			let props = Properties::new().insert("_k", caller_key);

			let first = encode(Event::set("s", props.clone()), &opts("SESSION"), &clock);
			let second = encode(Event::set("s", props), &opts("SESSION"), &clock);

			let first_key = first.get("_k");
			prop_assert_eq!(first_key.as_deref(), Some("SESSION"));
			prop_assert_eq!(first, second);
		}

		#[test]
		fn caller_key_survives_repeated_encodings(caller_key in "[A-Za-z0-9]{1,16}") {
			let clock = FixedClock::at_unix(1234567890);
			let options = EncodeOptions { key: "SESSION", force_key: false, deferred: false };
			let props = Properties::new().insert("_k", caller_key.clone());

			for _ in 0..3 {
				let query = encode(Event::set("s", props.clone()), &options, &clock);
				prop_assert_eq!(query.get("_k"), Some(caller_key.clone()));
			}
		}

		#[test]
		fn subject_always_replaces_caller_principal(
			caller_subject in "[a-z]{1,8}",
			position in 0usize..3,
		) {
			let clock = FixedClock::at_unix(1);
			let mut entries = vec![
				("a".to_string(), "1".to_string()),
				("b".to_string(), "2".to_string()),
			];
			entries.insert(position, ("_p".to_string(), caller_subject));
			let props: Properties = entries.into_iter().collect();

			let query = encode(Event::record("bob", "Signup", props), &opts("K"), &clock);

			let principals: Vec<_> = query.pairs().into_iter().filter(|(k, _)| k == "_p").collect();
			prop_assert_eq!(principals, vec![("_p".to_string(), "bob".to_string())]);
		}
	}
}
