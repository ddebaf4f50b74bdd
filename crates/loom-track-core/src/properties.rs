// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ordered string properties attached to a tracking event.

/// An insertion-ordered mapping of property names to stringified values.
///
/// Keys are case-sensitive. Inserting a key that is already present replaces
/// its value in place, so the key keeps its original position (last write
/// wins).
///
/// # Example
///
/// ```
/// use loom_track_core::Properties;
///
/// let props = Properties::new()
///     .insert("age", 26)
///     .insert("city of residence", "eug ene")
///     .insert("premium", true);
///
/// assert_eq!(props.get("age"), Some("26"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
	entries: Vec<(String, String)>,
}

impl Properties {
	/// Creates a new empty Properties builder.
	pub fn new() -> Self {
		Self {
			entries: Vec::new(),
		}
	}

	/// Inserts a key-value pair, stringifying the value.
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: ToString,
	{
		self.set(key, value);
		self
	}

	/// Inserts or replaces a key-value pair in place.
	pub fn set<K, V>(&mut self, key: K, value: V)
	where
		K: Into<String>,
		V: ToString,
	{
		let key = key.into();
		let value = value.to_string();
		match self.entries.iter_mut().find(|(k, _)| *k == key) {
			Some(entry) => entry.1 = value,
			None => self.entries.push((key, value)),
		}
	}

	/// Inserts the pair only if the key is absent.
	pub fn set_if_absent<K, V>(&mut self, key: K, value: V)
	where
		K: Into<String>,
		V: ToString,
	{
		let key = key.into();
		if !self.contains_key(&key) {
			self.entries.push((key, value.to_string()));
		}
	}

	/// Merges another Properties into this one.
	///
	/// If both contain the same key, the value from `other` takes precedence.
	pub fn merge(mut self, other: Properties) -> Self {
		for (k, v) in other.entries {
			self.set(k, v);
		}
		self
	}

	/// Returns true if the properties are empty.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Returns the number of properties.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Gets a value by key.
	pub fn get(&self, key: &str) -> Option<&str> {
		self
			.entries
			.iter()
			.find(|(k, _)| k == key)
			.map(|(_, v)| v.as_str())
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.entries.iter().any(|(k, _)| k == key)
	}

	/// Iterates over the pairs in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}
}

impl<K, V> FromIterator<(K, V)> for Properties
where
	K: Into<String>,
	V: ToString,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut props = Properties::new();
		for (k, v) in iter {
			props.set(k, v);
		}
		props
	}
}

impl IntoIterator for Properties {
	type Item = (String, String);
	type IntoIter = std::vec::IntoIter<(String, String)>;

	fn into_iter(self) -> Self::IntoIter {
		self.entries.into_iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_properties_new_is_empty() {
		let props = Properties::new();
		assert!(props.is_empty());
		assert_eq!(props.len(), 0);
	}

	#[test]
	fn test_properties_stringifies_scalars() {
		let props = Properties::new()
			.insert("count", 42)
			.insert("active", true)
			.insert("price", 99.5);

		assert_eq!(props.get("count"), Some("42"));
		assert_eq!(props.get("active"), Some("true"));
		assert_eq!(props.get("price"), Some("99.5"));
	}

	#[test]
	fn test_duplicate_key_replaces_in_place() {
		let props = Properties::new()
			.insert("a", 1)
			.insert("b", 2)
			.insert("a", 3);

		let pairs: Vec<_> = props.iter().collect();
		assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
	}

	#[test]
	fn test_keys_are_case_sensitive() {
		let props = Properties::new().insert("_p", "one").insert("_P", "two");
		assert_eq!(props.len(), 2);
		assert_eq!(props.get("_p"), Some("one"));
	}

	#[test]
	fn test_set_if_absent_keeps_existing() {
		let mut props = Properties::new().insert("_t", "100");
		props.set_if_absent("_t", "200");
		props.set_if_absent("_k", "KEY");
		assert_eq!(props.get("_t"), Some("100"));
		assert_eq!(props.get("_k"), Some("KEY"));
	}

	#[test]
	fn test_properties_merge() {
		let props1 = Properties::new().insert("a", 1).insert("b", 2);
		let props2 = Properties::new().insert("b", 20).insert("c", 3);

		let merged = props1.merge(props2);

		assert_eq!(merged.len(), 3);
		assert_eq!(merged.get("a"), Some("1"));
		assert_eq!(merged.get("b"), Some("20")); // props2 wins
		assert_eq!(merged.get("c"), Some("3"));
	}

	#[test]
	fn test_from_iterator_preserves_order() {
		let props: Properties = vec![("z", "1"), ("a", "2")].into_iter().collect();
		let keys: Vec<_> = props.iter().map(|(k, _)| k).collect();
		assert_eq!(keys, vec!["z", "a"]);
	}

	proptest! {
		#[test]
		fn properties_len_matches_unique_insertions(
			keys in proptest::collection::vec("[a-z]{1,10}", 0..20)
		) {
			let unique_keys: std::collections::HashSet<_> = keys.iter().cloned().collect();
			let mut props = Properties::new();
			for key in &keys {
				props = props.insert(key.clone(), "value");
			}
			prop_assert_eq!(props.len(), unique_keys.len());
		}

		#[test]
		fn properties_get_returns_last_written_value(
			key in "[a-z]{1,20}",
			first in "[a-zA-Z0-9]{1,50}",
			second in "[a-zA-Z0-9]{1,50}"
		) {
			let props = Properties::new()
				.insert(key.clone(), first)
				.insert(key.clone(), second.clone());
			prop_assert_eq!(props.get(&key), Some(second.as_str()));
		}
	}
}
