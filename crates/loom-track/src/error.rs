// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the tracking agent.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Boxed cause of a transport failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Tracking agent errors.
#[derive(Debug, Error)]
pub enum TrackError {
	/// No project key configured.
	#[error("need to initialize first (Session::init <your_key>)")]
	Uninitialized,

	/// Network, DNS, TLS or timeout failure talking to the collection host.
	#[error("{source} for host {host}")]
	Transport {
		host: String,
		#[source]
		source: BoxError,
	},

	/// The host answered with a status worth retrying later.
	#[error("host {host} responded with status {status}")]
	Status { host: String, status: u16 },

	/// Log directory unwritable, lock or append failure.
	#[error("I/O error on {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// Event could not be encoded.
	#[error("encoding error: {0}")]
	Encoding(String),

	/// Invalid configuration.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

impl TrackError {
	pub fn transport(host: impl Into<String>, source: impl Into<BoxError>) -> Self {
		Self::Transport {
			host: host.into(),
			source: source.into(),
		}
	}

	pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
		Self::Io {
			path: path.as_ref().to_path_buf(),
			source,
		}
	}

	/// Whether sending the same line again later may succeed.
	pub fn is_transient(&self) -> bool {
		matches!(self, TrackError::Transport { .. } | TrackError::Status { .. })
	}
}

/// Errors that can occur while loading session options.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// I/O error reading a config file
	#[error("I/O error reading {}: {source}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// TOML parsing error
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// TOML parsing error in a named file
	#[error("TOML parse error in {}: {source}", path.display())]
	TomlFile {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// Invalid value
	#[error("Invalid value for {field}: {message}")]
	InvalidValue { field: String, message: String },
}

impl ConfigError {
	/// Create an invalid value error
	pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			field: field.into(),
			message: message.into(),
		}
	}
}

/// Result type alias for tracking operations.
pub type Result<T> = std::result::Result<T, TrackError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_transport_error_names_host() {
		let err = TrackError::transport("http://127.0.0.1:9291", "connection refused");
		assert_eq!(
			err.to_string(),
			"connection refused for host http://127.0.0.1:9291"
		);
		assert!(err.is_transient());
	}

	#[test]
	fn test_status_error_is_transient() {
		let err = TrackError::Status {
			host: "http://example.com".to_string(),
			status: 503,
		};
		assert!(err.is_transient());
	}

	#[test]
	fn test_uninitialized_is_not_transient() {
		assert!(!TrackError::Uninitialized.is_transient());
		assert!(TrackError::Uninitialized
			.to_string()
			.contains("need to initialize first"));
	}

	#[test]
	fn test_io_error_is_not_transient() {
		let err = TrackError::io(
			"/nonexistent/kissmetrics_query.log",
			std::io::Error::from(std::io::ErrorKind::PermissionDenied),
		);
		assert!(!err.is_transient());
		assert!(err.to_string().contains("/nonexistent/kissmetrics_query.log"));
	}

	#[test]
	fn test_config_error_converts() {
		let err: TrackError = ConfigError::invalid_value("host", "empty").into();
		assert!(matches!(err, TrackError::Config(_)));
		assert_eq!(err.to_string(), "Invalid value for host: empty");
	}
}
