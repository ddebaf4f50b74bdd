// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session configuration shared by every tracking operation.
//!
//! A [`Session`] is an immutable value: [`Session::init`] merges caller
//! options over the defaults, and [`Session::reset`] hands back a fresh
//! uninitialized value instead of mutating shared state. Operations on an
//! uninitialized session report [`TrackError::Uninitialized`] without
//! touching the disk or the network.
//!
//! [`TrackError::Uninitialized`]: crate::TrackError::Uninitialized

use std::path::{Path, PathBuf};
use std::time::Duration;

use loom_track_core::{EncodeOptions, SegmentLayout, DEFAULT_PREFIX};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Default collection host.
pub const DEFAULT_HOST: &str = "https://trk.kissmetrics.io";
/// Default queue directory.
pub const DEFAULT_LOG_DIR: &str = "/tmp";
/// Environment used when neither an option nor the ambient variable names one.
pub const DEFAULT_ENVIRONMENT: &str = "production";
/// Ambient variable naming the deployment environment.
pub const ENVIRONMENT_VAR: &str = "LOOM_ENV";
/// Default per-request delivery timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Caller-supplied overrides. Unset fields keep their defaults.
///
/// Can be deserialized from TOML:
///
/// ```toml
/// host = "https://trk.example.com"
/// log_dir = "/var/log/tracking"
/// environment = "staging"
/// use_cron = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionOptions {
	pub host: Option<String>,
	pub log_dir: Option<PathBuf>,
	pub log_prefix: Option<String>,
	pub environment: Option<String>,
	pub use_cron: Option<bool>,
	pub dryrun: Option<bool>,
	pub force_key: Option<bool>,
	pub emit_to_console: Option<bool>,
	pub request_timeout_secs: Option<u64>,
}

impl SessionOptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses options from a TOML document.
	pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
		let options: Self = toml::from_str(s)?;
		options.validate()?;
		Ok(options)
	}

	/// Loads options from a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		let options: Self = toml::from_str(&content).map_err(|source| ConfigError::TomlFile {
			path: path.to_path_buf(),
			source,
		})?;
		options.validate()?;
		debug!(path = %path.display(), "Loaded session options");
		Ok(options)
	}

	/// Layers `other` on top of `self`; fields set in `other` win.
	pub fn merge(self, other: SessionOptions) -> Self {
		Self {
			host: other.host.or(self.host),
			log_dir: other.log_dir.or(self.log_dir),
			log_prefix: other.log_prefix.or(self.log_prefix),
			environment: other.environment.or(self.environment),
			use_cron: other.use_cron.or(self.use_cron),
			dryrun: other.dryrun.or(self.dryrun),
			force_key: other.force_key.or(self.force_key),
			emit_to_console: other.emit_to_console.or(self.emit_to_console),
			request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
		}
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if matches!(self.host.as_deref(), Some(h) if h.trim().is_empty()) {
			return Err(ConfigError::invalid_value("host", "must not be empty"));
		}
		if matches!(self.log_prefix.as_deref(), Some(p) if p.is_empty() || p.contains('/')) {
			return Err(ConfigError::invalid_value(
				"log_prefix",
				"must be a non-empty file name fragment",
			));
		}
		if self.request_timeout_secs == Some(0) {
			return Err(ConfigError::invalid_value(
				"request_timeout_secs",
				"must be greater than zero",
			));
		}
		Ok(())
	}

	pub fn host(mut self, host: impl Into<String>) -> Self {
		self.host = Some(host.into());
		self
	}

	pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.log_dir = Some(dir.into());
		self
	}

	pub fn log_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.log_prefix = Some(prefix.into());
		self
	}

	/// Example: `production`, `staging`, `development`
	pub fn environment(mut self, env: impl Into<String>) -> Self {
		self.environment = Some(env.into());
		self
	}

	/// Queue every event for a later drain instead of delivering inline.
	pub fn use_cron(mut self, enabled: bool) -> Self {
		self.use_cron = Some(enabled);
		self
	}

	/// Record deliveries as sent without any network call.
	pub fn dryrun(mut self, enabled: bool) -> Self {
		self.dryrun = Some(enabled);
		self
	}

	/// Overwrite caller-supplied `_k` values with the session key.
	pub fn force_key(mut self, enabled: bool) -> Self {
		self.force_key = Some(enabled);
		self
	}

	pub fn emit_to_console(mut self, enabled: bool) -> Self {
		self.emit_to_console = Some(enabled);
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout_secs = Some(timeout.as_secs().max(1));
		self
	}
}

/// Resolves the environment name: explicit option, then the ambient
/// variable, then [`DEFAULT_ENVIRONMENT`]. Blank values are ignored.
pub fn resolve_environment(explicit: Option<&str>, ambient: Option<&str>) -> String {
	explicit
		.filter(|e| !e.trim().is_empty())
		.or(ambient.filter(|e| !e.trim().is_empty()))
		.unwrap_or(DEFAULT_ENVIRONMENT)
		.to_string()
}

/// Reads [`ENVIRONMENT_VAR`] from the process environment.
pub fn ambient_environment() -> Option<String> {
	std::env::var(ENVIRONMENT_VAR).ok()
}

/// Process-wide tracking configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
	key: Option<String>,
	host: String,
	log_dir: PathBuf,
	log_prefix: String,
	environment: String,
	use_cron: bool,
	dryrun: bool,
	force_key: bool,
	emit_to_console: bool,
	request_timeout: Duration,
}

impl Default for Session {
	fn default() -> Self {
		Self::defaults()
	}
}

impl Session {
	/// An uninitialized session carrying the module defaults.
	pub fn defaults() -> Self {
		Self::uninitialized(resolve_environment(None, ambient_environment().as_deref()))
	}

	fn uninitialized(environment: String) -> Self {
		Self {
			key: None,
			host: DEFAULT_HOST.to_string(),
			log_dir: PathBuf::from(DEFAULT_LOG_DIR),
			log_prefix: DEFAULT_PREFIX.to_string(),
			environment,
			use_cron: false,
			dryrun: false,
			force_key: true,
			emit_to_console: true,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
		}
	}

	/// Initializes a session for `key`, reading the ambient environment
	/// variable for environment resolution.
	pub fn init(key: impl Into<String>, options: SessionOptions) -> Self {
		Self::init_with_ambient(key, options, ambient_environment().as_deref())
	}

	/// Like [`Session::init`] with the ambient environment value supplied
	/// explicitly.
	pub fn init_with_ambient(
		key: impl Into<String>,
		options: SessionOptions,
		ambient: Option<&str>,
	) -> Self {
		let environment = resolve_environment(options.environment.as_deref(), ambient);
		let defaults = Self::uninitialized(environment);
		let key = key.into();

		let session = Self {
			key: Some(key).filter(|k| !k.is_empty()),
			host: options.host.unwrap_or(defaults.host),
			log_dir: options.log_dir.unwrap_or(defaults.log_dir),
			log_prefix: options.log_prefix.unwrap_or(defaults.log_prefix),
			environment: defaults.environment,
			use_cron: options.use_cron.unwrap_or(defaults.use_cron),
			dryrun: options.dryrun.unwrap_or(defaults.dryrun),
			force_key: options.force_key.unwrap_or(defaults.force_key),
			emit_to_console: options.emit_to_console.unwrap_or(defaults.emit_to_console),
			request_timeout: options
				.request_timeout_secs
				.map(Duration::from_secs)
				.unwrap_or(defaults.request_timeout),
		};

		session.check_log_dir();
		debug!(
			host = %session.host,
			log_dir = %session.log_dir.display(),
			environment = %session.environment,
			use_cron = session.use_cron,
			dryrun = session.dryrun,
			"Tracking session initialized"
		);
		session
	}

	/// Returns a fresh uninitialized session, discarding key and overrides.
	pub fn reset() -> Self {
		Self::defaults()
	}

	pub fn is_initialized(&self) -> bool {
		self.key.is_some()
	}

	pub fn key(&self) -> Option<&str> {
		self.key.as_deref()
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	pub fn log_dir(&self) -> &Path {
		&self.log_dir
	}

	pub fn log_prefix(&self) -> &str {
		&self.log_prefix
	}

	pub fn environment(&self) -> &str {
		&self.environment
	}

	pub fn use_cron(&self) -> bool {
		self.use_cron
	}

	pub fn dryrun(&self) -> bool {
		self.dryrun
	}

	pub fn force_key(&self) -> bool {
		self.force_key
	}

	pub fn emit_to_console(&self) -> bool {
		self.emit_to_console
	}

	pub fn request_timeout(&self) -> Duration {
		self.request_timeout
	}

	/// Segment naming for this session's log directory and environment.
	pub fn layout(&self) -> SegmentLayout {
		SegmentLayout::new(
			self.log_dir.clone(),
			self.log_prefix.clone(),
			Some(self.environment.clone()),
		)
	}

	/// Encoder settings, or `None` when no key is configured.
	pub fn encode_options(&self) -> Option<EncodeOptions<'_>> {
		self.key.as_deref().map(|key| EncodeOptions {
			key,
			force_key: self.force_key,
			deferred: self.use_cron,
		})
	}

	/// Non-fatal writability check of the log directory. Creates and drops
	/// an anonymous temp file there, so ownership, ACLs and privileges all
	/// count.
	pub fn check_log_dir(&self) -> bool {
		let writable = tempfile::tempfile_in(&self.log_dir).is_ok();
		if !writable && self.emit_to_console {
			warn!(
				log_dir = %self.log_dir.display(),
				query_log = %self.layout().path(loom_track_core::SegmentKind::Query).display(),
				"Log directory is not writable; does it exist, and are permissions correct?"
			);
		}
		writable
	}
}
