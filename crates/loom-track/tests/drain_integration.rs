// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end: record into a log directory, then drain it against a mock
//! collection host.

use std::path::Path;
use std::sync::Arc;

use loom_track::{
	Dispatch, Drainer, FixedClock, Properties, SegmentKind, Session, SessionOptions, Tracker,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session(dir: &Path, host: &str, use_cron: bool) -> Session {
	Session::init_with_ambient(
		"KM_KEY",
		SessionOptions::new()
			.log_dir(dir)
			.host(host)
			.environment("production")
			.use_cron(use_cron)
			.emit_to_console(false),
		None,
	)
}

fn read_lines(path: &Path) -> Vec<String> {
	std::fs::read_to_string(path)
		.unwrap_or_default()
		.lines()
		.map(String::from)
		.collect()
}

#[tokio::test]
async fn queued_line_is_delivered_unchanged_by_drain() {
	let dir = TempDir::new().unwrap();

	// Unreachable host: the inline attempt fails and the line is queued.
	let offline = Tracker::builder(session(dir.path(), "http://127.0.0.1:1", false))
		.clock(Arc::new(FixedClock::at_unix(1234567890)))
		.build()
		.unwrap();
	let dispatch = offline
		.record("bob", "Signup", Properties::new().insert("age", "26"))
		.await
		.unwrap();
	assert_eq!(dispatch, Dispatch::Queued);

	let expected = "/e?age=26&_p=bob&_n=Signup&_t=1234567890&_k=KM_KEY";
	let pending = dir.path().join("kissmetrics_production_query.log");
	assert_eq!(read_lines(&pending), vec![expected]);

	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/e"))
		.and(query_param("age", "26"))
		.and(query_param("_p", "bob"))
		.and(query_param("_n", "Signup"))
		.and(query_param("_t", "1234567890"))
		.and(query_param("_k", "KM_KEY"))
		.respond_with(ResponseTemplate::new(200))
		.expect(1)
		.mount(&server)
		.await;

	let drainer = Drainer::from_session(&session(dir.path(), &server.uri(), true)).unwrap();
	let reports = drainer.drain_pending().await;

	assert_eq!(reports.len(), 1);
	assert_eq!(reports[0].delivered, 1);
	assert!(reports[0].snapshot_removed);
	assert!(!pending.exists());
	assert_eq!(
		read_lines(&dir.path().join("kissmetrics_production_sent.log")),
		vec![expected]
	);
}

#[tokio::test]
async fn legacy_and_scoped_segments_are_both_drained() {
	let dir = TempDir::new().unwrap();
	std::fs::write(
		dir.path().join("kissmetrics_query.log"),
		"/e?_t=1297105499&_n=Signup&_p=bob&_k=KM_KEY&age=27\n",
	)
	.unwrap();
	std::fs::write(
		dir.path().join("kissmetrics_production_query.log"),
		"/e?_t=1297105499&_n=Signup&_p=bob&_k=KM_KEY&age=26\n",
	)
	.unwrap();

	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/e"))
		.respond_with(ResponseTemplate::new(200))
		.expect(2)
		.mount(&server)
		.await;

	let session = session(dir.path(), &server.uri(), true);
	let tracker = Tracker::new(session).unwrap();
	let reports = tracker.drainer().drain_pending().await;

	assert_eq!(reports.len(), 2);
	assert_eq!(reports[0].source, Some(SegmentKind::QueryLegacy));
	assert_eq!(reports[1].source, Some(SegmentKind::Query));

	let received = server.received_requests().await.unwrap();
	let ages: Vec<String> = received
		.iter()
		.filter_map(|r| {
			r.url
				.query_pairs()
				.find(|(k, _)| k == "age")
				.map(|(_, v)| v.into_owned())
		})
		.collect();
	assert_eq!(ages, vec!["27", "26"]);

	// New events only ever go to the environment-scoped segment.
	tracker
		.record("bob", "Upgraded", Properties::new())
		.await
		.unwrap();
	assert!(!dir.path().join("kissmetrics_query.log").exists());
	assert_eq!(
		read_lines(&dir.path().join("kissmetrics_production_query.log")).len(),
		1
	);
}

#[tokio::test]
async fn server_errors_leave_lines_pending_for_next_run() {
	let dir = TempDir::new().unwrap();
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.respond_with(ResponseTemplate::new(503))
		.mount(&server)
		.await;

	let session = session(dir.path(), &server.uri(), true);
	let tracker = Tracker::new(session).unwrap();
	for n in 0..3 {
		tracker
			.record("bob", format!("Step {n}"), Properties::new())
			.await
			.unwrap();
	}

	let report = tracker.drainer().drain().await;

	assert_eq!(report.delivered, 0);
	assert_eq!(report.requeued, 3);
	assert!(report.snapshot_removed);
	let pending = read_lines(&dir.path().join("kissmetrics_production_query.log"));
	assert_eq!(pending.len(), 3);
	assert!(pending[0].contains("_n=Step%200"));
	assert_eq!(
		read_lines(&dir.path().join("kissmetrics_production_error.log")).len(),
		3
	);
	assert!(!dir.path().join("kissmetrics_production_sent.log").exists());
}

#[tokio::test]
async fn other_environments_are_isolated() {
	let dir = TempDir::new().unwrap();
	std::fs::write(
		dir.path().join("kissmetrics_alpha_query.log"),
		"/e?_t=1297105499&_n=Signup&_p=bob&_k=KM_KEY&age=26\n",
	)
	.unwrap();

	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.respond_with(ResponseTemplate::new(200))
		.expect(0)
		.mount(&server)
		.await;

	let drainer = Drainer::from_session(&session(dir.path(), &server.uri(), true)).unwrap();
	assert!(drainer.drain_pending().await.is_empty());
	assert!(dir.path().join("kissmetrics_alpha_query.log").exists());
}
