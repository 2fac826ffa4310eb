// crates.io
use futures::stream;
use tokio_util::sync::CancellationToken;
// self
use twitch_clips::{
	_preludet::*,
	clips::{ClipQuery, ClipRecord, ClipSource, ClipStream},
	clock::ManualClock,
	config::Period,
	runner::Runner,
	store::MemoryClipStore,
};

/// Serves a fixed clip list per broadcaster and records the queries it receives.
#[derive(Default)]
struct FixtureSource {
	clips: HashMap<String, Vec<ClipRecord>>,
	queries: Mutex<Vec<ClipQuery>>,
}
impl FixtureSource {
	fn with(mut self, broadcaster_id: &str, count: i64) -> Self {
		let clips = (0..count)
			.map(|n| clip_fixture(&format!("{broadcaster_id}-{n}"), broadcaster_id, n))
			.collect();

		self.clips.insert(broadcaster_id.into(), clips);

		self
	}
}
impl ClipSource for FixtureSource {
	fn clips(&self, query: ClipQuery) -> ClipStream {
		let clips = self.clips.get(&query.broadcaster_id).cloned().unwrap_or_default();

		self.queries.lock().push(query);

		Box::pin(stream::iter(clips.into_iter().map(Ok::<_, Error>)))
	}
}

#[tokio::test]
async fn every_fetched_record_is_persisted_exactly_once() {
	let source =
		Arc::new(FixtureSource::default().with("3593082", 3).with("790564", 250).with("11772", 0));
	let store = MemoryClipStore::default();
	let period: Period = "P3D".parse().expect("Period should parse.");
	let ids = ["3593082", "790564", "11772"];
	let report = Runner::new(source.clone(), Arc::new(store.clone()), ids)
		.with_clock(Arc::new(ManualClock::new(instant("2023-02-08T13:00:00Z"))))
		.with_period(period.duration())
		.run()
		.await
		.expect("Run should complete.");
	let mut queries = source.queries.lock().clone();

	queries.sort_by(|a, b| a.broadcaster_id.cmp(&b.broadcaster_id));

	assert_eq!(queries.len(), 3);

	for query in &queries {
		assert_eq!(query.started_at, Some(instant("2023-02-05T13:00:00Z")));
		assert_eq!(query.ended_at, Some(instant("2023-02-08T13:00:00Z")));
	}

	let mut writes = store.write_log();
	let total = writes.len();

	writes.sort();
	writes.dedup();

	assert_eq!(total, 253);
	assert_eq!(writes.len(), 253);
	assert_eq!(report.stored(), 253);
	assert_eq!(report.outcome("790564").map(|o| o.stored), Some(250));
	assert_eq!(report.outcome("11772").map(|o| o.stored), Some(0));
}

#[tokio::test]
async fn records_within_one_account_are_persisted_in_fetch_order() {
	let source = Arc::new(FixtureSource::default().with("3593082", 5));
	let store = MemoryClipStore::default();

	Runner::new(source, Arc::new(store.clone()), ["3593082"])
		.run()
		.await
		.expect("Run should complete.");

	assert_eq!(
		store.write_log(),
		["3593082-0", "3593082-1", "3593082-2", "3593082-3", "3593082-4"]
	);
}

#[tokio::test]
async fn cancelled_run_before_start_reports_cancelled_accounts() {
	let source = Arc::new(FixtureSource::default().with("3593082", 2));
	let store = MemoryClipStore::default();
	let cancel = CancellationToken::new();

	cancel.cancel();

	let report = Runner::new(source, Arc::new(store.clone()), ["3593082"])
		.run_until(&cancel)
		.await
		.expect("Cancelled run should still report.");

	assert!(matches!(report.outcomes[0].result, Err(Error::Cancelled)));
	assert!(store.is_empty());
}
