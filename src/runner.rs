//! Fetch orchestration: one isolated fetch-and-upsert task per broadcaster.
//!
//! Every run computes a single window `[now - period, now]` and hands it to each configured
//! broadcaster. Tasks run concurrently on the tokio runtime; one task failing (authorization,
//! page fetch, or upsert) is logged and reported without touching its siblings.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	clips::{ClipQuery, ClipSource, PaginatedFetcher},
	clock::{Clock, SystemClock},
	config::Config,
	error::ConfigError,
	http::{ReqwestTransport, RequestAuthorizer},
	manager::TokenManager,
	oauth::AuthorizationClient,
	obs::{self, Stage, StageOutcome, StageSpan},
	store::{ClipStore, MemoryTokenStore},
};

/// Records between two progress log lines.
pub const PROGRESS_EVERY: usize = 100;

/// Window handed to one broadcaster task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchWindow {
	/// Broadcaster whose clips are fetched.
	pub broadcaster_id: String,
	/// Window start.
	pub started_at: OffsetDateTime,
	/// Window end; the instant the run began.
	pub ended_at: OffsetDateTime,
}
impl FetchWindow {
	/// Query covering this window.
	pub fn query(&self) -> ClipQuery {
		ClipQuery::new(&self.broadcaster_id).started_at(self.started_at).ended_at(self.ended_at)
	}
}

/// Terminal state of one broadcaster task.
#[derive(Debug)]
pub struct AccountOutcome {
	/// Broadcaster the task served.
	pub broadcaster_id: String,
	/// Records upserted before the task ended, including on failure.
	pub stored: usize,
	/// `Err` when the task stopped early.
	pub result: Result<()>,
}
impl AccountOutcome {
	/// Whether the task drained its stream.
	pub fn is_success(&self) -> bool {
		self.result.is_ok()
	}
}

/// Summary of one orchestration run, in configured broadcaster order.
#[derive(Debug)]
pub struct RunReport {
	/// Window start shared by every task.
	pub started_at: OffsetDateTime,
	/// Window end shared by every task.
	pub ended_at: OffsetDateTime,
	/// One entry per broadcaster.
	pub outcomes: Vec<AccountOutcome>,
}
impl RunReport {
	/// Total records upserted across broadcasters.
	pub fn stored(&self) -> usize {
		self.outcomes.iter().map(|o| o.stored).sum()
	}

	/// Outcomes that ended with an error.
	pub fn failures(&self) -> impl Iterator<Item = &AccountOutcome> {
		self.outcomes.iter().filter(|o| !o.is_success())
	}

	/// Looks up the outcome for `broadcaster_id`.
	pub fn outcome(&self, broadcaster_id: &str) -> Option<&AccountOutcome> {
		self.outcomes.iter().find(|o| o.broadcaster_id == broadcaster_id)
	}
}

/// Drives periodic harvests.
pub struct Runner {
	source: Arc<dyn ClipSource>,
	store: Arc<dyn ClipStore>,
	clock: Arc<dyn Clock>,
	period: Duration,
	broadcaster_ids: Vec<String>,
}
impl Runner {
	/// Lookback applied when none is configured.
	pub const DEFAULT_PERIOD: Duration = Duration::weeks(1);

	/// Creates a runner over `broadcaster_ids` using the system clock and a one-week period.
	pub fn new<I, S>(
		source: Arc<dyn ClipSource>,
		store: Arc<dyn ClipStore>,
		broadcaster_ids: I,
	) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			source,
			store,
			clock: Arc::new(SystemClock),
			period: Self::DEFAULT_PERIOD,
			broadcaster_ids: broadcaster_ids.into_iter().map(Into::into).collect(),
		}
	}

	/// Wires the full authorized fetch stack described by `config` in front of `store`.
	///
	/// `config` is validated first, so duplicate broadcaster ids are harvested once. Returns
	/// the runner together with the token manager so callers can inspect refresh counters.
	pub fn from_config(
		config: &Config,
		store: Arc<dyn ClipStore>,
	) -> Result<(Self, Arc<TokenManager>)> {
		let mut config = config.clone();

		config.validate()?;

		let http_client = ReqwestClient::default();
		let authorization_url = config.twitch.authorization_url()?;
		let authorization = AuthorizationClient::with_client(http_client.clone(), authorization_url);
		let manager = Arc::new(
			TokenManager::new(
				config.credential(),
				Arc::new(authorization),
				Arc::new(MemoryTokenStore::default()),
			)
			.with_skew(config.twitch.token_skew.duration()),
		);
		let transport =
			RequestAuthorizer::new(ReqwestTransport::with_client(http_client), manager.clone());
		let fetcher = PaginatedFetcher::new(Arc::new(transport), &config.twitch.base_url()?)?;
		let runner = Self::new(Arc::new(fetcher), store, config.fetch.broadcaster_ids)
			.with_period(config.fetch.period.duration());

		Ok((runner, manager))
	}

	/// Replaces the time source.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Overrides the lookback period.
	pub fn with_period(mut self, period: Duration) -> Self {
		self.period = period;

		self
	}

	/// Configured broadcasters, in run order.
	pub fn broadcaster_ids(&self) -> &[String] {
		&self.broadcaster_ids
	}

	/// Computes this run's windows from the current clock reading.
	pub fn windows(&self) -> Result<Vec<FetchWindow>> {
		let ended_at = self.clock.now();
		let started_at = ended_at
			.checked_sub(self.period)
			.ok_or(ConfigError::WindowOutOfRange { period: self.period, end: ended_at })?;

		Ok(self
			.broadcaster_ids
			.iter()
			.map(|id| FetchWindow { broadcaster_id: id.clone(), started_at, ended_at })
			.collect())
	}

	/// Runs every broadcaster task to completion.
	///
	/// Per-broadcaster failures land in the report; only a window that cannot be computed
	/// fails the run itself.
	pub async fn run(&self) -> Result<RunReport> {
		self.run_until(&CancellationToken::new()).await
	}

	/// Like [`Self::run`], but stops in-flight tasks once `cancel` fires.
	///
	/// Cancelled tasks report [`Error::Cancelled`] and keep every upsert that already
	/// completed.
	pub async fn run_until(&self, cancel: &CancellationToken) -> Result<RunReport> {
		const STAGE: Stage = Stage::Run;

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		let result = StageSpan::new(STAGE).instrument(self.dispatch(cancel)).await;

		obs::record_stage_outcome(STAGE, StageOutcome::of(&result));

		result
	}

	async fn dispatch(&self, cancel: &CancellationToken) -> Result<RunReport> {
		let windows = self.windows()?;
		let Some(first) = windows.first() else {
			tracing::warn!("no broadcasters configured; nothing to harvest");

			let ended_at = self.clock.now();

			return Ok(RunReport { started_at: ended_at, ended_at, outcomes: Vec::new() });
		};
		let (started_at, ended_at) = (first.started_at, first.ended_at);

		tracing::info!(
			broadcasters = windows.len(),
			%started_at,
			%ended_at,
			"starting harvest run"
		);

		let handles = windows
			.into_iter()
			.map(|window| {
				let id = window.broadcaster_id.clone();
				let stored = Arc::new(AtomicUsize::new(0));
				let handle = tokio::spawn(harvest_task(
					self.source.clone(),
					self.store.clone(),
					window,
					stored.clone(),
					cancel.clone(),
				));

				(id, stored, handle)
			})
			.collect::<Vec<_>>();
		let mut outcomes = Vec::with_capacity(handles.len());

		for (broadcaster_id, stored, handle) in handles {
			let result = match handle.await {
				Ok(result) => result,
				Err(e) => Err(Error::TaskFailed { message: e.to_string() }),
			};
			let stored = stored.load(Ordering::Acquire);

			match &result {
				Ok(()) => tracing::info!(
					broadcaster_id = broadcaster_id.as_str(),
					stored,
					"finished harvesting clips"
				),
				Err(e) => tracing::error!(
					broadcaster_id = broadcaster_id.as_str(),
					stored,
					error = %e,
					"harvest failed"
				),
			}

			outcomes.push(AccountOutcome { broadcaster_id, stored, result });
		}

		let report = RunReport { started_at, ended_at, outcomes };

		tracing::info!(
			stored = report.stored(),
			failed = report.failures().count(),
			"harvest run finished"
		);

		Ok(report)
	}
}
impl Debug for Runner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Runner")
			.field("period", &self.period)
			.field("broadcaster_ids", &self.broadcaster_ids)
			.finish()
	}
}

async fn harvest_task(
	source: Arc<dyn ClipSource>,
	store: Arc<dyn ClipStore>,
	window: FetchWindow,
	stored: Arc<AtomicUsize>,
	cancel: CancellationToken,
) -> Result<()> {
	const STAGE: Stage = Stage::Harvest;

	let span = StageSpan::for_broadcaster(STAGE, &window.broadcaster_id);

	obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

	let result = tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(Error::Cancelled),
		result = span.instrument(harvest(&*source, &*store, &window, &stored)) => result,
	};

	obs::record_stage_outcome(STAGE, StageOutcome::of(&result));

	result
}

async fn harvest(
	source: &dyn ClipSource,
	store: &dyn ClipStore,
	window: &FetchWindow,
	stored: &AtomicUsize,
) -> Result<()> {
	tracing::info!(
		started_at = %window.started_at,
		ended_at = %window.ended_at,
		"start collecting clip information"
	);

	let mut clips = source.clips(window.query());

	while let Some(clip) = clips.next().await {
		let clip = clip?;

		store.upsert(&clip).await?;

		let count = stored.fetch_add(1, Ordering::AcqRel) + 1;

		if count % PROGRESS_EVERY == 0 {
			tracing::info!(stored = count, created_at = %clip.created_at, "harvest progress");
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// crates.io
	use futures::stream;
	use time::macros;
	// self
	use super::*;
	use crate::{
		_preludet::clip_fixture,
		clips::{ClipRecord, ClipStream},
		clock::ManualClock,
		error::FetchError,
		store::{MemoryClipStore, StoreError, StoreFuture},
	};

	const NOW: OffsetDateTime = macros::datetime!(2023-02-08 13:00 UTC);

	#[derive(Default)]
	struct ScriptedSource {
		queries: Mutex<Vec<ClipQuery>>,
	}
	impl ClipSource for ScriptedSource {
		fn clips(&self, query: ClipQuery) -> ClipStream {
			let id = query.broadcaster_id.clone();

			self.queries.lock().push(query);

			match id.as_str() {
				"failing" => Box::pin(stream::iter([
					Ok(clip_fixture("failing-1", &id, 1)),
					Err(Error::from(FetchError::Status { status: 503, body: "unavailable".into() })),
				])),
				"stalled" => Box::pin(stream::pending::<Result<ClipRecord>>()),
				_ => Box::pin(stream::iter(
					(0..3).map(move |n| Ok::<_, Error>(clip_fixture(&format!("{id}-{n}"), &id, n))),
				)),
			}
		}
	}

	struct RejectingStore;
	impl ClipStore for RejectingStore {
		fn upsert<'a>(&'a self, _: &'a ClipRecord) -> StoreFuture<'a, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "disk full".into() }) })
		}
	}

	/// Accepts two upserts, then panics.
	#[derive(Default)]
	struct PanickingStore {
		upserts: AtomicUsize,
	}
	impl ClipStore for PanickingStore {
		fn upsert<'a>(&'a self, _: &'a ClipRecord) -> StoreFuture<'a, ()> {
			Box::pin(async move {
				if self.upserts.fetch_add(1, Ordering::SeqCst) == 2 {
					panic!("store crashed mid-harvest");
				}

				Ok(())
			})
		}
	}

	fn runner(source: Arc<ScriptedSource>, store: Arc<dyn ClipStore>, ids: &[&str]) -> Runner {
		Runner::new(source, store, ids.iter().copied())
			.with_clock(Arc::new(ManualClock::new(NOW)))
			.with_period(Duration::days(3))
	}

	#[test]
	fn windows_share_one_instant() {
		let runner = runner(
			Arc::new(ScriptedSource::default()),
			Arc::new(MemoryClipStore::default()),
			&["3593082", "790564"],
		);
		let windows = runner.windows().expect("Window should be representable.");

		assert_eq!(windows.len(), 2);

		for window in &windows {
			assert_eq!(window.started_at, macros::datetime!(2023-02-05 13:00 UTC));
			assert_eq!(window.ended_at, NOW);
		}
	}

	#[test]
	fn unrepresentable_window_is_a_config_error() {
		let runner = runner(
			Arc::new(ScriptedSource::default()),
			Arc::new(MemoryClipStore::default()),
			&["1"],
		)
		.with_period(Duration::MAX);

		assert!(matches!(
			runner.windows(),
			Err(Error::Config(ConfigError::WindowOutOfRange { .. }))
		));
	}

	#[tokio::test]
	async fn every_account_is_harvested_with_the_same_window() {
		let source = Arc::new(ScriptedSource::default());
		let store = MemoryClipStore::default();
		let ids = ["3593082", "790564", "11772"];
		let report = runner(source.clone(), Arc::new(store.clone()), &ids)
			.run()
			.await
			.expect("Run should complete.");

		assert_eq!(report.stored(), 9);
		assert_eq!(report.failures().count(), 0);
		assert_eq!(store.len(), 9);

		let queries = source.queries.lock();

		assert_eq!(queries.len(), 3);
		for (query, id) in queries.iter().zip(ids) {
			assert_eq!(query.broadcaster_id, id);
			assert_eq!(query.started_at, Some(macros::datetime!(2023-02-05 13:00 UTC)));
			assert_eq!(query.ended_at, Some(NOW));
		}
	}

	#[tokio::test]
	async fn failing_account_does_not_affect_siblings() {
		let store = MemoryClipStore::default();
		let report = runner(
			Arc::new(ScriptedSource::default()),
			Arc::new(store.clone()),
			&["a", "failing", "c"],
		)
		.run()
		.await
		.expect("Per-account failures should not fail the run.");
		let failing = report.outcome("failing").expect("Failing account should be reported.");

		assert_eq!(failing.stored, 1);
		assert!(matches!(
			failing.result,
			Err(Error::FetchFailed(FetchError::Status { status: 503, .. }))
		));
		assert!(report.outcome("a").is_some_and(AccountOutcome::is_success));
		assert!(report.outcome("c").is_some_and(AccountOutcome::is_success));
		assert_eq!(store.len(), 7);
	}

	#[tokio::test]
	async fn persist_failure_is_reported_per_account() {
		let report = runner(Arc::new(ScriptedSource::default()), Arc::new(RejectingStore), &["a"])
			.run()
			.await
			.expect("Run should complete.");
		let outcome = report.outcome("a").expect("Account should be reported.");

		assert_eq!(outcome.stored, 0);
		assert!(matches!(outcome.result, Err(Error::PersistFailed(_))));
	}

	#[tokio::test]
	async fn panicking_task_keeps_its_stored_count() {
		let report =
			runner(Arc::new(ScriptedSource::default()), Arc::new(PanickingStore::default()), &["a"])
				.run()
				.await
				.expect("A panicking task should not fail the run.");
		let outcome = report.outcome("a").expect("Account should be reported.");

		assert_eq!(outcome.stored, 2);
		assert!(matches!(outcome.result, Err(Error::TaskFailed { .. })));
	}

	#[test]
	fn from_config_validates_and_dedupes_broadcasters() {
		let config = Config::from_toml(
			r#"
			[fetch]
			broadcasterIds = [3593082, "790564", "3593082", 790564]

			[twitch]
			clientId = "harvester"
			secret = "s3cr3t"
			"#,
		)
		.expect("Config should parse.");
		let (runner, manager) = Runner::from_config(&config, Arc::new(MemoryClipStore::default()))
			.expect("Runner should build.");

		assert_eq!(runner.broadcaster_ids(), ["3593082", "790564"]);
		assert_eq!(config.fetch.broadcaster_ids.len(), 4);
		assert_eq!(manager.client_id(), "harvester");
	}

	#[test]
	fn from_config_rejects_missing_credentials() {
		let config = Config::from_toml(
			r#"
			[fetch]
			broadcasterIds = ["1"]

			[twitch]
			clientId = "harvester"
			"#,
		)
		.expect("Config should parse.");

		assert!(matches!(
			Runner::from_config(&config, Arc::new(MemoryClipStore::default())),
			Err(Error::Config(ConfigError::Missing { key: "twitch.secret" }))
		));
	}

	#[tokio::test]
	async fn cancellation_stops_stalled_tasks() {
		let cancel = CancellationToken::new();
		let store = MemoryClipStore::default();
		let runner =
			runner(Arc::new(ScriptedSource::default()), Arc::new(store.clone()), &["stalled"]);
		let trigger = cancel.clone();
		let (report, ()) = tokio::join!(runner.run_until(&cancel), async move {
			tokio::task::yield_now().await;
			trigger.cancel();
		});
		let report = report.expect("Cancelled run should still report.");

		assert!(matches!(report.outcomes[0].result, Err(Error::Cancelled)));
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn empty_account_list_yields_empty_report() {
		let source = Arc::new(ScriptedSource::default());
		let report = runner(source, Arc::new(MemoryClipStore::default()), &[])
			.run()
			.await
			.expect("Empty run should succeed.");

		assert!(report.outcomes.is_empty());
	}
}
