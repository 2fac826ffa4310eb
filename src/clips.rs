//! Clip model, query window, and the lazily paginated clip stream.

pub mod fetcher;
pub mod record;

pub use fetcher::*;
pub use record::*;

// crates.io
use futures::Stream;
// self
use crate::_prelude::*;

/// Lazily produced clip sequence.
///
/// Items arrive in page order, then response order within a page. An `Err` item ends the
/// stream; everything yielded before it stays valid.
pub type ClipStream = Pin<Box<dyn Stream<Item = Result<ClipRecord>> + Send>>;

/// Broadcaster plus optional creation window for one fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClipQuery {
	/// Broadcaster whose clips are listed.
	pub broadcaster_id: String,
	/// Inclusive lower bound on `created_at`; omitted from the request when unset.
	pub started_at: Option<OffsetDateTime>,
	/// Upper bound on `created_at`; omitted from the request when unset.
	pub ended_at: Option<OffsetDateTime>,
}
impl ClipQuery {
	/// Lists every clip of `broadcaster_id`.
	pub fn new(broadcaster_id: impl Into<String>) -> Self {
		Self { broadcaster_id: broadcaster_id.into(), started_at: None, ended_at: None }
	}

	/// Restricts the query to clips created at or after `instant`.
	pub fn started_at(mut self, instant: OffsetDateTime) -> Self {
		self.started_at = Some(instant);

		self
	}

	/// Restricts the query to clips created before `instant`.
	pub fn ended_at(mut self, instant: OffsetDateTime) -> Self {
		self.ended_at = Some(instant);

		self
	}
}

/// Anything able to produce a clip stream for a query.
pub trait ClipSource
where
	Self: Send + Sync,
{
	/// Starts a fresh sequence for `query`; every call restarts from the first page.
	fn clips(&self, query: ClipQuery) -> ClipStream;
}
