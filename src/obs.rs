//! Observability helpers shared by the token, fetch, and persistence stages.
//!
//! # Feature Flags
//!
//! - Spans named `twitch_clips.stage` carry the `stage` field and, where known, the
//!   `broadcaster_id` being processed.
//! - Enable `metrics` to increment the `twitch_clips_stage_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`.

mod counter;
mod span;

pub use counter::*;
pub use span::*;

// self
use crate::_prelude::*;

/// Pipeline stages observed by the harvester.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
	/// Client-credentials exchange against the identity endpoint.
	Authorize,
	/// Single page request against the data endpoint.
	FetchPage,
	/// Fetch-and-persist task for one broadcaster.
	Harvest,
	/// Whole orchestration run.
	Run,
}
impl Stage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Stage::Authorize => "authorize",
			Stage::FetchPage => "fetch_page",
			Stage::Harvest => "harvest",
			Stage::Run => "run",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Entry to a stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Success => "success",
			StageOutcome::Failure => "failure",
		}
	}

	/// Maps a result onto its terminal outcome.
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		match result {
			Ok(_) => StageOutcome::Success,
			Err(_) => StageOutcome::Failure,
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
