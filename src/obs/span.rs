// crates.io
use tracing::{Span, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::Stage};

/// A span builder used by pipeline stages.
#[derive(Clone, Debug)]
pub struct StageSpan {
	span: Span,
}
impl StageSpan {
	/// Creates a new span tagged with the provided stage.
	pub fn new(stage: Stage) -> Self {
		Self { span: tracing::info_span!("twitch_clips.stage", stage = stage.as_str()) }
	}

	/// Creates a span scoped to one broadcaster.
	pub fn for_broadcaster(stage: Stage, broadcaster_id: &str) -> Self {
		Self {
			span: tracing::info_span!(
				"twitch_clips.stage",
				stage = stage.as_str(),
				broadcaster_id
			),
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		use tracing::Instrument;

		fut.instrument(self.span.clone())
	}
}
