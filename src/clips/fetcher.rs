//! Cursor pagination over the `/clips` collection.
//!
//! Pages are requested on demand: the next request is only issued once the consumer has
//! drained every clip of the previous page and polls again. Nothing is prefetched, so a
//! consumer that stops after `n` clips costs `ceil(n / page_size)` requests at most.

// crates.io
use futures::stream;
use reqwest::{Method, Request};
use time::{UtcOffset, format_description::well_known::Rfc3339};
// self
use crate::{
	_prelude::*,
	clips::{ClipQuery, ClipRecord, ClipSource, ClipStream},
	error::{self, ConfigError, FetchError},
	http::HttpTransport,
	obs::{self, Stage, StageOutcome, StageSpan},
};

/// Largest page the data endpoint serves.
pub const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct Page {
	data: Vec<ClipRecord>,
	#[serde(default)]
	pagination: Option<Pagination>,
}
impl Page {
	fn into_parts(self) -> (Vec<ClipRecord>, Option<String>) {
		let cursor = self.pagination.and_then(|p| p.cursor).filter(|c| !c.is_empty());

		(self.data, cursor)
	}
}

#[derive(Debug, Deserialize)]
struct Pagination {
	#[serde(default)]
	cursor: Option<String>,
}

#[derive(Debug)]
enum NextPage {
	First,
	After(String),
	Done,
}

struct Pager {
	fetcher: PaginatedFetcher,
	query: ClipQuery,
	buffer: VecDeque<ClipRecord>,
	next: NextPage,
}

/// Drives the cursor protocol of the data endpoint.
#[derive(Clone)]
pub struct PaginatedFetcher {
	transport: Arc<dyn HttpTransport>,
	endpoint: Url,
	page_size: usize,
}
impl PaginatedFetcher {
	/// Creates a fetcher for `<base_url>/clips`, sending requests through `transport`.
	pub fn new(transport: Arc<dyn HttpTransport>, base_url: &Url) -> Result<Self> {
		let mut endpoint = base_url.clone();

		endpoint
			.path_segments_mut()
			.map_err(|_| ConfigError::CannotBeABase { value: base_url.to_string() })?
			.pop_if_empty()
			.push("clips");
		endpoint.set_query(None);

		Ok(Self { transport, endpoint, page_size: PAGE_SIZE })
	}

	/// Overrides the page size, clamped to `1..=PAGE_SIZE`.
	pub fn with_page_size(mut self, page_size: usize) -> Self {
		self.page_size = page_size.clamp(1, PAGE_SIZE);

		self
	}

	/// Collection endpoint requests are sent to.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	/// Returns a lazy stream over every clip matching `query`.
	pub fn fetch(&self, query: ClipQuery) -> ClipStream {
		let pager =
			Pager { fetcher: self.clone(), query, buffer: VecDeque::new(), next: NextPage::First };

		Box::pin(stream::unfold(Some(pager), |pager| async move {
			let mut pager = pager?;

			loop {
				if let Some(clip) = pager.buffer.pop_front() {
					return Some((Ok(clip), Some(pager)));
				}

				let cursor = match &pager.next {
					NextPage::First => None,
					NextPage::After(cursor) => Some(cursor.as_str()),
					NextPage::Done => return None,
				};

				let result = pager.fetcher.page(&pager.query, cursor).await;

				match result {
					Ok((clips, cursor)) => {
						pager.next = cursor.map_or(NextPage::Done, NextPage::After);
						pager.buffer.extend(clips);
					},
					Err(e) => return Some((Err(e), None)),
				}
			}
		}))
	}

	async fn page(
		&self,
		query: &ClipQuery,
		cursor: Option<&str>,
	) -> Result<(Vec<ClipRecord>, Option<String>)> {
		const STAGE: Stage = Stage::FetchPage;

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		let result = StageSpan::for_broadcaster(STAGE, &query.broadcaster_id)
			.instrument(self.request_page(query, cursor))
			.await;

		obs::record_stage_outcome(STAGE, StageOutcome::of(&result));

		result
	}

	async fn request_page(
		&self,
		query: &ClipQuery,
		cursor: Option<&str>,
	) -> Result<(Vec<ClipRecord>, Option<String>)> {
		let url = self.page_url(query, cursor)?;

		tracing::debug!(%url, "requesting clip page");

		let response = self.transport.execute(Request::new(Method::GET, url)).await?;
		let status = response.status();
		let body = response.bytes().await.map_err(FetchError::from)?;

		if !status.is_success() {
			return Err(FetchError::Status {
				status: status.as_u16(),
				body: error::body_preview(&body),
			}
			.into());
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&body);
		let page: Page = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| FetchError::Parse { source })?;
		let (clips, cursor) = page.into_parts();

		match &cursor {
			Some(cursor) => tracing::debug!(cursor, "response contains cursor to next page"),
			None => tracing::debug!("response contains last page"),
		}

		Ok((clips, cursor))
	}

	fn page_url(&self, query: &ClipQuery, cursor: Option<&str>) -> Result<Url, FetchError> {
		let mut url = self.endpoint.clone();

		{
			let mut pairs = url.query_pairs_mut();

			pairs.append_pair("broadcaster_id", &query.broadcaster_id);

			if let Some(instant) = query.started_at {
				pairs.append_pair("started_at", &format_instant(instant)?);
			}
			if let Some(instant) = query.ended_at {
				pairs.append_pair("ended_at", &format_instant(instant)?);
			}
			if let Some(cursor) = cursor {
				pairs.append_pair("after", cursor);
			}

			pairs.append_pair("first", &self.page_size.to_string());
		}

		Ok(url)
	}
}
impl ClipSource for PaginatedFetcher {
	fn clips(&self, query: ClipQuery) -> ClipStream {
		self.fetch(query)
	}
}
impl Debug for PaginatedFetcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PaginatedFetcher")
			.field("endpoint", &self.endpoint.as_str())
			.field("page_size", &self.page_size)
			.finish()
	}
}

fn format_instant(instant: OffsetDateTime) -> Result<String, FetchError> {
	instant
		.to_offset(UtcOffset::UTC)
		.format(&Rfc3339)
		.map_err(|e| FetchError::InvalidRequest { reason: e.to_string() })
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::http::TransportFuture;

	struct Unreachable;
	impl HttpTransport for Unreachable {
		fn execute(&self, _: Request) -> TransportFuture<'_> {
			unreachable!("URL construction tests never send requests")
		}
	}

	fn fetcher(base: &str) -> PaginatedFetcher {
		PaginatedFetcher::new(
			Arc::new(Unreachable),
			&Url::parse(base).expect("Base URL fixture should parse."),
		)
		.expect("Fetcher should accept the base URL.")
	}

	#[test]
	fn endpoint_appends_clips_with_or_without_trailing_slash() {
		let expected = "http://localhost/helix/clips";

		assert_eq!(fetcher("http://localhost/helix/").endpoint().as_str(), expected);
		assert_eq!(fetcher("http://localhost/helix").endpoint().as_str(), expected);
	}

	#[test]
	fn page_url_omits_unset_parameters() {
		let url = fetcher("https://api.twitch.tv/helix/")
			.page_url(&ClipQuery::new("3593082"), None)
			.expect("URL should build.");

		assert_eq!(
			url.as_str(),
			"https://api.twitch.tv/helix/clips?broadcaster_id=3593082&first=100"
		);
	}

	#[test]
	fn page_url_carries_window_and_cursor() {
		let query = ClipQuery::new("3593082")
			.started_at(macros::datetime!(2023-02-05 13:00 UTC))
			.ended_at(macros::datetime!(2023-02-08 16:00 +3));
		let url = fetcher("https://api.twitch.tv/helix/")
			.with_page_size(20)
			.page_url(&query, Some("R2NPJuG4vCvycWtA"))
			.expect("URL should build.");
		let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();

		assert_eq!(pairs["started_at"], "2023-02-05T13:00:00Z");
		assert_eq!(pairs["ended_at"], "2023-02-08T13:00:00Z");
		assert_eq!(pairs["after"], "R2NPJuG4vCvycWtA");
		assert_eq!(pairs["first"], "20");
	}

	#[test]
	fn empty_cursor_means_last_page() {
		let page: Page = serde_json::from_str(r#"{"data": [], "pagination": {"cursor": ""}}"#)
			.expect("Page fixture should parse.");

		assert_eq!(page.into_parts().1, None);

		let page: Page = serde_json::from_str(r#"{"data": [], "paginator": {}}"#)
			.expect("Page without pagination should parse.");

		assert_eq!(page.into_parts().1, None);
	}
}
