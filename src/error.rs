//! Harvester-level error types shared across authorization, fetching, and persistence.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const BODY_PREVIEW_LIMIT: usize = 256;

/// Canonical harvester error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The identity endpoint could not issue a token.
	#[error("Authorization failed: {0}")]
	AuthorizationFailed(#[from] AuthorizationError),
	/// The data endpoint failed mid-pagination.
	#[error("Fetch failed: {0}")]
	FetchFailed(#[from] FetchError),
	/// A record could not be upserted.
	#[error("Persist failed: {0}")]
	PersistFailed(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The task was aborted by a cancellation signal.
	#[error("Task was cancelled before completion.")]
	Cancelled,
	/// The task ended abnormally (panic or runtime shutdown).
	#[error("Task ended abnormally: {message}.")]
	TaskFailed {
		/// Join failure description.
		message: String,
	},
}

/// Failures raised while exchanging client credentials for an access token.
#[derive(Debug, ThisError)]
pub enum AuthorizationError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the authorization endpoint.")]
	Transport {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Authorization endpoint answered with a non-success status.
	#[error("Authorization endpoint returned status {status}: {body}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Truncated response body.
		body: String,
	},
	/// Authorization endpoint responded with JSON that could not be parsed.
	#[error("Authorization endpoint returned malformed JSON.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code.
		status: u16,
	},
	/// Token endpoint returned a zero `expires_in`.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}
impl AuthorizationError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { source: Box::new(src) }
	}
}
impl From<ReqwestError> for AuthorizationError {
	fn from(e: ReqwestError) -> Self {
		Self::transport(e)
	}
}

/// Failures raised while requesting a page from the data endpoint.
#[derive(Debug, ThisError)]
pub enum FetchError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the data endpoint.")]
	Transport {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Data endpoint answered with a non-success status.
	#[error("Data endpoint returned status {status}: {body}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Truncated response body.
		body: String,
	},
	/// Data endpoint responded with a page that could not be parsed.
	#[error("Data endpoint returned a malformed page.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Page request could not be assembled.
	#[error("Page request could not be built: {reason}.")]
	InvalidRequest {
		/// Human-readable reason.
		reason: String,
	},
}
impl FetchError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { source: Box::new(src) }
	}
}
impl From<ReqwestError> for FetchError {
	fn from(e: ReqwestError) -> Self {
		Self::transport(e)
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Configured endpoint is not a valid URL.
	#[error("Endpoint `{value}` is not a valid URL.")]
	InvalidUrl {
		/// Raw configured value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Configured base URL cannot carry path segments.
	#[error("Base URL `{value}` cannot be used as a base for API paths.")]
	CannotBeABase {
		/// Raw configured value.
		value: String,
	},
	/// Period literal is not a supported ISO-8601 duration.
	#[error("Period `{value}` is invalid: {reason}.")]
	InvalidPeriod {
		/// Raw configured value.
		value: String,
		/// Human-readable reason.
		reason: &'static str,
	},
	/// Fetch window start falls outside the representable range.
	#[error("Fetch window starting {period} before {end} is out of range.")]
	WindowOutOfRange {
		/// Configured lookback period.
		period: Duration,
		/// Window end.
		end: OffsetDateTime,
	},
	/// Required configuration key is empty or absent.
	#[error("Configuration key `{key}` must be set.")]
	Missing {
		/// Dotted key path.
		key: &'static str,
	},
	/// Configuration file could not be read.
	#[error("Configuration file `{path}` could not be read.")]
	Read {
		/// Path that failed.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Configuration file is not valid TOML for the expected schema.
	#[error("Configuration file could not be parsed.")]
	Parse(#[from] toml::de::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Truncates a response body so errors stay loggable.
pub(crate) fn body_preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);
	let trimmed = text.trim();

	match trimmed.char_indices().nth(BODY_PREVIEW_LIMIT) {
		Some((cut, _)) => format!("{}...", &trimmed[..cut]),
		None => trimmed.to_owned(),
	}
}
