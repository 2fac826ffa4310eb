//! Access token returned by a single client-credentials exchange.

// self
use crate::{_prelude::*, auth::TokenSecret, error::AuthorizationError};

// Ten years; anything longer is treated as a malformed response.
const MAX_EXPIRES_IN_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Wire shape of the authorization endpoint's success body.
#[derive(Debug, Deserialize)]
pub(crate) struct AccessTokenResponse {
	pub access_token: TokenSecret,
	pub expires_in: u64,
}

/// Opaque bearer credential plus the lifetime granted by the identity endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
	/// Bearer credential.
	pub token: TokenSecret,
	/// Lifetime counted from the moment the token was received.
	pub valid_for: Duration,
}
impl AccessToken {
	/// Creates a token valid for `valid_for`.
	pub fn new(token: impl Into<String>, valid_for: Duration) -> Self {
		Self { token: TokenSecret::new(token), valid_for }
	}
}
impl TryFrom<AccessTokenResponse> for AccessToken {
	type Error = AuthorizationError;

	fn try_from(response: AccessTokenResponse) -> Result<Self, Self::Error> {
		if response.expires_in == 0 {
			return Err(AuthorizationError::NonPositiveExpiresIn);
		}

		if response.expires_in > MAX_EXPIRES_IN_SECS {
			return Err(AuthorizationError::ExpiresInOutOfRange);
		}

		Ok(Self {
			token: response.access_token,
			valid_for: Duration::seconds(response.expires_in as i64),
		})
	}
}
