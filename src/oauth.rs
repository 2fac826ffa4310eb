//! Client-credentials exchange against the identity endpoint.
//!
//! [`AuthorizationClient`] performs exactly one form-encoded POST per call and never retries;
//! [`TokenSource`] is the seam [`TokenManager`](crate::manager::TokenManager) depends on so
//! expiry policy can be exercised without a network.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, ClientCredential, token::access::AccessTokenResponse},
	error::{self, AuthorizationError},
	obs::{self, Stage, StageOutcome, StageSpan},
};

/// Boxed future returned by [`TokenSource::authorize`].
pub type AuthorizeFuture<'a> =
	Pin<Box<dyn Future<Output = Result<AccessToken, AuthorizationError>> + 'a + Send>>;

/// Anything able to mint an access token for a client credential.
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Exchanges `credential` for a fresh access token.
	fn authorize<'a>(&'a self, credential: &'a ClientCredential) -> AuthorizeFuture<'a>;
}

/// Stateless client for the `client_credentials` grant.
///
/// Token endpoints answer directly, so any custom [`ReqwestClient`] passed in should not
/// follow redirects.
#[derive(Clone, Debug)]
pub struct AuthorizationClient {
	http_client: ReqwestClient,
	endpoint: Url,
}
impl AuthorizationClient {
	/// Creates a client posting to `endpoint` with a default reqwest client.
	pub fn new(endpoint: Url) -> Self {
		Self::with_client(ReqwestClient::default(), endpoint)
	}

	/// Creates a client posting to `endpoint` through `http_client`.
	pub fn with_client(http_client: ReqwestClient, endpoint: Url) -> Self {
		Self { http_client, endpoint }
	}

	/// Identity endpoint this client posts to.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	async fn exchange(
		&self,
		credential: &ClientCredential,
	) -> Result<AccessToken, AuthorizationError> {
		let response = self
			.http_client
			.post(self.endpoint.clone())
			.form(&credential.grant_form())
			.send()
			.await?;
		let status = response.status();
		let body = response.bytes().await?;

		if !status.is_success() {
			return Err(AuthorizationError::Status {
				status: status.as_u16(),
				body: error::body_preview(&body),
			});
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&body);
		let parsed: AccessTokenResponse = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| AuthorizationError::Parse { source, status: status.as_u16() })?;

		AccessToken::try_from(parsed)
	}
}
impl TokenSource for AuthorizationClient {
	fn authorize<'a>(&'a self, credential: &'a ClientCredential) -> AuthorizeFuture<'a> {
		const STAGE: Stage = Stage::Authorize;

		Box::pin(async move {
			obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

			let result = StageSpan::new(STAGE).instrument(self.exchange(credential)).await;

			obs::record_stage_outcome(STAGE, StageOutcome::of(&result));

			result
		})
	}
}
