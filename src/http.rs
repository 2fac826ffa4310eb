//! Outbound transport primitives for the data endpoint.
//!
//! [`HttpTransport`] is the only dependency the fetcher has on an HTTP stack. Middleware is
//! expressed by wrapping one transport in another: [`RequestAuthorizer`] asks the
//! [`TokenManager`] for a valid token on every call, stamps `Authorization` and `Client-Id`
//! headers, and forwards to the inner transport.

// crates.io
use reqwest::{
	Request, Response,
	header::{AUTHORIZATION, HeaderName, HeaderValue},
};
// self
use crate::{_prelude::*, error::FetchError, manager::TokenManager};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<Response>> + 'a + Send>>;

/// Header carrying the static client identifier.
pub const CLIENT_ID: HeaderName = HeaderName::from_static("client-id");

/// Executes fully built requests.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by every
/// broadcaster task. Timeouts belong to the underlying client configuration.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves with the raw response, whatever its status.
	fn execute(&self, request: Request) -> TransportFuture<'_>;
}
impl<T> HttpTransport for Arc<T>
where
	T: ?Sized + HttpTransport,
{
	fn execute(&self, request: Request) -> TransportFuture<'_> {
		(**self).execute(request)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: Request) -> TransportFuture<'_> {
		Box::pin(async move {
			self.0.execute(request).await.map_err(|e| Error::from(FetchError::from(e)))
		})
	}
}

/// Middleware that authorizes every outbound call.
///
/// The token manager is consulted once per request, never once per fetch, so a token that
/// expires halfway through a pagination run is replaced before the very next page. Failures
/// to obtain a token surface as [`Error::AuthorizationFailed`]; the wrapped request is not sent
/// and not retried.
pub struct RequestAuthorizer<T>
where
	T: HttpTransport,
{
	inner: T,
	manager: Arc<TokenManager>,
}
impl<T> RequestAuthorizer<T>
where
	T: HttpTransport,
{
	/// Wraps `inner`, drawing tokens from `manager`.
	pub fn new(inner: T, manager: Arc<TokenManager>) -> Self {
		Self { inner, manager }
	}

	/// Token manager backing this middleware.
	pub fn manager(&self) -> &Arc<TokenManager> {
		&self.manager
	}

	async fn authorize(&self, mut request: Request) -> Result<Request> {
		let token = self.manager.valid_token().await?;
		let bearer = HeaderValue::try_from(format!("Bearer {}", token.value.expose()))
			.map_err(|e| FetchError::InvalidRequest { reason: e.to_string() })?;
		let client_id = HeaderValue::try_from(self.manager.client_id())
			.map_err(|e| FetchError::InvalidRequest { reason: e.to_string() })?;
		let headers = request.headers_mut();

		headers.insert(AUTHORIZATION, bearer);
		headers.insert(CLIENT_ID, client_id);

		Ok(request)
	}
}
impl<T> HttpTransport for RequestAuthorizer<T>
where
	T: HttpTransport,
{
	fn execute(&self, request: Request) -> TransportFuture<'_> {
		Box::pin(async move {
			let request = self.authorize(request).await?;

			self.inner.execute(request).await
		})
	}
}
impl<T> Debug for RequestAuthorizer<T>
where
	T: HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestAuthorizer").field("manager", &self.manager).finish()
	}
}
