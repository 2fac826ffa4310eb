//! Static client credential pair used for the client-credentials grant.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Client identifier + secret loaded once at startup and shared read-only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientCredential {
	/// Public client identifier, also sent as the `Client-Id` header.
	pub client_id: String,
	/// Confidential client secret.
	pub client_secret: TokenSecret,
}
impl ClientCredential {
	/// Creates a new credential pair.
	pub fn new(client_id: impl Into<String>, client_secret: TokenSecret) -> Self {
		Self { client_id: client_id.into(), client_secret }
	}

	/// Form body for the `client_credentials` grant.
	pub(crate) fn grant_form(&self) -> [(&'static str, &str); 3] {
		[
			("client_id", self.client_id.as_str()),
			("client_secret", self.client_secret.expose()),
			("grant_type", "client_credentials"),
		]
	}
}
