//! Periodic Twitch clip harvester: a client-credentials token lifecycle that never serves an
//! expired bearer, a lazily pulled cursor-paginated clip stream, and a runner that fans out one
//! isolated fetch-and-upsert task per broadcaster.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod clips;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod manager;
pub mod oauth;
pub mod obs;
pub mod runner;
pub mod store;
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and fixtures shared by unit and integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{ClientCredential, TokenSecret},
		clips::ClipRecord,
		clock::ManualClock,
		http::{ReqwestTransport, RequestAuthorizer},
		manager::TokenManager,
		oauth::AuthorizationClient,
		store::MemoryTokenStore,
	};

	/// Client identifier shared by integration tests.
	pub const TEST_CLIENT_ID: &str = "TestClient";
	/// Client secret shared by integration tests.
	pub const TEST_CLIENT_SECRET: &str = "none";

	/// Builds the credential pair used across integration tests.
	pub fn test_credential() -> ClientCredential {
		ClientCredential::new(TEST_CLIENT_ID, TokenSecret::new(TEST_CLIENT_SECRET))
	}

	/// Parses an RFC 3339 timestamp fixture.
	pub fn instant(value: &str) -> OffsetDateTime {
		OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
			.expect("Timestamp fixture should be valid RFC 3339.")
	}

	/// Builds a clip fixture owned by `broadcaster_id`.
	pub fn clip_fixture(id: &str, broadcaster_id: &str, view_count: i64) -> ClipRecord {
		ClipRecord {
			id: id.into(),
			broadcaster_id: broadcaster_id.into(),
			creator_id: "53834192".into(),
			video_id: Some("205586603".into()),
			game_id: Some("488191".into()),
			title: format!("clip {id}"),
			view_count,
			created_at: instant("2017-11-30T22:34:18Z"),
			duration: 60.,
			vod_offset: Some(480),
		}
	}

	/// Wires a reqwest-backed [`RequestAuthorizer`] against a token endpoint, returning the
	/// manager and clock so tests can inspect cache state and move time forward.
	pub fn build_authorized_transport(
		authorization_url: Url,
		now: OffsetDateTime,
	) -> (RequestAuthorizer<ReqwestTransport>, Arc<TokenManager>, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::new(now));
		let client = AuthorizationClient::new(authorization_url);
		let manager = Arc::new(
			TokenManager::new(test_credential(), Arc::new(client), Arc::new(MemoryTokenStore::default()))
				.with_clock(clock.clone()),
		);
		let authorizer = RequestAuthorizer::new(ReqwestTransport::default(), manager.clone());

		(authorizer, manager, clock)
	}
}

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
// The binary target owns the CLI and subscriber wiring.
use {clap as _, color_eyre as _, tracing_subscriber as _};
#[cfg(test)] use {httpmock as _, tempfile as _};
