//! Storage contracts: the single-slot token cache and the clip upsert sink.

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryClipStore, MemoryTokenStore};
pub use sqlite::SqliteClipStore;

// self
use crate::{_prelude::*, auth::CachedToken, clips::ClipRecord};

/// Boxed future returned by [`ClipStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Process-wide slot holding at most one cached token.
///
/// Implementations carry no expiry policy. Readers must observe either the previous or the
/// new token, never a partially written one.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Returns the current token, if any.
	fn get(&self) -> Option<CachedToken>;

	/// Replaces the slot contents.
	fn set(&self, token: CachedToken);
}

/// Idempotent sink for fetched clips.
///
/// `upsert` inserts the full row keyed by [`ClipRecord::id`]. On a conflicting id only the
/// mutable columns (`video_id`, `game_id`, `view_count`, `vod_offset`) are replaced; every other
/// column keeps the value from the first insert.
pub trait ClipStore
where
	Self: Send + Sync,
{
	/// Inserts or updates one clip in a single atomic statement.
	fn upsert<'a>(&'a self, clip: &'a ClipRecord) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`ClipStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl From<sqlx::Error> for StoreError {
	fn from(e: sqlx::Error) -> Self {
		Self::Backend { message: e.to_string() }
	}
}

/// Applies the conflict policy shared by every [`ClipStore`].
pub(crate) fn merge_conflict(existing: &mut ClipRecord, incoming: &ClipRecord) {
	existing.video_id.clone_from(&incoming.video_id);
	existing.game_id.clone_from(&incoming.game_id);
	existing.view_count = incoming.view_count;
	existing.vod_offset = incoming.vod_offset;
}
