//! Thread-safe in-memory stores for local runs and tests.

// self
use crate::{
	_prelude::*,
	auth::CachedToken,
	clips::ClipRecord,
	store::{self, ClipStore, StoreFuture, TokenStore},
};

/// Single-slot token cache guarded by a read-write lock.
///
/// The slot is swapped as a whole under the write lock, so readers never see a torn value.
#[derive(Debug, Default)]
pub struct MemoryTokenStore(RwLock<Option<CachedToken>>);
impl MemoryTokenStore {
	/// Creates a store pre-populated with `token`.
	pub fn with_token(token: CachedToken) -> Self {
		Self(RwLock::new(Some(token)))
	}
}
impl TokenStore for MemoryTokenStore {
	fn get(&self) -> Option<CachedToken> {
		self.0.read().clone()
	}

	fn set(&self, token: CachedToken) {
		*self.0.write() = Some(token);
	}
}

type ClipMap = Arc<RwLock<HashMap<String, ClipRecord>>>;

/// In-process clip store applying the same conflict policy as the SQL backends.
#[derive(Clone, Debug, Default)]
pub struct MemoryClipStore {
	clips: ClipMap,
	writes: Arc<Mutex<Vec<String>>>,
}
impl MemoryClipStore {
	/// Returns the stored clip for `id`.
	pub fn get(&self, id: &str) -> Option<ClipRecord> {
		self.clips.read().get(id).cloned()
	}

	/// Number of distinct clips stored.
	pub fn len(&self) -> usize {
		self.clips.read().len()
	}

	/// Returns `true` when nothing has been stored.
	pub fn is_empty(&self) -> bool {
		self.clips.read().is_empty()
	}

	/// Ids in the order upserts were applied, duplicates included.
	pub fn write_log(&self) -> Vec<String> {
		self.writes.lock().clone()
	}

	fn upsert_now(&self, clip: &ClipRecord) {
		let mut guard = self.clips.write();

		match guard.get_mut(&clip.id) {
			Some(existing) => store::merge_conflict(existing, clip),
			None => {
				guard.insert(clip.id.clone(), clip.clone());
			},
		}

		self.writes.lock().push(clip.id.clone());
	}
}
impl ClipStore for MemoryClipStore {
	fn upsert<'a>(&'a self, clip: &'a ClipRecord) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.upsert_now(clip);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::_preludet::clip_fixture;

	#[test]
	fn token_slot_is_replaced_wholesale() {
		let store = MemoryTokenStore::default();

		assert!(store.get().is_none());

		store.set(CachedToken::new("first", macros::datetime!(2023-01-30 18:00 UTC)));
		store.set(CachedToken::new("second", macros::datetime!(2023-01-30 19:00 UTC)));

		let current = store.get().expect("Slot should hold the latest token.");

		assert_eq!(current.value.expose(), "second");
		assert_eq!(current.expires_at, macros::datetime!(2023-01-30 19:00 UTC));
	}

	#[tokio::test]
	async fn upsert_twice_keeps_one_row_with_latest_view_count() {
		let store = MemoryClipStore::default();
		let first = clip_fixture("clip-1", "175", 10);
		let mut second = clip_fixture("clip-1", "175", 296_914);

		second.title = "changed".into();

		store.upsert(&first).await.expect("First upsert should succeed.");
		store.upsert(&second).await.expect("Second upsert should succeed.");

		let stored = store.get("clip-1").expect("Clip should be stored.");

		assert_eq!(store.len(), 1);
		assert_eq!(stored.view_count, 296_914);
		assert_eq!(stored.title, "clip clip-1");
		assert_eq!(store.write_log(), vec!["clip-1".to_owned(), "clip-1".to_owned()]);
	}
}
