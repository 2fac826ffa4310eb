//! SQLite-backed [`ClipStore`] built on `sqlx`.

// std
use std::path::Path;
// crates.io
use sqlx::{
	Row,
	sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow},
};
// self
use crate::{
	_prelude::*,
	clips::ClipRecord,
	store::{ClipStore, StoreError, StoreFuture},
};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS clips (
	id             TEXT PRIMARY KEY,
	broadcaster_id TEXT    NOT NULL,
	creator_id     TEXT    NOT NULL,
	video_id       TEXT,
	game_id        TEXT,
	title          TEXT    NOT NULL,
	view_count     INTEGER NOT NULL,
	created_at     TEXT    NOT NULL,
	duration       REAL    NOT NULL,
	vod_offset     INTEGER
)
"#;
const UPSERT: &str = r#"
INSERT INTO clips (id, broadcaster_id, creator_id, video_id, game_id, title, view_count, created_at, duration, vod_offset)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(id) DO UPDATE
	SET video_id   = excluded.video_id,
		game_id    = excluded.game_id,
		view_count = excluded.view_count,
		vod_offset = excluded.vod_offset
"#;
const SELECT_ONE: &str = "SELECT * FROM clips WHERE id = ?";

/// Clip store persisting into a single `clips` table.
#[derive(Clone, Debug)]
pub struct SqliteClipStore {
	pool: SqlitePool,
}
impl SqliteClipStore {
	/// Connects to `url` (e.g. `sqlite://clips.db`), creating the file and schema if missing.
	pub async fn connect(url: &str) -> Result<Self, StoreError> {
		let options = SqliteConnectOptions::from_str(url)?
			.create_if_missing(true)
			.journal_mode(SqliteJournalMode::Wal);

		Self::connect_with(options).await
	}

	/// Opens the database file at `path`, creating it and the schema if missing.
	pub async fn open(path: &Path) -> Result<Self, StoreError> {
		let options = SqliteConnectOptions::new()
			.filename(path)
			.create_if_missing(true)
			.journal_mode(SqliteJournalMode::Wal);

		Self::connect_with(options).await
	}

	async fn connect_with(options: SqliteConnectOptions) -> Result<Self, StoreError> {
		let pool = SqlitePoolOptions::new().connect_with(options).await?;

		sqlx::query(CREATE_TABLE).execute(&pool).await?;

		Ok(Self { pool })
	}

	/// Loads the clip stored under `id`.
	pub async fn get(&self, id: &str) -> Result<Option<ClipRecord>, StoreError> {
		let row = sqlx::query(SELECT_ONE).bind(id).fetch_optional(&self.pool).await?;

		row.as_ref().map(clip_from_row).transpose().map_err(StoreError::from)
	}

	/// Number of stored clips.
	pub async fn count(&self) -> Result<i64, StoreError> {
		let count: i64 =
			sqlx::query_scalar("SELECT COUNT(*) FROM clips").fetch_one(&self.pool).await?;

		Ok(count)
	}

	/// Closes every pooled connection.
	pub async fn close(&self) {
		self.pool.close().await;
	}
}
impl ClipStore for SqliteClipStore {
	fn upsert<'a>(&'a self, clip: &'a ClipRecord) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			sqlx::query(UPSERT)
				.bind(clip.id.as_str())
				.bind(clip.broadcaster_id.as_str())
				.bind(clip.creator_id.as_str())
				.bind(clip.video_id.as_deref())
				.bind(clip.game_id.as_deref())
				.bind(clip.title.as_str())
				.bind(clip.view_count)
				.bind(clip.created_at)
				.bind(clip.duration)
				.bind(clip.vod_offset)
				.execute(&self.pool)
				.await?;

			Ok(())
		})
	}
}

fn clip_from_row(row: &SqliteRow) -> Result<ClipRecord, sqlx::Error> {
	Ok(ClipRecord {
		id: row.try_get("id")?,
		broadcaster_id: row.try_get("broadcaster_id")?,
		creator_id: row.try_get("creator_id")?,
		video_id: row.try_get("video_id")?,
		game_id: row.try_get("game_id")?,
		title: row.try_get("title")?,
		view_count: row.try_get("view_count")?,
		created_at: row.try_get("created_at")?,
		duration: row.try_get("duration")?,
		vod_offset: row.try_get("vod_offset")?,
	})
}
