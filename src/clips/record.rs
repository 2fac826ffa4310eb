//! Clip entity as returned by the data endpoint and persisted by clip stores.

// crates.io
use serde::Deserializer;
// self
use crate::_prelude::*;

/// One clip. `id` is globally unique and immutable; the record is never mutated after it
/// has been received.
///
/// Wire field names are the snake_case forms of the struct fields. Unknown fields such as
/// `url` or `thumbnail_url` are ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipRecord {
	/// Primary key.
	pub id: String,
	/// Channel the clip was taken from.
	pub broadcaster_id: String,
	/// User who created the clip.
	pub creator_id: String,
	/// Source VOD, absent once the VOD is deleted.
	#[serde(default, deserialize_with = "empty_as_none")]
	pub video_id: Option<String>,
	/// Game or category at clip time.
	#[serde(default, deserialize_with = "empty_as_none")]
	pub game_id: Option<String>,
	/// Clip title.
	pub title: String,
	/// View counter at fetch time.
	pub view_count: i64,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	/// Length in seconds.
	pub duration: f64,
	/// Offset into the source VOD, in seconds.
	#[serde(default)]
	pub vod_offset: Option<i64>,
}

// The API reports missing ids as `""` rather than null.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<String>::deserialize(deserializer)?;

	Ok(value.filter(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn deserializes_api_payload_and_ignores_extra_fields() {
		let payload = r#"{
			"id": "AwkwardHelplessSalamanderSwiftRage",
			"url": "https://clips.twitch.tv/AwkwardHelplessSalamanderSwiftRage",
			"broadcaster_id": "67955580",
			"broadcaster_name": "ChewieMelodies",
			"creator_id": "53834192",
			"video_id": "205586603",
			"game_id": "488191",
			"language": "en",
			"title": "babymetal",
			"view_count": 10,
			"created_at": "2017-11-30T22:34:18Z",
			"duration": 60,
			"vod_offset": 480
		}"#;
		let clip: ClipRecord =
			serde_json::from_str(payload).expect("Clip payload fixture should deserialize.");

		assert_eq!(clip.id, "AwkwardHelplessSalamanderSwiftRage");
		assert_eq!(clip.video_id.as_deref(), Some("205586603"));
		assert_eq!(clip.created_at, macros::datetime!(2017-11-30 22:34:18 UTC));
		assert_eq!(clip.duration, 60.);
		assert_eq!(clip.vod_offset, Some(480));
	}

	#[test]
	fn empty_and_null_optionals_become_none() {
		let payload = r#"{
			"id": "5RUd3mpcosQvuTTRM",
			"broadcaster_id": "392",
			"creator_id": "239",
			"video_id": "",
			"game_id": null,
			"title": "Your brochure scenarios",
			"view_count": 218,
			"created_at": "2005-04-20T00:04:12Z",
			"duration": 871343.1182,
			"vod_offset": null
		}"#;
		let clip: ClipRecord =
			serde_json::from_str(payload).expect("Nullable clip payload should deserialize.");

		assert_eq!(clip.video_id, None);
		assert_eq!(clip.game_id, None);
		assert_eq!(clip.vod_offset, None);
	}
}
