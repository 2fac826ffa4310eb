//! TOML configuration surface and ISO-8601 period parsing.
//!
//! ```toml
//! [fetch]
//! period = "P1W"
//! broadcasterIds = [3593082, "790564"]
//!
//! [twitch]
//! baseUrl = "https://api.twitch.tv/helix/"
//! authorizationUrl = "https://id.twitch.tv/oauth2/token"
//! clientId = "..."
//! secret = "..."
//! tokenSkew = "PT3S"
//!
//! [store]
//! url = "sqlite://clips.db"
//! ```
//!
//! `TWITCH_CLIENT_ID` and `TWITCH_SECRET` override the file values when set.

// std
use std::path::Path;
// crates.io
use serde::{Deserializer, de::Error as _};
// self
use crate::{
	_prelude::*,
	auth::{ClientCredential, TokenSecret},
	error::ConfigError,
};

const DEFAULT_BASE_URL: &str = "https://api.twitch.tv/helix/";
const DEFAULT_AUTHORIZATION_URL: &str = "https://id.twitch.tv/oauth2/token";
const DEFAULT_STORE_URL: &str = "sqlite://clips.db";
const MAX_TOKEN_SKEW: Duration = Duration::days(1);

/// Fixed-length lookback period.
///
/// Accepts ISO-8601 durations built from weeks, days, hours, minutes, and seconds
/// (`P1W`, `P3D`, `PT12H`, `P1DT6H30M`) plus the short `<n><unit>` form (`1w`, `3d`, `90s`).
/// Years and months are rejected because their length depends on the calendar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(Duration);
impl Period {
	/// Seven days.
	pub const ONE_WEEK: Self = Self(Duration::weeks(1));

	/// Underlying duration.
	pub fn duration(self) -> Duration {
		self.0
	}

	fn parse(raw: &str) -> Result<Duration, &'static str> {
		let upper = raw.trim().to_ascii_uppercase();
		let total = match upper.strip_prefix('P') {
			Some(body) => parse_iso(body)?,
			None => parse_short(&upper)?,
		};

		if total.is_positive() { Ok(total) } else { Err("period must be positive") }
	}
}
impl Default for Period {
	fn default() -> Self {
		Self::ONE_WEEK
	}
}
impl FromStr for Period {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
			.map(Self)
			.map_err(|reason| ConfigError::InvalidPeriod { value: s.to_owned(), reason })
	}
}
impl Display for Period {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let secs = self.0.whole_seconds();
		let (days, rest) = (secs / 86_400, secs % 86_400);
		let (hours, rest) = (rest / 3_600, rest % 3_600);
		let (minutes, seconds) = (rest / 60, rest % 60);

		f.write_str("P")?;

		if days > 0 {
			write!(f, "{days}D")?;
		}
		if hours + minutes + seconds > 0 {
			f.write_str("T")?;

			for (value, unit) in [(hours, 'H'), (minutes, 'M'), (seconds, 'S')] {
				if value > 0 {
					write!(f, "{value}{unit}")?;
				}
			}
		}

		Ok(())
	}
}
impl<'de> Deserialize<'de> for Period {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		raw.parse().map_err(D::Error::custom)
	}
}

fn parse_iso(body: &str) -> Result<Duration, &'static str> {
	let (date, time) = match body.split_once('T') {
		Some((date, time)) => (date, Some(time)),
		None => (body, None),
	};

	if date.is_empty() && time.is_none_or(str::is_empty) {
		return Err("no components");
	}
	if time == Some("") {
		return Err("time designator without components");
	}

	let mut total = Duration::ZERO;

	for (amount, unit) in components(date)? {
		let unit_len = match unit {
			'W' => Duration::WEEK,
			'D' => Duration::DAY,
			'Y' | 'M' => return Err("years and months have no fixed length"),
			_ => return Err("unknown date unit"),
		};

		total = accumulate(total, amount, unit_len)?;
	}
	for (amount, unit) in components(time.unwrap_or_default())? {
		let unit_len = match unit {
			'H' => Duration::HOUR,
			'M' => Duration::MINUTE,
			'S' => Duration::SECOND,
			_ => return Err("unknown time unit"),
		};

		total = accumulate(total, amount, unit_len)?;
	}

	Ok(total)
}

fn parse_short(raw: &str) -> Result<Duration, &'static str> {
	let mut parts = components(raw)?.into_iter();
	let (Some((amount, unit)), None) = (parts.next(), parts.next()) else {
		return Err("expected an ISO-8601 period or a single <n><unit> value");
	};
	let unit_len = match unit {
		'W' => Duration::WEEK,
		'D' => Duration::DAY,
		'H' => Duration::HOUR,
		'M' => Duration::MINUTE,
		'S' => Duration::SECOND,
		_ => return Err("unknown unit"),
	};

	accumulate(Duration::ZERO, amount, unit_len)
}

fn components(raw: &str) -> Result<Vec<(i64, char)>, &'static str> {
	let mut out = Vec::new();
	let mut digits = String::new();

	for c in raw.chars() {
		if c.is_ascii_digit() {
			digits.push(c);

			continue;
		}
		if digits.is_empty() {
			return Err("unit without amount");
		}

		let amount = digits.parse().map_err(|_| "amount out of range")?;

		out.push((amount, c));
		digits.clear();
	}

	if digits.is_empty() { Ok(out) } else { Err("amount without unit") }
}

fn accumulate(total: Duration, amount: i64, unit: Duration) -> Result<Duration, &'static str> {
	unit.checked_mul(i32::try_from(amount).map_err(|_| "amount out of range")?)
		.and_then(|part| total.checked_add(part))
		.ok_or("amount out of range")
}

/// Root configuration document.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	/// Fetch window and broadcaster selection.
	pub fetch: FetchConfig,
	/// Identity and data endpoint settings.
	pub twitch: TwitchConfig,
	/// Clip store settings.
	#[serde(default)]
	pub store: StoreConfig,
}
impl Config {
	/// Reads, parses, overrides from the environment, and validates `path`.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let raw = std::fs::read_to_string(path)
			.map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
		let mut config = Self::from_toml(&raw)?;

		config.apply_overrides(|key| std::env::var(key).ok());
		config.validate()?;

		Ok(config)
	}

	/// Parses a TOML document without consulting the environment.
	pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(raw)?)
	}

	/// Applies `TWITCH_CLIENT_ID` / `TWITCH_SECRET` overrides resolved through `lookup`.
	pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
		if let Some(client_id) = lookup("TWITCH_CLIENT_ID").filter(|v| !v.is_empty()) {
			self.twitch.client_id = client_id;
		}
		if let Some(secret) = lookup("TWITCH_SECRET").filter(|v| !v.is_empty()) {
			self.twitch.secret = TokenSecret::new(secret);
		}
	}

	/// Checks required keys, bounds the token skew, and de-duplicates broadcaster ids,
	/// keeping first occurrences.
	pub fn validate(&mut self) -> Result<(), ConfigError> {
		if self.twitch.client_id.trim().is_empty() {
			return Err(ConfigError::Missing { key: "twitch.clientId" });
		}
		if self.twitch.secret.expose().is_empty() {
			return Err(ConfigError::Missing { key: "twitch.secret" });
		}
		if self.twitch.token_skew.duration() > MAX_TOKEN_SKEW {
			return Err(ConfigError::InvalidPeriod {
				value: self.twitch.token_skew.to_string(),
				reason: "token skew must not exceed one day",
			});
		}

		let mut seen = std::collections::HashSet::new();

		self.fetch.broadcaster_ids.retain(|id| seen.insert(id.clone()));

		Ok(())
	}

	/// Credential pair used by the token manager and request authorizer.
	pub fn credential(&self) -> ClientCredential {
		ClientCredential::new(self.twitch.client_id.clone(), self.twitch.secret.clone())
	}
}

/// `[fetch]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchConfig {
	/// Lookback period; defaults to one week.
	#[serde(default)]
	pub period: Period,
	/// Broadcasters to harvest; numbers and strings are both accepted.
	#[serde(default, alias = "broadcastersIds", deserialize_with = "broadcaster_ids")]
	pub broadcaster_ids: Vec<String>,
}

/// `[twitch]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwitchConfig {
	/// Data API root; `/clips` is appended. Defaults to the public Helix root.
	#[serde(default)]
	pub base_url: Option<Url>,
	/// Client-credentials token endpoint. Defaults to the public identity endpoint.
	#[serde(default)]
	pub authorization_url: Option<Url>,
	/// Application client identifier.
	#[serde(default)]
	pub client_id: String,
	/// Application client secret.
	#[serde(default = "empty_secret")]
	pub secret: TokenSecret,
	/// Safety margin before token expiry; defaults to three seconds.
	#[serde(default = "default_token_skew")]
	pub token_skew: Period,
}

impl TwitchConfig {
	/// Configured or default data API root.
	pub fn base_url(&self) -> Result<Url, ConfigError> {
		resolve_url(self.base_url.as_ref(), DEFAULT_BASE_URL)
	}

	/// Configured or default token endpoint.
	pub fn authorization_url(&self) -> Result<Url, ConfigError> {
		resolve_url(self.authorization_url.as_ref(), DEFAULT_AUTHORIZATION_URL)
	}
}

/// `[store]` table.
#[derive(Clone, Debug, Deserialize)]
pub struct StoreConfig {
	/// SQLite connection URL.
	#[serde(default = "default_store_url")]
	pub url: String,
}
impl Default for StoreConfig {
	fn default() -> Self {
		Self { url: default_store_url() }
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
	Number(u64),
	Text(String),
}

fn broadcaster_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Vec::<RawId>::deserialize(deserializer)?
		.into_iter()
		.map(|raw| match raw {
			RawId::Number(n) => Ok(n.to_string()),
			RawId::Text(s) if s.trim().is_empty() => Err(D::Error::custom("empty broadcaster id")),
			RawId::Text(s) => Ok(s.trim().to_owned()),
		})
		.collect()
}

fn resolve_url(configured: Option<&Url>, fallback: &str) -> Result<Url, ConfigError> {
	match configured {
		Some(url) => Ok(url.clone()),
		None => Url::parse(fallback)
			.map_err(|source| ConfigError::InvalidUrl { value: fallback.into(), source }),
	}
}

fn default_store_url() -> String {
	DEFAULT_STORE_URL.into()
}

fn default_token_skew() -> Period {
	Period(Duration::seconds(3))
}

fn empty_secret() -> TokenSecret {
	TokenSecret::new("")
}
