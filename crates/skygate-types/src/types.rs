//! Common types used throughout the gateway.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::time::SystemTime;

// Timestamp //
//***********//
/// Second-precision Unix timestamp used for stored records (OAuth tokens,
/// authorization codes). Mastodon entities format dates with chrono directly.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Timestamp {
		let res = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
		Timestamp(res.as_secs() as i64)
	}

	pub fn from_now(delta: i64) -> Timestamp {
		Timestamp(Self::now().0 + delta)
	}

	pub fn add_seconds(&self, seconds: i64) -> Timestamp {
		Timestamp(self.0 + seconds)
	}

	/// ISO-8601 UTC rendering (`2024-01-01T00:00:00.000Z`)
	pub fn to_iso(&self) -> String {
		match Utc.timestamp_opt(self.0, 0) {
			chrono::LocalResult::Single(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
			_ => Utc
				.timestamp_opt(0, 0)
				.single()
				.unwrap_or_default()
				.to_rfc3339_opts(SecondsFormat::Millis, true),
		}
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::cmp::PartialEq for Timestamp {
	fn eq(&self, other: &Self) -> bool {
		self.0 == other.0
	}
}

impl std::cmp::Eq for Timestamp {}

impl std::cmp::PartialOrd for Timestamp {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl std::cmp::Ord for Timestamp {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.0.cmp(&other.0)
	}
}

/// Serialize a `Timestamp` field as an ISO-8601 string
pub fn serialize_timestamp_iso<S: Serializer>(
	ts: &Timestamp,
	serializer: S,
) -> Result<S::Ok, S::Error> {
	serializer.serialize_str(&ts.to_iso())
}

/// Parse an upstream ISO-8601 date, falling back to the current time.
///
/// Bluesky `indexedAt`/`createdAt` strings are RFC 3339 but occasionally
/// missing; translators use the fallback rather than failing a whole page.
pub fn parse_iso_or_now(value: Option<&str>) -> DateTime<Utc> {
	value
		.and_then(|v| DateTime::parse_from_rfc3339(v).ok())
		.map(|dt| dt.with_timezone(&Utc))
		.unwrap_or_else(Utc::now)
}

// AT URI helpers //
//****************//

/// Split an AT URI (`at://<did>/<collection>/<rkey>`) into its components
pub fn parse_at_uri(uri: &str) -> Option<(&str, &str, &str)> {
	let rest = uri.strip_prefix("at://")?;
	let mut parts = rest.splitn(3, '/');
	let did = parts.next()?;
	let collection = parts.next()?;
	let rkey = parts.next()?;
	if did.is_empty() || collection.is_empty() || rkey.is_empty() {
		return None;
	}
	Some((did, collection, rkey))
}

/// The rkey (final path segment) of an AT URI
pub fn at_uri_rkey(uri: &str) -> Option<&str> {
	parse_at_uri(uri).map(|(_, _, rkey)| rkey)
}

/// The DID authority of an AT URI
pub fn at_uri_did(uri: &str) -> Option<&str> {
	parse_at_uri(uri).map(|(did, _, _)| did)
}


// vim: ts=4
