//! Mastodon-style pagination bridged onto upstream cursors.
//!
//! Mastodon clients page with `max_id`/`since_id`/`min_id`; Bluesky pages
//! with opaque cursors. After serving a page the gateway remembers the
//! upstream cursor keyed by the last item's snowflake, so a follow-up
//! request carrying that snowflake as `max_id` resumes the upstream walk.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use skygate_types::cache_adapter::{CacheAdapter, keys};
use skygate_types::prelude::*;

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 40;

/// How long a bridged cursor stays resumable
const CURSOR_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PageQuery {
	pub max_id: Option<String>,
	pub since_id: Option<String>,
	pub min_id: Option<String>,
	pub limit: Option<u32>,
}

impl PageQuery {
	/// Effective page size: default 20, capped at 40
	pub fn limit(&self) -> u32 {
		self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
	}
}

#[derive(Clone, Debug)]
pub struct Paginator {
	cache: Arc<dyn CacheAdapter>,
}

impl Paginator {
	pub fn new(cache: Arc<dyn CacheAdapter>) -> Self {
		Paginator { cache }
	}

	/// The upstream cursor to resume from for this request, if the client
	/// is paging and we remember where that page ended
	pub async fn cursor_for(
		&self,
		route: &str,
		viewer: &str,
		query: &PageQuery,
	) -> SgResult<Option<String>> {
		let Some(max_id) = query.max_id.as_deref() else { return Ok(None) };
		let Ok(sf) = max_id.parse::<i64>() else { return Ok(None) };
		match self.cache.get(&keys::cursor(route, viewer, sf)).await? {
			Some(bytes) => Ok(Some(String::from_utf8(bytes).map_err(|_| Error::Parse)?)),
			None => Ok(None),
		}
	}

	/// Remember the upstream continuation for the page that just ended at
	/// `last_sf`, so `max_id={last_sf}` can resume it
	pub async fn remember(
		&self,
		route: &str,
		viewer: &str,
		last_sf: i64,
		cursor: Option<&str>,
	) -> SgResult<()> {
		if let Some(cursor) = cursor {
			self.cache
				.set(&keys::cursor(route, viewer, last_sf), cursor.as_bytes(), Some(CURSOR_TTL))
				.await?;
		}
		Ok(())
	}
}

/// RFC 5988 `Link` header with `next`/`prev` relations.
///
/// `ids` are the snowflake ids of the served page in display order;
/// `has_more` reflects whether upstream returned a continuation cursor.
pub fn link_header(base_url: &str, limit: u32, ids: &[i64], has_more: bool) -> Option<String> {
	if ids.is_empty() {
		return None;
	}
	let first = ids.first()?;
	let last = ids.last()?;

	let mut parts = Vec::new();
	if has_more {
		parts.push(format!("<{}?limit={}&max_id={}>; rel=\"next\"", base_url, limit, last));
	}
	parts.push(format!("<{}?limit={}&min_id={}>; rel=\"prev\"", base_url, limit, first));
	Some(parts.join(", "))
}

#[cfg(test)]
mod tests {
	use super::*;
	use skygate_cache_adapter_memory::CacheAdapterMemory;

	#[test]
	fn test_limit_defaults_and_caps() {
		assert_eq!(PageQuery::default().limit(), 20);
		assert_eq!(PageQuery { limit: Some(5), ..Default::default() }.limit(), 5);
		assert_eq!(PageQuery { limit: Some(400), ..Default::default() }.limit(), 40);
		assert_eq!(PageQuery { limit: Some(0), ..Default::default() }.limit(), 1);
	}

	#[test]
	fn test_link_header() {
		let header =
			link_header("https://gw.example/api/v1/timelines/home", 20, &[900, 800, 700], true)
				.unwrap();
		assert!(header.contains("max_id=700>; rel=\"next\""));
		assert!(header.contains("min_id=900>; rel=\"prev\""));

		// No continuation → no next link
		let header =
			link_header("https://gw.example/api/v1/timelines/home", 20, &[900], false).unwrap();
		assert!(!header.contains("next"));
		assert!(header.contains("prev"));

		assert!(link_header("https://x", 20, &[], true).is_none());
	}

	#[tokio::test]
	async fn test_cursor_bridge_roundtrip() {
		let paginator = Paginator::new(Arc::new(CacheAdapterMemory::new()));

		paginator.remember("home", "did:plc:me", 700, Some("cur123")).await.unwrap();

		let query = PageQuery { max_id: Some("700".into()), ..Default::default() };
		let cursor = paginator.cursor_for("home", "did:plc:me", &query).await.unwrap();
		assert_eq!(cursor.as_deref(), Some("cur123"));

		// Unknown max_id or fresh request → start from the top
		let unknown = PageQuery { max_id: Some("999".into()), ..Default::default() };
		assert_eq!(paginator.cursor_for("home", "did:plc:me", &unknown).await.unwrap(), None);
		assert_eq!(
			paginator.cursor_for("home", "did:plc:me", &PageQuery::default()).await.unwrap(),
			None
		);

		// Cursors are per-route and per-viewer
		assert_eq!(paginator.cursor_for("notifications", "did:plc:me", &query).await.unwrap(), None);
		assert_eq!(paginator.cursor_for("home", "did:plc:other", &query).await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_remember_without_cursor_is_noop() {
		let paginator = Paginator::new(Arc::new(CacheAdapterMemory::new()));
		paginator.remember("home", "v", 1, None).await.unwrap();
		let query = PageQuery { max_id: Some("1".into()), ..Default::default() };
		assert_eq!(paginator.cursor_for("home", "v", &query).await.unwrap(), None);
	}
}

// vim: ts=4
