//! Adapter that stores all gateway state: sessions, tokens, ID mappings,
//! and rate-limit buckets.
//!
//! The gateway itself is stateless; every durable or shared value lives
//! behind this trait. A process-local implementation is sufficient for a
//! single node and for tests; a networked implementation lets several
//! gateway instances share sessions and rate limits.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::time::Duration;

use crate::prelude::*;

/// A skygate cache adapter.
///
/// Values are opaque byte strings with an optional time-to-live. Keys are
/// namespaced with the constructors in [`keys`]; nothing else may touch a
/// cache key directly.
#[async_trait]
pub trait CacheAdapter: Debug + Send + Sync {
	/// Store a value, replacing any existing entry. `ttl = None` never expires.
	async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> SgResult<()>;

	/// Read a value; `None` if absent or expired
	async fn get(&self, key: &str) -> SgResult<Option<Vec<u8>>>;

	/// Delete a value; deleting an absent key is not an error
	async fn delete(&self, key: &str) -> SgResult<()>;

	/// Atomically read and delete a value.
	///
	/// Single-use secrets (authorization codes) rely on this: two concurrent
	/// exchanges of the same code must observe at most one `Some`.
	async fn take(&self, key: &str) -> SgResult<Option<Vec<u8>>>;

	/// Store a value only if the key is absent; returns whether it was stored
	async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Option<Duration>)
	-> SgResult<bool>;
}

/// Typed JSON access on top of the byte-oriented trait
#[async_trait]
pub trait CacheExt {
	async fn get_json<T: DeserializeOwned>(&self, key: &str) -> SgResult<Option<T>>;
	async fn take_json<T: DeserializeOwned>(&self, key: &str) -> SgResult<Option<T>>;
	async fn set_json<T: Serialize + Sync>(
		&self,
		key: &str,
		value: &T,
		ttl: Option<Duration>,
	) -> SgResult<()>;
}

#[async_trait]
impl<C: CacheAdapter + ?Sized> CacheExt for C {
	async fn get_json<T: DeserializeOwned>(&self, key: &str) -> SgResult<Option<T>> {
		match self.get(key).await? {
			Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
			None => Ok(None),
		}
	}

	async fn take_json<T: DeserializeOwned>(&self, key: &str) -> SgResult<Option<T>> {
		match self.take(key).await? {
			Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
			None => Ok(None),
		}
	}

	async fn set_json<T: Serialize + Sync>(
		&self,
		key: &str,
		value: &T,
		ttl: Option<Duration>,
	) -> SgResult<()> {
		let bytes = serde_json::to_vec(value)?;
		self.set(key, &bytes, ttl).await
	}
}

/// Cache key constructors. Key shapes are part of the deployment contract:
/// instances sharing a cache must agree on them.
pub mod keys {
	pub fn oauth_app(client_id: &str) -> String {
		format!("oauth:app:{}", client_id)
	}

	pub fn oauth_code(code: &str) -> String {
		format!("oauth:code:{}", code)
	}

	pub fn oauth_token(token: &str) -> String {
		format!("oauth:token:{}", token)
	}

	pub fn session(did: &str) -> String {
		format!("session:{}", did)
	}

	pub fn did_to_snowflake(did: &str) -> String {
		format!("did_to_snowflake:{}", did)
	}

	pub fn snowflake_to_did(sf: i64) -> String {
		format!("snowflake_to_did:{}", sf)
	}

	pub fn at_uri_to_snowflake(uri: &str) -> String {
		format!("at_uri_to_snowflake:{}", uri)
	}

	pub fn snowflake_to_at_uri(sf: i64) -> String {
		format!("snowflake_to_at_uri:{}", sf)
	}

	pub fn handle_to_did(handle: &str) -> String {
		format!("handle_to_did:{}", handle)
	}

	pub fn ratelimit(scope: &str, id: &str) -> String {
		format!("ratelimit:{}:{}", scope, id)
	}

	/// Side-channel record-URI mappings for write inverses
	pub fn like_record(did: &str, status_sf: i64) -> String {
		format!("like:{}:{}", did, status_sf)
	}

	pub fn repost_record(did: &str, status_sf: i64) -> String {
		format!("repost:{}:{}", did, status_sf)
	}

	pub fn follow_record(did: &str, target_sf: i64) -> String {
		format!("follow:{}:{}", did, target_sf)
	}

	/// Uploaded media drafts awaiting status creation
	pub fn media(sf: i64) -> String {
		format!("media:{}", sf)
	}

	/// Upstream pagination cursor bridged behind a Mastodon `max_id`
	pub fn cursor(route: &str, viewer: &str, last_sf: i64) -> String {
		format!("cursor:{}:{}:{}", route, viewer, last_sf)
	}
}


// vim: ts=4
