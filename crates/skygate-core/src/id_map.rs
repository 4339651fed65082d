//! Deterministic, bidirectional mapping between Bluesky identifiers and
//! snowflake IDs.
//!
//! DID mappings are hash-derived and therefore stable across processes and
//! restarts with no coordination. AT-URI mappings are time-derived from the
//! record's TID rkey when it parses, so status IDs sort by creation time
//! the way Mastodon clients expect; otherwise they fall back to the same
//! hash construction. All mappings are cached both ways without expiry.

use sha2::{Digest, Sha256};
use std::sync::Arc;

use skygate_types::cache_adapter::{CacheAdapter, keys};
use skygate_types::prelude::*;
use skygate_types::types::at_uri_rkey;

use crate::snowflake::{self, EPOCH_MS};

/// base32-sortable alphabet used by TIDs
const TID_ALPHABET: &[u8; 32] = b"234567abcdefghijklmnopqrstuvwxyz";
const TID_LENGTH: usize = 13;

/// Decode a 13-character base32-sortable TID into its raw 63-bit value
fn decode_tid(rkey: &str) -> Option<u64> {
	if rkey.len() != TID_LENGTH {
		return None;
	}
	let mut value: u128 = 0;
	for byte in rkey.bytes() {
		let digit = TID_ALPHABET.iter().position(|&c| c == byte)? as u128;
		value = (value << 5) | digit;
	}
	// 13 chars carry 65 bits; real TIDs fit in 64 with the top bit clear
	u64::try_from(value).ok()
}

/// Microseconds since the Unix epoch encoded in a TID rkey, if it parses.
/// The low 10 bits are the TID's clock identifier and are shifted off.
fn tid_timestamp_micros(rkey: &str) -> Option<u64> {
	decode_tid(rkey).map(|v| v >> 10)
}

/// First 8 bytes of SHA-256, big-endian, absolute value. The deterministic
/// fallback construction for identifiers with no usable timestamp.
pub fn hash_snowflake(input: &str) -> i64 {
	let digest = Sha256::digest(input.as_bytes());
	let mut bytes = [0u8; 8];
	bytes.copy_from_slice(&digest[0..8]);
	let raw = i64::from_be_bytes(bytes);
	(raw.unsigned_abs() & (i64::MAX as u64)) as i64
}

/// Worker/sequence bits for time-derived IDs, taken from the URI hash so
/// two posts in the same millisecond stay distinct. Bytes 8..10 → worker,
/// bytes 10..12 → sequence (documented derivation; stable across runtimes).
fn derived_bits(uri: &str) -> (u16, u16) {
	let digest = Sha256::digest(uri.as_bytes());
	let worker = u16::from_be_bytes([digest[8], digest[9]]) & snowflake::MAX_WORKER_ID;
	let sequence = u16::from_be_bytes([digest[10], digest[11]]) & snowflake::MAX_SEQUENCE;
	(worker, sequence)
}

#[derive(Clone, Debug)]
pub struct IdMapper {
	cache: Arc<dyn CacheAdapter>,
}

impl IdMapper {
	pub fn new(cache: Arc<dyn CacheAdapter>) -> Self {
		IdMapper { cache }
	}

	async fn get_i64(&self, key: &str) -> SgResult<Option<i64>> {
		match self.cache.get(key).await? {
			Some(bytes) => {
				let text = String::from_utf8(bytes).map_err(|_| Error::Parse)?;
				Ok(Some(text.parse()?))
			}
			None => Ok(None),
		}
	}

	async fn get_string(&self, key: &str) -> SgResult<Option<String>> {
		match self.cache.get(key).await? {
			Some(bytes) => Ok(Some(String::from_utf8(bytes).map_err(|_| Error::Parse)?)),
			None => Ok(None),
		}
	}

	/// The snowflake for a DID, computing and priming both directions on
	/// first sight. Stable for a given DID forever.
	pub async fn snowflake_for_did(&self, did: &str) -> SgResult<i64> {
		if let Some(sf) = self.get_i64(&keys::did_to_snowflake(did)).await? {
			return Ok(sf);
		}

		let sf = hash_snowflake(did);
		self.cache.set(&keys::did_to_snowflake(did), sf.to_string().as_bytes(), None).await?;
		self.cache.set(&keys::snowflake_to_did(sf), did.as_bytes(), None).await?;
		Ok(sf)
	}

	/// Reverse lookup; `None` until the forward mapping has been primed
	pub async fn did_for_snowflake(&self, sf: i64) -> SgResult<Option<String>> {
		self.get_string(&keys::snowflake_to_did(sf)).await
	}

	/// The snowflake for an AT URI: time-derived from the TID rkey when
	/// possible, hash-derived otherwise. Primes both directions.
	pub async fn snowflake_for_at_uri(&self, uri: &str) -> SgResult<i64> {
		if let Some(sf) = self.get_i64(&keys::at_uri_to_snowflake(uri)).await? {
			return Ok(sf);
		}

		let sf = Self::derive_at_uri_snowflake(uri);
		self.cache.set(&keys::at_uri_to_snowflake(uri), sf.to_string().as_bytes(), None).await?;
		self.cache.set(&keys::snowflake_to_at_uri(sf), uri.as_bytes(), None).await?;
		Ok(sf)
	}

	fn derive_at_uri_snowflake(uri: &str) -> i64 {
		if let Some(micros) = at_uri_rkey(uri).and_then(tid_timestamp_micros) {
			let ts_ms = (micros / 1000) as i64;
			if ts_ms > EPOCH_MS {
				let (worker, sequence) = derived_bits(uri);
				return snowflake::compose(ts_ms, worker, sequence);
			}
		}
		hash_snowflake(uri)
	}

	/// Reverse lookup; `None` until the forward mapping has been primed
	pub async fn at_uri_for_snowflake(&self, sf: i64) -> SgResult<Option<String>> {
		self.get_string(&keys::snowflake_to_at_uri(sf)).await
	}

	/// The snowflake for a handle, via the cached handle→DID relation.
	/// Returns 0 when the handle has not been resolved yet; the caller must
	/// resolve it upstream (which primes the relation) and retry.
	pub async fn snowflake_for_handle(&self, handle: &str) -> SgResult<i64> {
		match self.get_string(&keys::handle_to_did(handle)).await? {
			Some(did) => self.snowflake_for_did(&did).await,
			None => Ok(0),
		}
	}

	/// Record a handle→DID resolution observed in an upstream response
	pub async fn prime_handle(&self, handle: &str, did: &str) -> SgResult<()> {
		self.cache.set(&keys::handle_to_did(handle), did.as_bytes(), None).await
	}
}


// vim: ts=4
