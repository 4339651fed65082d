//! Process-local [`CacheAdapter`] implementation.
//!
//! An ordered map under a `parking_lot::RwLock` with lazy expiry: entries
//! carry an optional deadline and are dropped on access once past it. This
//! is the adapter used in tests and single-node deployments; multi-instance
//! deployments substitute a networked cache behind the same trait.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use skygate_types::cache_adapter::CacheAdapter;
use skygate_types::prelude::*;

#[derive(Clone, Debug)]
struct Entry {
	value: Vec<u8>,
	expires_at: Option<Instant>,
}

impl Entry {
	fn is_expired(&self, now: Instant) -> bool {
		self.expires_at.is_some_and(|deadline| deadline <= now)
	}
}

#[derive(Debug, Default)]
pub struct CacheAdapterMemory {
	entries: RwLock<BTreeMap<String, Entry>>,
}

impl CacheAdapterMemory {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of live (non-expired) entries
	pub fn len(&self) -> usize {
		let now = Instant::now();
		self.entries.read().values().filter(|e| !e.is_expired(now)).count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Drop every expired entry. Called opportunistically by callers that
	/// hold the adapter long-term; correctness never depends on it.
	pub fn purge_expired(&self) {
		let now = Instant::now();
		self.entries.write().retain(|_, entry| !entry.is_expired(now));
	}
}

#[async_trait]
impl CacheAdapter for CacheAdapterMemory {
	async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> SgResult<()> {
		let entry = Entry { value: value.to_vec(), expires_at: ttl.map(|t| Instant::now() + t) };
		self.entries.write().insert(key.to_string(), entry);
		Ok(())
	}

	async fn get(&self, key: &str) -> SgResult<Option<Vec<u8>>> {
		let now = Instant::now();
		// Fast path under the read lock
		{
			let entries = self.entries.read();
			match entries.get(key) {
				None => return Ok(None),
				Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
				Some(_) => {}
			}
		}
		// Expired: upgrade to a write lock to drop it
		let mut entries = self.entries.write();
		if entries.get(key).is_some_and(|e| e.is_expired(now)) {
			entries.remove(key);
		}
		Ok(None)
	}

	async fn delete(&self, key: &str) -> SgResult<()> {
		self.entries.write().remove(key);
		Ok(())
	}

	async fn take(&self, key: &str) -> SgResult<Option<Vec<u8>>> {
		let now = Instant::now();
		let mut entries = self.entries.write();
		match entries.remove(key) {
			Some(entry) if !entry.is_expired(now) => Ok(Some(entry.value)),
			_ => Ok(None),
		}
	}

	async fn set_if_absent(
		&self,
		key: &str,
		value: &[u8],
		ttl: Option<Duration>,
	) -> SgResult<bool> {
		let now = Instant::now();
		let mut entries = self.entries.write();
		if entries.get(key).is_some_and(|e| !e.is_expired(now)) {
			return Ok(false);
		}
		let entry = Entry { value: value.to_vec(), expires_at: ttl.map(|t| now + t) };
		entries.insert(key.to_string(), entry);
		Ok(true)
	}
}

// vim: ts=4
