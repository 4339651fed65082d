//! Cache-backed token-bucket rate limiting.
//!
//! Bucket state is persisted through the cache adapter so any gateway
//! instance sharing the cache makes the same decision. The refill is a
//! pure function of wall time: `refill = elapsed * capacity / window`.
//! Without compare-and-set on the cache, two concurrent refills can both
//! admit a request where one should have been denied; that rare over-allow
//! of one unit is an accepted trade-off.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use skygate_types::cache_adapter::{CacheAdapter, CacheExt, keys};
use skygate_types::prelude::*;

/// Bucket scope for unauthenticated requests (keyed by client IP)
pub const SCOPE_IP: &str = "ip";
/// Bucket scope for authenticated requests (keyed by user DID)
pub const SCOPE_USER: &str = "user";

#[derive(Clone, Copy, Debug)]
pub struct RateLimitConfig {
	/// Window capacity for unauthenticated requests
	pub anon_capacity: u32,
	/// Window capacity for authenticated requests
	pub auth_capacity: u32,
	pub window: Duration,
}

impl Default for RateLimitConfig {
	fn default() -> Self {
		RateLimitConfig {
			anon_capacity: 300,
			auth_capacity: 1000,
			window: Duration::from_secs(300),
		}
	}
}

#[derive(Debug, Deserialize, Serialize)]
struct Bucket {
	tokens: f64,
	last_refill_ts: f64,
}

/// Outcome of a bucket check, carrying everything the `X-RateLimit-*`
/// headers need on both the allow and deny paths.
#[derive(Clone, Copy, Debug)]
pub struct RateDecision {
	pub allowed: bool,
	pub limit: u32,
	pub remaining: u32,
	/// Unix seconds at which the bucket is full again
	pub reset_at: i64,
	/// Seconds until at least one token is available (deny path)
	pub retry_after: u32,
}

#[derive(Clone, Debug)]
pub struct RateLimiter {
	cache: Arc<dyn CacheAdapter>,
	config: RateLimitConfig,
}

fn now_secs() -> f64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or_default()
}

impl RateLimiter {
	pub fn new(cache: Arc<dyn CacheAdapter>, config: RateLimitConfig) -> Self {
		RateLimiter { cache, config }
	}

	pub fn config(&self) -> &RateLimitConfig {
		&self.config
	}

	/// Check and consume one token from the bucket for `scope:id`
	pub async fn check(&self, scope: &str, id: &str) -> SgResult<RateDecision> {
		let capacity = match scope {
			SCOPE_USER => f64::from(self.config.auth_capacity),
			_ => f64::from(self.config.anon_capacity),
		};
		self.check_with_capacity(scope, id, capacity).await
	}

	async fn check_with_capacity(
		&self,
		scope: &str,
		id: &str,
		capacity: f64,
	) -> SgResult<RateDecision> {
		let key = keys::ratelimit(scope, id);
		let window = self.config.window.as_secs_f64();
		let rate = capacity / window;
		let now = now_secs();

		let bucket: Bucket = self
			.cache
			.get_json(&key)
			.await?
			.unwrap_or(Bucket { tokens: capacity, last_refill_ts: now });

		let elapsed = (now - bucket.last_refill_ts).max(0.0);
		let mut tokens = (bucket.tokens + elapsed * rate).min(capacity);

		let allowed = tokens >= 1.0;
		if allowed {
			tokens -= 1.0;
		}

		self.cache
			.set_json(&key, &Bucket { tokens, last_refill_ts: now }, Some(self.config.window))
			.await?;

		let reset_in = (capacity - tokens) / rate;
		let retry_after = if allowed { 0 } else { ((1.0 - tokens) / rate).ceil() as u32 };
		Ok(RateDecision {
			allowed,
			limit: capacity as u32,
			remaining: tokens.floor() as u32,
			reset_at: (now + reset_in).ceil() as i64,
			retry_after: retry_after.max(1).min(self.config.window.as_secs() as u32),
		})
	}
}


// vim: ts=4
