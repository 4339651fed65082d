//! App state type

use std::sync::Arc;

use skygate_types::cache_adapter::CacheAdapter;
use skygate_types::pds_adapter::PdsAdapter;

use crate::id_map::IdMapper;
use crate::metrics::Metrics;
use crate::prelude::*;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::snowflake::SnowflakeGenerator;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct AppState {
	pub opts: AppBuilderOpts,
	pub snowflake: SnowflakeGenerator,
	pub ids: IdMapper,
	pub rate_limiter: RateLimiter,
	pub metrics: Metrics,

	pub cache: Arc<dyn CacheAdapter>,
	pub pds: Arc<dyn PdsAdapter>,
}

pub type App = Arc<AppState>;

#[derive(Clone, Debug)]
pub struct AppBuilderOpts {
	/// Listen address, `host:port`
	pub listen: Box<str>,
	/// Public domain this gateway is reachable at (instance metadata, URLs)
	pub domain: Box<str>,
	/// Upstream PDS base URL
	pub pds_url: Box<str>,
	/// Snowflake worker id (0..1023)
	pub worker_id: u16,
	pub rate_limit: RateLimitConfig,
	pub enable_metrics: bool,
	pub enable_tracing: bool,
}

impl Default for AppBuilderOpts {
	fn default() -> Self {
		AppBuilderOpts {
			listen: "0.0.0.0:8080".into(),
			domain: "skygate.local".into(),
			pds_url: "https://bsky.social".into(),
			worker_id: 0,
			rate_limit: RateLimitConfig::default(),
			enable_metrics: true,
			enable_tracing: true,
		}
	}
}

impl AppState {
	pub fn new(
		opts: AppBuilderOpts,
		cache: Arc<dyn CacheAdapter>,
		pds: Arc<dyn PdsAdapter>,
	) -> SgResult<App> {
		let snowflake = SnowflakeGenerator::new(opts.worker_id);
		let ids = IdMapper::new(cache.clone());
		let rate_limiter = RateLimiter::new(cache.clone(), opts.rate_limit);
		let metrics = Metrics::new()?;

		Ok(Arc::new(AppState { opts, snowflake, ids, rate_limiter, metrics, cache, pds }))
	}
}

// vim: ts=4
