//! skygate server binary: environment configuration and adapter wiring.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use skygate::SkygateOpts;
use skygate_cache_adapter_memory::CacheAdapterMemory;
use skygate_core::app::AppBuilderOpts;
use skygate_core::rate_limit::RateLimitConfig;
use skygate_pds_adapter_http::PdsAdapterHttp;

fn env_or(name: &str, default: &str) -> String {
	env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
	env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
	match env::var(name) {
		Ok(value) => !matches!(value.as_str(), "0" | "false" | "off" | "no"),
		Err(_) => default,
	}
}

fn config_from_env() -> AppBuilderOpts {
	let listen = format!(
		"{}:{}",
		env_or("SKYGATE_HOST", "0.0.0.0"),
		env_or("SKYGATE_PORT", "8080")
	);
	AppBuilderOpts {
		listen: listen.into(),
		domain: env_or("SKYGATE_DOMAIN", "skygate.local").into(),
		pds_url: env_or("SKYGATE_PDS_URL", "https://bsky.social").into(),
		worker_id: env_parse("SKYGATE_WORKER_ID", 0),
		rate_limit: RateLimitConfig {
			anon_capacity: env_parse("SKYGATE_RATE_LIMIT_ANON", 300),
			auth_capacity: env_parse("SKYGATE_RATE_LIMIT_AUTH", 1000),
			window: Duration::from_secs(env_parse("SKYGATE_RATE_LIMIT_WINDOW_SECS", 300)),
		},
		enable_metrics: env_flag("SKYGATE_METRICS", true),
		enable_tracing: env_flag("SKYGATE_TRACING", true),
	}
}

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_env("SKYGATE_LOG")
				.or_else(|_| EnvFilter::try_from_default_env())
				.unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let opts = config_from_env();
	tracing::info!(
		listen = %opts.listen,
		pds = %opts.pds_url,
		"starting skygate"
	);

	let pds = match PdsAdapterHttp::new(&opts.pds_url) {
		Ok(pds) => Arc::new(pds),
		Err(err) => {
			tracing::error!("failed to build PDS client: {}", err);
			std::process::exit(1);
		}
	};

	let result = skygate::run(SkygateOpts {
		opts,
		cache: Arc::new(CacheAdapterMemory::new()),
		pds,
	})
	.await;

	if let Err(err) = result {
		tracing::error!("server exited with error: {}", err);
		std::process::exit(1);
	}
}

// vim: ts=4
