//! skygate: a Mastodon-compatible API gateway backed by the AT Protocol.
//!
//! Mastodon clients speak OAuth 2.0 and `/api/v1/*` against this server;
//! every call is translated into XRPC requests against a Bluesky PDS and
//! the responses are reshaped into Mastodon entities. See the adapter
//! traits in `skygate-types` for the two external seams (cache, PDS).

pub mod accounts;
pub mod instance;
pub mod lists;
pub mod media;
pub mod notifications;
pub mod prelude;
pub mod routes;
pub mod search;
pub mod statuses;
pub mod timelines;
pub mod util;

use std::net::SocketAddr;
use std::sync::Arc;

use skygate_core::app::{AppBuilderOpts, AppState};
use skygate_types::cache_adapter::CacheAdapter;
use skygate_types::pds_adapter::PdsAdapter;

use crate::prelude::*;

pub struct SkygateOpts {
	pub opts: AppBuilderOpts,
	pub cache: Arc<dyn CacheAdapter>,
	pub pds: Arc<dyn PdsAdapter>,
}

/// Build the application state and serve until the listener fails
pub async fn run(opts: SkygateOpts) -> SgResult<()> {
	let app = AppState::new(opts.opts, opts.cache, opts.pds)?;
	let router = routes::init_routes(app.clone());

	let listener = tokio::net::TcpListener::bind(&*app.opts.listen).await?;
	info!("skygate listening on {}", app.opts.listen);

	axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
		.await
		.map_err(Error::from)
}

// vim: ts=4
