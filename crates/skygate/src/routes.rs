//! API routes

use axum::{
	Router,
	extract::DefaultBodyLimit,
	middleware,
	routing::{get, post},
};
use tower_http::cors::CorsLayer;

use skygate_core::middleware as pipeline;
use skygate_oauth::handler as oauth;
use skygate_oauth::middleware::require_auth;

use crate::prelude::*;
use crate::{accounts, instance, lists, media, notifications, search, statuses, timelines};

/// JSON request bodies stay small
const JSON_BODY_LIMIT: usize = 1024 * 1024;
/// Media uploads get headroom
const MEDIA_BODY_LIMIT: usize = instance::IMAGE_SIZE_LIMIT as usize;

// ============================================================================
// PUBLIC ROUTES - OAuth flow, instance metadata, health
// ============================================================================
fn init_public_routes() -> Router<App> {
	Router::new()
		.route("/api/v1/apps", post(oauth::post_apps))
		.route("/oauth/authorize", get(oauth::get_authorize).post(oauth::post_authorize))
		.route("/oauth/token", post(oauth::post_token))
		.route("/oauth/revoke", post(oauth::post_revoke))
		.route("/api/v1/instance", get(instance::get_instance_v1))
		.route("/api/v2/instance", get(instance::get_instance_v2))
		.route("/healthz", get(instance::healthz))
		.route("/metrics", get(instance::metrics))
}

// ============================================================================
// PROTECTED ROUTES - All routes require a valid bearer token
// ============================================================================
fn init_protected_routes(app: App) -> Router<App> {
	let media_router = Router::new()
		.route("/api/v1/media", post(media::post_media))
		.route("/api/v2/media", post(media::post_media))
		.layer(DefaultBodyLimit::max(MEDIA_BODY_LIMIT));

	Router::new()
		// --- Accounts ---
		.route("/api/v1/accounts/verify_credentials", get(accounts::get_verify_credentials))
		.route("/api/v1/accounts/lookup", get(accounts::get_lookup))
		.route("/api/v1/accounts/search", get(accounts::get_account_search))
		.route("/api/v1/accounts/relationships", get(accounts::get_relationships))
		.route("/api/v1/accounts/{id}", get(accounts::get_account))
		.route("/api/v1/accounts/{id}/statuses", get(accounts::get_account_statuses))
		.route("/api/v1/accounts/{id}/followers", get(accounts::get_account_followers))
		.route("/api/v1/accounts/{id}/following", get(accounts::get_account_following))
		.route("/api/v1/accounts/{id}/follow", post(accounts::post_follow))
		.route("/api/v1/accounts/{id}/unfollow", post(accounts::post_unfollow))

		// --- Statuses ---
		.route("/api/v1/statuses", post(statuses::post_statuses))
		.route(
			"/api/v1/statuses/{id}",
			get(statuses::get_status).delete(statuses::delete_status),
		)
		.route("/api/v1/statuses/{id}/context", get(statuses::get_context))
		.route("/api/v1/statuses/{id}/favourite", post(statuses::post_favourite))
		.route("/api/v1/statuses/{id}/unfavourite", post(statuses::post_unfavourite))
		.route("/api/v1/statuses/{id}/reblog", post(statuses::post_reblog))
		.route("/api/v1/statuses/{id}/unreblog", post(statuses::post_unreblog))
		.route("/api/v1/statuses/{id}/favourited_by", get(statuses::get_favourited_by))
		.route("/api/v1/statuses/{id}/reblogged_by", get(statuses::get_reblogged_by))

		// --- Timelines ---
		.route("/api/v1/timelines/home", get(timelines::get_home))
		.route("/api/v1/timelines/public", get(timelines::get_public))
		.route("/api/v1/timelines/tag/{hashtag}", get(timelines::get_tag))
		.route("/api/v1/timelines/list/{id}", get(timelines::get_list_timeline))

		// --- Notifications ---
		.route("/api/v1/notifications", get(notifications::get_notifications))
		.route("/api/v1/notifications/clear", post(notifications::post_clear))
		.route("/api/v1/notifications/{id}", get(notifications::get_notification))

		// --- Media ---
		.merge(media_router)
		.route("/api/v1/media/{id}", get(media::get_media).put(media::put_media))

		// --- Search ---
		.route("/api/v2/search", get(search::get_search))

		// --- Lists ---
		.route("/api/v1/lists", get(lists::get_lists))
		.route("/api/v1/lists/{id}", get(lists::get_list))
		.route("/api/v1/lists/{id}/accounts", get(lists::get_list_accounts))

		.layer(middleware::from_fn_with_state(app, require_auth))
}

/// Assemble the full router with the pipeline middleware.
///
/// Layer order is strict (outermost first): error normalization happens in
/// `Error::into_response` and so wraps everything; then rate limiting,
/// tracing, metrics, logging, and finally the handler.
pub fn init_routes(app: App) -> Router {
	Router::new()
		.merge(init_public_routes())
		.merge(init_protected_routes(app.clone()))
		.layer(middleware::from_fn(pipeline::logger))
		.layer(middleware::from_fn_with_state(app.clone(), pipeline::metrics))
		.layer(middleware::from_fn_with_state(app.clone(), pipeline::trace))
		.layer(middleware::from_fn_with_state(app.clone(), pipeline::rate_limit))
		.layer(CorsLayer::permissive())
		.layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
		.with_state(app)
}

// vim: ts=4
