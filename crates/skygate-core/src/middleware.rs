//! Custom middlewares for the request pipeline.
//!
//! Chain ordering, outermost to innermost: error normalization (the
//! `IntoResponse` impl on `Error`, so it wraps everything below by
//! construction) → rate limiting → tracing → metrics → logging → handler.
//! The router applies these with `axum::middleware::from_fn_with_state`.

use axum::{
	body::Body,
	extract::{ConnectInfo, MatchedPath, State},
	http::{HeaderValue, Request, header},
	middleware::Next,
	response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, TimeZone, Utc};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::Instrument;

use skygate_types::cache_adapter::{CacheExt, keys};
use skygate_types::trace::{self, TraceContext};

use crate::prelude::*;
use crate::rate_limit::{RateDecision, SCOPE_IP, SCOPE_USER};

/// Paths exempt from rate limiting and request metrics
fn is_internal_path(path: &str) -> bool {
	path == "/healthz" || path == "/metrics"
}

// Rate limiting //
//***************//

fn bearer_token(req: &Request<Body>) -> Option<&str> {
	let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
	value.strip_prefix("Bearer ").map(str::trim)
}

fn client_ip(req: &Request<Body>) -> String {
	// First X-Forwarded-For hop when behind a proxy, socket address otherwise
	if let Some(forwarded) = req.headers().get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
		if let Some(first) = forwarded.split(',').next() {
			let first = first.trim();
			if !first.is_empty() {
				return first.to_string();
			}
		}
	}
	req.extensions()
		.get::<ConnectInfo<SocketAddr>>()
		.map(|info| info.0.ip().to_string())
		.unwrap_or_else(|| "unknown".to_string())
}

/// The bucket key for a request: the token's DID when a known bearer token
/// is presented, the client IP otherwise. The token is only peeked here
/// (one cache read); real validation happens in the auth middleware.
async fn rate_key(app: &App, token: Option<&str>, ip: &str) -> (&'static str, String) {
	if let Some(token) = token {
		let peek: SgResult<Option<serde_json::Value>> =
			app.cache.get_json(&keys::oauth_token(token)).await;
		if let Ok(Some(stored)) = peek {
			if let Some(did) = stored.get("did").and_then(|v| v.as_str()) {
				return (SCOPE_USER, did.to_string());
			}
		}
	}
	(SCOPE_IP, ip.to_string())
}

fn set_rate_headers(response: &mut Response, decision: &RateDecision) {
	let reset_iso = Utc
		.timestamp_opt(decision.reset_at, 0)
		.single()
		.map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
		.unwrap_or_default();

	let headers = response.headers_mut();
	if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
		headers.insert("X-RateLimit-Limit", value);
	}
	if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
		headers.insert("X-RateLimit-Remaining", value);
	}
	if let Ok(value) = HeaderValue::from_str(&reset_iso) {
		headers.insert("X-RateLimit-Reset", value);
	}
}

pub async fn rate_limit(State(app): State<App>, req: Request<Body>, next: Next) -> Response {
	if is_internal_path(req.uri().path()) {
		return next.run(req).await;
	}

	let (scope, id) = rate_key(&app, bearer_token(&req), &client_ip(&req)).await;
	match app.rate_limiter.check(scope, &id).await {
		Ok(decision) => {
			let mut response = if decision.allowed {
				next.run(req).await
			} else {
				debug!(scope = scope, id = %id, "rate limited");
				Error::RateLimited { retry_after: decision.retry_after }.into_response()
			};
			set_rate_headers(&mut response, &decision);
			response
		}
		Err(err) => err.into_response(),
	}
}

// Tracing //
//*********//

/// Open a span per request, propagate W3C TraceContext inbound and outbound,
/// and expose the context to downstream layers (and the PDS adapter, via the
/// task-local in `skygate_types::trace`).
pub async fn trace(State(app): State<App>, mut req: Request<Body>, next: Next) -> Response {
	if !app.opts.enable_tracing {
		return next.run(req).await;
	}

	let ctx = req
		.headers()
		.get("traceparent")
		.and_then(|v| v.to_str().ok())
		.and_then(TraceContext::from_traceparent)
		.unwrap_or_else(TraceContext::new_root);

	let span = info_span!(
		"http_request",
		http.method = %req.method(),
		http.target = %req.uri().path(),
		http.status_code = tracing::field::Empty,
		http.duration_ms = tracing::field::Empty,
		trace_id = %ctx.trace_id,
		span_id = %ctx.span_id,
	);

	req.extensions_mut().insert(ctx.clone());
	let traceparent = ctx.to_traceparent();

	let start = Instant::now();
	let mut response =
		trace::with_trace(ctx, next.run(req)).instrument(span.clone()).await;
	let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

	span.record("http.status_code", response.status().as_u16());
	span.record("http.duration_ms", duration_ms);

	if let Ok(value) = HeaderValue::from_str(&traceparent) {
		response.headers_mut().insert("traceparent", value);
	}
	response
}

// Metrics //
//*********//

pub async fn metrics(State(app): State<App>, req: Request<Body>, next: Next) -> Response {
	if !app.opts.enable_metrics || is_internal_path(req.uri().path()) {
		return next.run(req).await;
	}

	let method = req.method().to_string();
	// The matched route pattern keeps label cardinality bounded
	let route = req
		.extensions()
		.get::<MatchedPath>()
		.map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());

	app.metrics.request_started();
	let start = Instant::now();
	let response = next.run(req).await;
	app.metrics.request_finished(
		&method,
		&route,
		response.status().as_u16(),
		start.elapsed().as_secs_f64(),
	);
	response
}

// Logging //
//*********//

/// One structured line per request-response pair, correlated with the
/// request span through the propagated trace context.
pub async fn logger(req: Request<Body>, next: Next) -> Response {
	let method = req.method().clone();
	let path = req.uri().path().to_string();
	let ctx = req.extensions().get::<TraceContext>().cloned();

	let start = Instant::now();
	let response = next.run(req).await;
	let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
	let status = response.status().as_u16();

	match ctx {
		Some(ctx) => info!(
			method = %method,
			path = %path,
			status = status,
			duration_ms = duration_ms,
			trace_id = %ctx.trace_id,
			span_id = %ctx.span_id,
			"request"
		),
		None => info!(
			method = %method,
			path = %path,
			status = status,
			duration_ms = duration_ms,
			"request"
		),
	}
	response
}

// vim: ts=4
