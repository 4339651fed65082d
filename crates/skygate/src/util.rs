//! Shared handler helpers: ID resolution, hydration, page responses.

use axum::Json;
use axum::http::{HeaderMap, HeaderValue, header};

use skygate_masto::Translator;
use skygate_masto::pagination::{PageQuery, Paginator, link_header};
use skygate_types::auth::AuthCtx;
use skygate_types::pds_adapter::{PostView, StrongRef};

use crate::prelude::*;

pub fn translator(app: &App) -> Translator {
	Translator::new(app.ids.clone())
}

pub fn paginator(app: &App) -> Paginator {
	Paginator::new(app.cache.clone())
}

/// Parse a Mastodon path id into a snowflake
pub fn parse_snowflake(id: &str) -> SgResult<i64> {
	id.parse::<i64>().map_err(|_| Error::NotFound)
}

/// Resolve an account path id to the DID it was primed from
pub async fn did_for_account_id(app: &App, id: &str) -> SgResult<String> {
	let sf = parse_snowflake(id)?;
	app.ids.did_for_snowflake(sf).await?.ok_or(Error::NotFound)
}

/// Resolve a status path id to its AT URI
pub async fn at_uri_for_status_id(app: &App, id: &str) -> SgResult<String> {
	let sf = parse_snowflake(id)?;
	app.ids.at_uri_for_snowflake(sf).await?.ok_or(Error::NotFound)
}

/// Hydrate a single post view by AT URI
pub async fn hydrate_post(app: &App, ctx: &AuthCtx, uri: &str) -> SgResult<PostView> {
	let posts = app.pds.get_posts(&ctx.session, &[uri]).await?;
	posts.into_iter().next().ok_or(Error::NotFound)
}

/// The strong ref (uri + cid) of a post, needed for like/repost subjects
pub async fn strong_ref(app: &App, ctx: &AuthCtx, uri: &str) -> SgResult<StrongRef> {
	let post = hydrate_post(app, ctx, uri).await?;
	Ok(StrongRef { uri: post.uri, cid: post.cid })
}

/// A JSON page with a `Link` header for Mastodon-style pagination.
///
/// `route` scopes the bridged upstream cursor; `ids` are the snowflakes of
/// the served items in display order.
pub async fn page_response<T: serde::Serialize>(
	app: &App,
	route: &str,
	viewer: &str,
	query: &PageQuery,
	ids: &[i64],
	cursor: Option<&str>,
	items: Vec<T>,
) -> SgResult<(HeaderMap, Json<Vec<T>>)> {
	if let Some(last_sf) = ids.last() {
		paginator(app).remember(route, viewer, *last_sf, cursor).await?;
	}

	let mut headers = HeaderMap::new();
	let base = format!("https://{}{}", app.opts.domain, route_path(route));
	if let Some(link) = link_header(&base, query.limit(), ids, cursor.is_some()) {
		if let Ok(value) = HeaderValue::from_str(&link) {
			headers.insert(header::LINK, value);
		}
	}
	Ok((headers, Json(items)))
}

/// The request path a pagination route key corresponds to
fn route_path(route: &str) -> String {
	match route.split_once(':') {
		Some((prefix, id)) => match prefix {
			"account_statuses" => format!("/api/v1/accounts/{}/statuses", id),
			"followers" => format!("/api/v1/accounts/{}/followers", id),
			"following" => format!("/api/v1/accounts/{}/following", id),
			"favourited_by" => format!("/api/v1/statuses/{}/favourited_by", id),
			"reblogged_by" => format!("/api/v1/statuses/{}/reblogged_by", id),
			"tag" => format!("/api/v1/timelines/tag/{}", id),
			_ => format!("/{}", route),
		},
		None => match route {
			"home" => "/api/v1/timelines/home".to_string(),
			"public" => "/api/v1/timelines/public".to_string(),
			"notifications" => "/api/v1/notifications".to_string(),
			_ => format!("/{}", route),
		},
	}
}


// vim: ts=4
