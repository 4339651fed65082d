//! Timeline endpoints: home, public, hashtag, list.

use axum::{
	Json,
	extract::{Path, Query, State},
	http::HeaderMap,
};

use skygate_masto::entities::Status;
use skygate_masto::pagination::PageQuery;
use skygate_types::auth::AuthCtx;
use skygate_types::pds_adapter::{FeedViewPost, Page};

use crate::prelude::*;
use crate::util::{page_response, paginator, translator};

/// Feed generator backing the public timeline (Bluesky's Discover feed)
const DISCOVER_FEED_URI: &str =
	"at://did:plc:z72i7hdynmk6r22z27h6tvur/app.bsky.feed.generator/whats-hot";

async fn feed_page(
	app: &App,
	ctx: &AuthCtx,
	route: &str,
	query: &PageQuery,
	page: Page<FeedViewPost>,
) -> SgResult<(HeaderMap, Json<Vec<Status>>)> {
	let translator = translator(app);
	let mut statuses = Vec::with_capacity(page.items.len());
	let mut ids = Vec::new();
	for item in &page.items {
		let status = translator.feed_status(item).await?;
		ids.push(status.id.parse::<i64>().unwrap_or_default());
		statuses.push(status);
	}
	page_response(app, route, &ctx.did, query, &ids, page.cursor.as_deref(), statuses).await
}

// GET /api/v1/timelines/home //
//****************************//

pub async fn get_home(
	State(app): State<App>,
	Auth(ctx): Auth,
	Query(query): Query<PageQuery>,
) -> SgResult<(HeaderMap, Json<Vec<Status>>)> {
	let cursor = paginator(&app).cursor_for("home", &ctx.did, &query).await?;
	let page = app.pds.get_timeline(&ctx.session, query.limit(), cursor.as_deref()).await?;
	feed_page(&app, &ctx, "home", &query, page).await
}

// GET /api/v1/timelines/public //
//******************************//

pub async fn get_public(
	State(app): State<App>,
	Auth(ctx): Auth,
	Query(query): Query<PageQuery>,
) -> SgResult<(HeaderMap, Json<Vec<Status>>)> {
	let cursor = paginator(&app).cursor_for("public", &ctx.did, &query).await?;
	let page = app
		.pds
		.get_feed(&ctx.session, DISCOVER_FEED_URI, query.limit(), cursor.as_deref())
		.await?;
	feed_page(&app, &ctx, "public", &query, page).await
}

// GET /api/v1/timelines/tag/{hashtag} //
//*************************************//

pub async fn get_tag(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(hashtag): Path<String>,
	Query(query): Query<PageQuery>,
) -> SgResult<(HeaderMap, Json<Vec<Status>>)> {
	let route = format!("tag:{}", hashtag);
	let cursor = paginator(&app).cursor_for(&route, &ctx.did, &query).await?;

	let search = format!("#{}", hashtag);
	let page =
		app.pds.search_posts(&ctx.session, &search, query.limit(), cursor.as_deref()).await?;

	let translator = translator(&app);
	let mut statuses = Vec::with_capacity(page.items.len());
	let mut ids = Vec::new();
	for post in &page.items {
		let status = translator.status(post).await?;
		ids.push(status.id.parse::<i64>().unwrap_or_default());
		statuses.push(status);
	}
	page_response(&app, &route, &ctx.did, &query, &ids, page.cursor.as_deref(), statuses).await
}

// GET /api/v1/timelines/list/{id} //
//*********************************//

/// Lists are not bridged; an empty timeline keeps clients functional
pub async fn get_list_timeline(
	Auth(_ctx): Auth,
	Path(_id): Path<String>,
) -> Json<Vec<Status>> {
	Json(Vec::new())
}

// vim: ts=4
