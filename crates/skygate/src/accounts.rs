//! Account endpoints: credentials, lookup, profiles, follows, relationships.

use axum::{
	Json,
	extract::{Path, Query, RawQuery, State},
	http::HeaderMap,
};
use serde::Deserialize;

use skygate_masto::entities::{Account, CredentialAccount, Relationship};
use skygate_masto::pagination::PageQuery;
use skygate_types::auth::Scope;
use skygate_types::cache_adapter::keys;

use crate::prelude::*;
use crate::util::{did_for_account_id, page_response, paginator, translator};

// GET /api/v1/accounts/verify_credentials //
//*****************************************//

pub async fn get_verify_credentials(
	State(app): State<App>,
	Auth(ctx): Auth,
) -> SgResult<Json<CredentialAccount>> {
	let profile = app.pds.get_profile(&ctx.session, &ctx.did).await?;
	Ok(Json(translator(&app).credential_account(&profile).await?))
}

// GET /api/v1/accounts/lookup //
//*****************************//

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
	pub acct: String,
}

pub async fn get_lookup(
	State(app): State<App>,
	Auth(ctx): Auth,
	Query(query): Query<LookupQuery>,
) -> SgResult<Json<Account>> {
	let acct = query.acct.trim_start_matches('@');
	let profile = app.pds.get_profile(&ctx.session, acct).await?;
	Ok(Json(translator(&app).account(&profile).await?))
}

// GET /api/v1/accounts/search //
//*****************************//

#[derive(Debug, Deserialize)]
pub struct AccountSearchQuery {
	pub q: String,
	pub limit: Option<u32>,
}

pub async fn get_account_search(
	State(app): State<App>,
	Auth(ctx): Auth,
	Query(query): Query<AccountSearchQuery>,
) -> SgResult<Json<Vec<Account>>> {
	let limit = query.limit.unwrap_or(20).clamp(1, 40);
	let page = app.pds.search_actors(&ctx.session, &query.q, limit, None).await?;

	let translator = translator(&app);
	let mut accounts = Vec::with_capacity(page.items.len());
	for profile in &page.items {
		accounts.push(translator.account(profile).await?);
	}
	Ok(Json(accounts))
}

// GET /api/v1/accounts/relationships //
//************************************//

/// Mastodon sends `id[]=1&id[]=2` (sometimes bare `id=`); neither form maps
/// onto a flat struct, so the raw query string is parsed directly.
pub async fn get_relationships(
	State(app): State<App>,
	Auth(ctx): Auth,
	RawQuery(raw): RawQuery,
) -> SgResult<Json<Vec<Relationship>>> {
	let raw = raw.unwrap_or_default();
	let ids: Vec<String> = url::form_urlencoded::parse(raw.as_bytes())
		.filter(|(key, _)| key == "id[]" || key == "id")
		.map(|(_, value)| value.into_owned())
		.collect();

	let translator = translator(&app);
	let mut relationships = Vec::with_capacity(ids.len());
	for id in &ids {
		let Ok(did) = did_for_account_id(&app, id).await else {
			relationships.push(Relationship::none(id.clone()));
			continue;
		};
		match app.pds.get_profile(&ctx.session, &did).await {
			Ok(profile) => relationships.push(translator.relationship(&profile).await?),
			Err(_) => relationships.push(Relationship::none(id.clone())),
		}
	}
	Ok(Json(relationships))
}

// GET /api/v1/accounts/{id} //
//***************************//

pub async fn get_account(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
) -> SgResult<Json<Account>> {
	let did = did_for_account_id(&app, &id).await?;
	let profile = app.pds.get_profile(&ctx.session, &did).await?;
	Ok(Json(translator(&app).account(&profile).await?))
}

// GET /api/v1/accounts/{id}/statuses //
//************************************//

/// `serde(flatten)` breaks numeric fields under `serde_urlencoded`, so the
/// paging keys are spelled out instead of embedding [`PageQuery`]
#[derive(Debug, Deserialize)]
pub struct AccountStatusesQuery {
	pub max_id: Option<String>,
	pub since_id: Option<String>,
	pub min_id: Option<String>,
	pub limit: Option<u32>,
	pub exclude_replies: Option<bool>,
	pub exclude_reblogs: Option<bool>,
	pub only_media: Option<bool>,
	pub pinned: Option<bool>,
}

impl AccountStatusesQuery {
	fn page(&self) -> PageQuery {
		PageQuery {
			max_id: self.max_id.clone(),
			since_id: self.since_id.clone(),
			min_id: self.min_id.clone(),
			limit: self.limit,
		}
	}
}

pub async fn get_account_statuses(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
	Query(query): Query<AccountStatusesQuery>,
) -> SgResult<impl axum::response::IntoResponse> {
	// Pinned posts are not modeled on Bluesky
	if query.pinned.unwrap_or(false) {
		return Ok((HeaderMap::new(), Json(Vec::new())));
	}

	let did = did_for_account_id(&app, &id).await?;
	let route = format!("account_statuses:{}", id);
	let page_query = query.page();
	let cursor = paginator(&app).cursor_for(&route, &ctx.did, &page_query).await?;

	let filter = if query.only_media.unwrap_or(false) {
		Some("posts_with_media")
	} else if query.exclude_replies.unwrap_or(false) {
		Some("posts_no_replies")
	} else {
		None
	};

	let page = app
		.pds
		.get_author_feed(&ctx.session, &did, page_query.limit(), cursor.as_deref(), filter)
		.await?;

	let translator = translator(&app);
	let mut statuses = Vec::new();
	let mut ids = Vec::new();
	for item in &page.items {
		if query.exclude_reblogs.unwrap_or(false) && item.reason.is_some() {
			continue;
		}
		let status = translator.feed_status(item).await?;
		ids.push(status.id.parse::<i64>().unwrap_or_default());
		statuses.push(status);
	}

	page_response(&app, &route, &ctx.did, &page_query, &ids, page.cursor.as_deref(), statuses)
		.await
}

// GET /api/v1/accounts/{id}/followers + following //
//*************************************************//

pub async fn get_account_followers(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
	Query(query): Query<PageQuery>,
) -> SgResult<impl axum::response::IntoResponse> {
	follow_listing(app, ctx, id, query, FollowDirection::Followers).await
}

pub async fn get_account_following(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
	Query(query): Query<PageQuery>,
) -> SgResult<impl axum::response::IntoResponse> {
	follow_listing(app, ctx, id, query, FollowDirection::Following).await
}

enum FollowDirection {
	Followers,
	Following,
}

async fn follow_listing(
	app: App,
	ctx: skygate_types::auth::AuthCtx,
	id: String,
	query: PageQuery,
	direction: FollowDirection,
) -> SgResult<(HeaderMap, Json<Vec<Account>>)> {
	let did = did_for_account_id(&app, &id).await?;
	let route = match direction {
		FollowDirection::Followers => format!("followers:{}", id),
		FollowDirection::Following => format!("following:{}", id),
	};
	let cursor = paginator(&app).cursor_for(&route, &ctx.did, &query).await?;

	let page = match direction {
		FollowDirection::Followers => {
			app.pds.get_followers(&ctx.session, &did, query.limit(), cursor.as_deref()).await?
		}
		FollowDirection::Following => {
			app.pds.get_follows(&ctx.session, &did, query.limit(), cursor.as_deref()).await?
		}
	};

	let translator = translator(&app);
	let mut accounts = Vec::with_capacity(page.items.len());
	let mut ids = Vec::new();
	for profile in &page.items {
		let account = translator.account(profile).await?;
		ids.push(account.id.parse::<i64>().unwrap_or_default());
		accounts.push(account);
	}

	page_response(&app, &route, &ctx.did, &query, &ids, page.cursor.as_deref(), accounts).await
}

// POST /api/v1/accounts/{id}/follow + unfollow //
//**********************************************//

pub async fn post_follow(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
) -> SgResult<Json<Relationship>> {
	ctx.require_scope(Scope::Follow)?;
	let did = did_for_account_id(&app, &id).await?;
	let sf = crate::util::parse_snowflake(&id)?;

	// Following is idempotent towards the client: an existing follow record
	// is reused rather than duplicated
	let profile = app.pds.get_profile(&ctx.session, &did).await?;
	let existing = profile.viewer.as_ref().and_then(|v| v.following.clone());
	let follow_uri = match existing {
		Some(uri) => uri,
		None => app.pds.follow(&ctx.session, &did).await?,
	};
	// The record URI is what undoes the follow later
	app.cache
		.set(&keys::follow_record(&ctx.did, sf), follow_uri.as_bytes(), None)
		.await?;

	let mut relationship = translator(&app).relationship(&profile).await?;
	relationship.following = true;
	Ok(Json(relationship))
}

pub async fn post_unfollow(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
) -> SgResult<Json<Relationship>> {
	ctx.require_scope(Scope::Follow)?;
	let did = did_for_account_id(&app, &id).await?;
	let sf = crate::util::parse_snowflake(&id)?;

	// Prefer the record URI remembered at follow time; fall back to the
	// viewer state for follows created outside this gateway
	let key = keys::follow_record(&ctx.did, sf);
	let follow_uri = match app.cache.get(&key).await? {
		Some(bytes) => String::from_utf8(bytes).map_err(|_| Error::Parse)?,
		None => {
			let profile = app.pds.get_profile(&ctx.session, &did).await?;
			profile
				.viewer
				.and_then(|v| v.following)
				.map(|uri| uri.to_string())
				.ok_or(Error::NotFound)?
		}
	};

	app.pds.unfollow(&ctx.session, &follow_uri).await?;
	app.cache.delete(&key).await?;

	let profile = app.pds.get_profile(&ctx.session, &did).await?;
	let mut relationship = translator(&app).relationship(&profile).await?;
	relationship.following = false;
	Ok(Json(relationship))
}

// vim: ts=4
