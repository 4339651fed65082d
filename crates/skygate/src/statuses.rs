//! Status endpoints: create/fetch/delete, thread context, interactions.

use axum::{
	Json,
	extract::{Path, Query, State},
	http::HeaderMap,
};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use skygate_masto::entities::{Account, Context, Status};
use skygate_masto::pagination::PageQuery;
use skygate_oauth::extract::JsonOrForm;
use skygate_types::auth::{AuthCtx, Scope};
use skygate_types::cache_adapter::{CacheExt, keys};
use skygate_types::pds_adapter::{
	ByteSlice, CreatePost, Facet, FacetFeature, ReplyRef, StrongRef, ThreadNode,
};
use skygate_types::types::at_uri_did;

use crate::media::MediaDraft;
use crate::prelude::*;
use crate::util::{
	at_uri_for_status_id, hydrate_post, page_response, paginator, parse_snowflake, strong_ref,
	translator,
};

/// Bluesky's grapheme limit; enforced here on characters as a cheap proxy
const MAX_POST_CHARS: usize = 300;

// Facet detection //
//*****************//

// Patterns are compile-time constants; a parse failure is a programmer error
#[allow(clippy::unwrap_used)]
fn compile(pattern: &str) -> Regex {
	Regex::new(pattern).unwrap()
}

// A handle is at least two dot-separated labels
static MENTION_RE: LazyLock<Regex> =
	LazyLock::new(|| compile(r"@([A-Za-z0-9][A-Za-z0-9-]*(?:\.[A-Za-z0-9][A-Za-z0-9-]*)+)"));
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"https?://[^\s<>]+"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"#([A-Za-z0-9_]+)"));

/// Detect mention/link/tag facets in submitted text. Byte offsets come
/// straight from the regex engine, so multi-byte text is handled for free.
/// Mentions that don't resolve to a DID are left as plain text.
async fn detect_facets(app: &App, ctx: &AuthCtx, text: &str) -> SgResult<Vec<Facet>> {
	let mut facets = Vec::new();

	for m in LINK_RE.find_iter(text) {
		let trimmed = m.as_str().trim_end_matches(['.', ',', ';', '!', '?', ')']);
		facets.push(Facet {
			index: ByteSlice { byte_start: m.start(), byte_end: m.start() + trimmed.len() },
			features: vec![FacetFeature::Link { uri: trimmed.into() }],
		});
	}

	for captures in MENTION_RE.captures_iter(text) {
		let (Some(whole), Some(handle)) = (captures.get(0), captures.get(1)) else { continue };
		match app.pds.get_profile(&ctx.session, handle.as_str()).await {
			Ok(profile) => {
				app.ids.prime_handle(&profile.handle, &profile.did).await?;
				facets.push(Facet {
					index: ByteSlice { byte_start: whole.start(), byte_end: whole.end() },
					features: vec![FacetFeature::Mention { did: profile.did }],
				});
			}
			Err(err) => debug!("mention {} did not resolve: {}", handle.as_str(), err),
		}
	}

	for captures in TAG_RE.captures_iter(text) {
		let (Some(whole), Some(tag)) = (captures.get(0), captures.get(1)) else { continue };
		// Don't tag the fragment of a detected link
		if facets.iter().any(|f| {
			matches!(f.features.first(), Some(FacetFeature::Link { .. }))
				&& whole.start() >= f.index.byte_start
				&& whole.start() < f.index.byte_end
		}) {
			continue;
		}
		facets.push(Facet {
			index: ByteSlice { byte_start: whole.start(), byte_end: whole.end() },
			features: vec![FacetFeature::Tag { tag: tag.as_str().into() }],
		});
	}

	facets.sort_by_key(|f| f.index.byte_start);
	Ok(facets)
}

// POST /api/v1/statuses //
//***********************//

#[derive(Debug, Default, Deserialize)]
pub struct CreateStatusParams {
	pub status: Option<String>,
	pub in_reply_to_id: Option<String>,
	pub media_ids: Option<Vec<String>>,
	pub sensitive: Option<bool>,
	pub spoiler_text: Option<String>,
	pub visibility: Option<String>,
	pub language: Option<String>,
}

pub async fn post_statuses(
	State(app): State<App>,
	Auth(ctx): Auth,
	JsonOrForm(params): JsonOrForm<CreateStatusParams>,
) -> SgResult<Json<Status>> {
	ctx.require_scope(Scope::Write)?;

	let text = params.status.unwrap_or_default();
	let media_ids = params.media_ids.unwrap_or_default();
	if text.trim().is_empty() && media_ids.is_empty() {
		return Err(Error::validation("status", "text can't be blank"));
	}
	if text.chars().count() > MAX_POST_CHARS {
		return Err(Error::validation(
			"status",
			format!("text is limited to {} characters", MAX_POST_CHARS),
		));
	}

	// Reply threading: hydrate the parent so the record carries proper
	// strong refs for both parent and thread root
	let reply = match params.in_reply_to_id.as_deref() {
		Some(parent_id) => {
			let parent_uri = at_uri_for_status_id(&app, parent_id).await?;
			let parent = hydrate_post(&app, &ctx, &parent_uri).await?;
			let parent_ref = StrongRef { uri: parent.uri.clone(), cid: parent.cid.clone() };
			let root = parent
				.record
				.reply
				.as_ref()
				.map_or_else(|| parent_ref.clone(), |r| r.root.clone());
			Some(ReplyRef { root, parent: parent_ref })
		}
		None => None,
	};

	// Consume uploaded media drafts into an images embed
	let mut images = Vec::new();
	for media_id in &media_ids {
		let sf = parse_snowflake(media_id)?;
		let draft: MediaDraft = app
			.cache
			.get_json(&keys::media(sf))
			.await?
			.ok_or_else(|| Error::validation("media_ids", format!("unknown media {}", media_id)))?;
		images.push(serde_json::json!({
			"image": draft.blob,
			"alt": draft.description.unwrap_or_default(),
		}));
	}
	let embed = if images.is_empty() {
		None
	} else {
		Some(serde_json::json!({ "$type": "app.bsky.embed.images", "images": images }))
	};

	let facets = detect_facets(&app, &ctx, &text).await?;
	let created = app
		.pds
		.create_post(
			&ctx.session,
			&CreatePost {
				text: &text,
				reply,
				facets: if facets.is_empty() { None } else { Some(facets) },
				embed,
			},
		)
		.await?;

	for media_id in &media_ids {
		let sf = parse_snowflake(media_id)?;
		app.cache.delete(&keys::media(sf)).await?;
	}

	// Serve the hydrated post back; a thin fallback covers the window where
	// the appview hasn't indexed it yet
	match hydrate_post(&app, &ctx, &created.uri).await {
		Ok(post) => Ok(Json(translator(&app).status(&post).await?)),
		Err(_) => {
			let profile = app.pds.get_profile(&ctx.session, &ctx.did).await?;
			let view = skygate_types::pds_adapter::PostView {
				uri: created.uri,
				cid: created.cid,
				author: profile,
				record: skygate_types::pds_adapter::PostRecord {
					text,
					created_at: None,
					reply: None,
					facets: None,
				},
				embed: None,
				reply_count: Some(0),
				repost_count: Some(0),
				like_count: Some(0),
				indexed_at: None,
				viewer: None,
				labels: Vec::new(),
			};
			Ok(Json(translator(&app).status(&view).await?))
		}
	}
}

// GET /api/v1/statuses/{id} //
//***************************//

pub async fn get_status(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
) -> SgResult<Json<Status>> {
	let uri = at_uri_for_status_id(&app, &id).await?;
	let post = hydrate_post(&app, &ctx, &uri).await?;
	Ok(Json(translator(&app).status(&post).await?))
}

// DELETE /api/v1/statuses/{id} //
//******************************//

pub async fn delete_status(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
) -> SgResult<Json<Status>> {
	ctx.require_scope(Scope::Write)?;
	let uri = at_uri_for_status_id(&app, &id).await?;

	// Only the author's own posts can be deleted
	if at_uri_did(&uri) != Some(&*ctx.did) {
		return Err(Error::PermissionDenied);
	}

	// Mastodon returns the deleted status, so hydrate before deleting
	let status = match hydrate_post(&app, &ctx, &uri).await {
		Ok(post) => Some(translator(&app).status(&post).await?),
		Err(_) => None,
	};
	app.pds.delete_record(&ctx.session, &uri).await?;
	status.map(Json).ok_or(Error::NotFound)
}

// GET /api/v1/statuses/{id}/context //
//***********************************//

fn collect_ancestors(node: &ThreadNode, out: &mut Vec<skygate_types::pds_adapter::PostView>) {
	if let ThreadNode::Post { post, parent, .. } = node {
		if let Some(parent) = parent {
			collect_ancestors(parent, out);
		}
		out.push(post.clone());
	}
}

fn collect_descendants(node: &ThreadNode, out: &mut Vec<skygate_types::pds_adapter::PostView>) {
	if let ThreadNode::Post { post, replies, .. } = node {
		out.push(post.clone());
		for reply in replies.iter().flatten() {
			collect_descendants(reply, out);
		}
	}
}

pub async fn get_context(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
) -> SgResult<Json<Context>> {
	let uri = at_uri_for_status_id(&app, &id).await?;
	let thread = app.pds.get_post_thread(&ctx.session, &uri, 10).await?;

	let ThreadNode::Post { parent, replies, .. } = &thread else {
		return Err(Error::NotFound);
	};

	let mut ancestor_views = Vec::new();
	if let Some(parent) = parent {
		collect_ancestors(parent, &mut ancestor_views);
	}
	let mut descendant_views = Vec::new();
	for reply in replies.iter().flatten() {
		collect_descendants(reply, &mut descendant_views);
	}

	let translator = translator(&app);
	let mut ancestors = Vec::with_capacity(ancestor_views.len());
	for view in &ancestor_views {
		ancestors.push(translator.status(view).await?);
	}
	let mut descendants = Vec::with_capacity(descendant_views.len());
	for view in &descendant_views {
		descendants.push(translator.status(view).await?);
	}

	Ok(Json(Context { ancestors, descendants }))
}

// Interactions //
//**************//

pub async fn post_favourite(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
) -> SgResult<Json<Status>> {
	ctx.require_scope(Scope::Write)?;
	let sf = parse_snowflake(&id)?;
	let uri = at_uri_for_status_id(&app, &id).await?;
	let subject = strong_ref(&app, &ctx, &uri).await?;

	let like_uri = app.pds.like_post(&ctx.session, &subject).await?;
	app.cache.set(&keys::like_record(&ctx.did, sf), like_uri.as_bytes(), None).await?;

	let post = hydrate_post(&app, &ctx, &uri).await?;
	let mut status = translator(&app).status(&post).await?;
	if !status.favourited {
		status.favourites_count = status.favourites_count.saturating_add(1);
	}
	status.favourited = true;
	Ok(Json(status))
}

pub async fn post_unfavourite(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
) -> SgResult<Json<Status>> {
	ctx.require_scope(Scope::Write)?;
	let sf = parse_snowflake(&id)?;
	let uri = at_uri_for_status_id(&app, &id).await?;

	// The like record URI was stored at favourite time; the viewer state
	// covers likes created in other clients
	let key = keys::like_record(&ctx.did, sf);
	let like_uri = match app.cache.get(&key).await? {
		Some(bytes) => Some(String::from_utf8(bytes).map_err(|_| Error::Parse)?),
		None => hydrate_post(&app, &ctx, &uri)
			.await?
			.viewer
			.and_then(|v| v.like)
			.map(|uri| uri.to_string()),
	};

	if let Some(like_uri) = like_uri {
		app.pds.unlike(&ctx.session, &like_uri).await?;
		app.cache.delete(&key).await?;
	}

	let post = hydrate_post(&app, &ctx, &uri).await?;
	let mut status = translator(&app).status(&post).await?;
	status.favourited = false;
	Ok(Json(status))
}

pub async fn post_reblog(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
) -> SgResult<Json<Status>> {
	ctx.require_scope(Scope::Write)?;
	let sf = parse_snowflake(&id)?;
	let uri = at_uri_for_status_id(&app, &id).await?;
	let subject = strong_ref(&app, &ctx, &uri).await?;

	let repost_uri = app.pds.repost(&ctx.session, &subject).await?;
	app.cache.set(&keys::repost_record(&ctx.did, sf), repost_uri.as_bytes(), None).await?;

	let post = hydrate_post(&app, &ctx, &uri).await?;
	let mut status = translator(&app).status(&post).await?;
	status.reblogged = true;
	Ok(Json(status))
}

pub async fn post_unreblog(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
) -> SgResult<Json<Status>> {
	ctx.require_scope(Scope::Write)?;
	let sf = parse_snowflake(&id)?;
	let uri = at_uri_for_status_id(&app, &id).await?;

	let key = keys::repost_record(&ctx.did, sf);
	let repost_uri = match app.cache.get(&key).await? {
		Some(bytes) => Some(String::from_utf8(bytes).map_err(|_| Error::Parse)?),
		None => hydrate_post(&app, &ctx, &uri)
			.await?
			.viewer
			.and_then(|v| v.repost)
			.map(|uri| uri.to_string()),
	};

	if let Some(repost_uri) = repost_uri {
		app.pds.unrepost(&ctx.session, &repost_uri).await?;
		app.cache.delete(&key).await?;
	}

	let post = hydrate_post(&app, &ctx, &uri).await?;
	let mut status = translator(&app).status(&post).await?;
	status.reblogged = false;
	Ok(Json(status))
}

// GET /api/v1/statuses/{id}/favourited_by + reblogged_by //
//********************************************************//

pub async fn get_favourited_by(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
	Query(query): Query<PageQuery>,
) -> SgResult<(HeaderMap, Json<Vec<Account>>)> {
	let uri = at_uri_for_status_id(&app, &id).await?;
	let route = format!("favourited_by:{}", id);
	let cursor = paginator(&app).cursor_for(&route, &ctx.did, &query).await?;

	let page = app.pds.get_liked_by(&ctx.session, &uri, query.limit(), cursor.as_deref()).await?;
	profiles_page(&app, &ctx, &route, &query, page).await
}

pub async fn get_reblogged_by(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
	Query(query): Query<PageQuery>,
) -> SgResult<(HeaderMap, Json<Vec<Account>>)> {
	let uri = at_uri_for_status_id(&app, &id).await?;
	let route = format!("reblogged_by:{}", id);
	let cursor = paginator(&app).cursor_for(&route, &ctx.did, &query).await?;

	let page =
		app.pds.get_reposted_by(&ctx.session, &uri, query.limit(), cursor.as_deref()).await?;
	profiles_page(&app, &ctx, &route, &query, page).await
}

async fn profiles_page(
	app: &App,
	ctx: &AuthCtx,
	route: &str,
	query: &PageQuery,
	page: skygate_types::pds_adapter::Page<skygate_types::pds_adapter::ProfileView>,
) -> SgResult<(HeaderMap, Json<Vec<Account>>)> {
	let translator = translator(app);
	let mut accounts = Vec::with_capacity(page.items.len());
	let mut ids = Vec::new();
	for profile in &page.items {
		let account = translator.account(profile).await?;
		ids.push(account.id.parse::<i64>().unwrap_or_default());
		accounts.push(account);
	}
	page_response(app, route, &ctx.did, query, &ids, page.cursor.as_deref(), accounts).await
}


// vim: ts=4
