//! Unified search (`/api/v2/search`)

use axum::{
	Json,
	extract::{Query, State},
};
use serde::Deserialize;

use skygate_masto::entities::{SearchResults, Tag};

use crate::prelude::*;
use crate::util::translator;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
	pub q: String,
	#[serde(rename = "type")]
	pub kind: Option<String>,
	pub limit: Option<u32>,
	pub resolve: Option<bool>,
}

pub async fn get_search(
	State(app): State<App>,
	Auth(ctx): Auth,
	Query(query): Query<SearchQuery>,
) -> SgResult<Json<SearchResults>> {
	let limit = query.limit.unwrap_or(20).clamp(1, 40);
	let kind = query.kind.as_deref();
	let term = query.q.trim();

	let mut results = SearchResults {
		accounts: Vec::new(),
		statuses: Vec::new(),
		hashtags: Vec::new(),
	};
	if term.is_empty() {
		return Ok(Json(results));
	}

	let translator = translator(&app);

	if kind.is_none() || kind == Some("accounts") {
		// A bare hashtag query is never an account search
		if !term.starts_with('#') {
			let actor_query = term.trim_start_matches('@');
			if let Ok(page) =
				app.pds.search_actors(&ctx.session, actor_query, limit, None).await
			{
				for profile in &page.items {
					results.accounts.push(translator.account(profile).await?);
				}
			}
		}
	}

	if kind.is_none() || kind == Some("statuses") {
		if let Ok(page) = app.pds.search_posts(&ctx.session, term, limit, None).await {
			for post in &page.items {
				results.statuses.push(translator.status(post).await?);
			}
		}
	}

	if (kind.is_none() || kind == Some("hashtags")) && term.starts_with('#') {
		let name = term.trim_start_matches('#');
		if !name.is_empty() {
			results.hashtags.push(Tag {
				name: name.to_string(),
				url: format!("https://bsky.app/hashtag/{}", name),
			});
		}
	}

	Ok(Json(results))
}

// vim: ts=4
