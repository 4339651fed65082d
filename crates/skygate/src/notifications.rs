//! Notification endpoints

use axum::{
	Json,
	extract::{Path, Query, State},
	http::HeaderMap,
};
use std::collections::HashMap;

use skygate_masto::Translator;
use skygate_masto::entities::Notification;
use skygate_masto::pagination::PageQuery;
use skygate_types::auth::AuthCtx;
use skygate_types::pds_adapter::{NotificationView, PostView};

use crate::prelude::*;
use crate::util::{page_response, paginator, parse_snowflake, translator};

/// Batch-hydrate the subject posts the page of notifications refers to
async fn hydrate_subjects(
	app: &App,
	ctx: &AuthCtx,
	views: &[NotificationView],
) -> SgResult<HashMap<String, PostView>> {
	let mut uris: Vec<&str> = views
		.iter()
		.filter_map(Translator::notification_subject_uri)
		.collect();
	uris.sort_unstable();
	uris.dedup();

	let mut subjects = HashMap::new();
	// getPosts caps at 25 URIs per call
	for chunk in uris.chunks(25) {
		let posts = app.pds.get_posts(&ctx.session, chunk).await?;
		for post in posts {
			subjects.insert(post.uri.to_string(), post);
		}
	}
	Ok(subjects)
}

async fn translate_page(
	app: &App,
	ctx: &AuthCtx,
	views: &[NotificationView],
) -> SgResult<Vec<Notification>> {
	let subjects = hydrate_subjects(app, ctx, views).await?;
	let translator = translator(app);

	let mut notifications = Vec::with_capacity(views.len());
	for view in views {
		let subject = Translator::notification_subject_uri(view)
			.and_then(|uri| subjects.get(uri));
		if let Some(notification) = translator.notification(view, subject).await? {
			notifications.push(notification);
		}
	}
	Ok(notifications)
}

// GET /api/v1/notifications //
//***************************//

pub async fn get_notifications(
	State(app): State<App>,
	Auth(ctx): Auth,
	Query(query): Query<PageQuery>,
) -> SgResult<(HeaderMap, Json<Vec<Notification>>)> {
	let cursor = paginator(&app).cursor_for("notifications", &ctx.did, &query).await?;
	let page = app
		.pds
		.list_notifications(&ctx.session, query.limit(), cursor.as_deref(), None)
		.await?;

	let notifications = translate_page(&app, &ctx, &page.items).await?;
	let ids: Vec<i64> =
		notifications.iter().map(|n| n.id.parse().unwrap_or_default()).collect();
	page_response(
		&app,
		"notifications",
		&ctx.did,
		&query,
		&ids,
		page.cursor.as_deref(),
		notifications,
	)
	.await
}

// GET /api/v1/notifications/{id} //
//********************************//

/// Single-notification fetch: notifications are not individually
/// addressable upstream, so scan a recent page for the matching id
pub async fn get_notification(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
) -> SgResult<Json<Notification>> {
	let sf = parse_snowflake(&id)?;
	let page = app.pds.list_notifications(&ctx.session, 40, None, None).await?;

	let target = sf.to_string();
	let notifications = translate_page(&app, &ctx, &page.items).await?;
	notifications
		.into_iter()
		.find(|n| n.id == target)
		.map(Json)
		.ok_or(Error::NotFound)
}

// POST /api/v1/notifications/clear //
//**********************************//

pub async fn post_clear(
	State(app): State<App>,
	Auth(ctx): Auth,
) -> SgResult<Json<serde_json::Value>> {
	app.pds.mark_seen(&ctx.session).await?;
	Ok(Json(serde_json::json!({})))
}

// vim: ts=4
