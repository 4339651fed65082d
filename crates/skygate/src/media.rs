//! Media endpoints: blob upload and attachment drafts.
//!
//! An upload pushes the blob to the PDS immediately and parks the returned
//! blob object in the cache as a draft attachment. Status creation consumes
//! the drafts into an images embed; unused drafts lapse with their TTL.

use axum::{
	Json,
	extract::{Multipart, Path, State},
	http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use skygate_masto::entities::MediaAttachment;
use skygate_oauth::extract::JsonOrForm;
use skygate_types::auth::Scope;
use skygate_types::cache_adapter::{CacheExt, keys};

use crate::prelude::*;
use crate::util::parse_snowflake;

/// Unattached uploads survive this long
const DRAFT_TTL: Duration = Duration::from_secs(24 * 3600);

/// An uploaded blob waiting to be attached to a status
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MediaDraft {
	pub blob: serde_json::Value,
	pub mime_type: String,
	pub description: Option<String>,
}

fn attachment_of(app: &App, sf: i64, draft: &MediaDraft) -> MediaAttachment {
	// There is no public URL until the status exists; a gateway-local URL
	// keeps clients that insist on one working
	let url = format!("https://{}/media/{}", app.opts.domain, sf);
	MediaAttachment {
		id: sf.to_string(),
		kind: "image".into(),
		url: url.clone(),
		preview_url: url,
		remote_url: None,
		description: draft.description.clone(),
		blurhash: None,
	}
}

// POST /api/v1/media, /api/v2/media //
//***********************************//

pub async fn post_media(
	State(app): State<App>,
	Auth(ctx): Auth,
	mut multipart: Multipart,
) -> SgResult<(StatusCode, Json<MediaAttachment>)> {
	ctx.require_scope(Scope::Write)?;

	let mut bytes: Option<(Vec<u8>, String)> = None;
	let mut description: Option<String> = None;

	while let Some(field) = multipart
		.next_field()
		.await
		.map_err(|_| Error::validation("file", "malformed multipart body"))?
	{
		match field.name() {
			Some("file") => {
				let mime = field
					.content_type()
					.unwrap_or("application/octet-stream")
					.to_string();
				if !mime.starts_with("image/") {
					return Err(Error::validation("file", "unsupported media type"));
				}
				let data = field
					.bytes()
					.await
					.map_err(|_| Error::validation("file", "failed to read upload"))?;
				bytes = Some((data.to_vec(), mime));
			}
			Some("description") => {
				let text = field
					.text()
					.await
					.map_err(|_| Error::validation("description", "failed to read field"))?;
				if !text.is_empty() {
					description = Some(text);
				}
			}
			_ => {}
		}
	}

	let (data, mime_type) =
		bytes.ok_or_else(|| Error::validation("file", "file part is required"))?;
	if data.is_empty() {
		return Err(Error::validation("file", "file can't be empty"));
	}

	let blob = app.pds.upload_blob(&ctx.session, data, &mime_type).await?;
	let draft = MediaDraft { blob, mime_type, description };

	let sf = app.snowflake.next();
	app.cache.set_json(&keys::media(sf), &draft, Some(DRAFT_TTL)).await?;
	debug!(media_id = sf, "stored media draft");

	Ok((StatusCode::OK, Json(attachment_of(&app, sf, &draft))))
}

// GET /api/v1/media/{id} //
//************************//

pub async fn get_media(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
) -> SgResult<Json<MediaAttachment>> {
	ctx.require_scope(Scope::Read)?;
	let sf = parse_snowflake(&id)?;
	let draft: MediaDraft =
		app.cache.get_json(&keys::media(sf)).await?.ok_or(Error::NotFound)?;
	Ok(Json(attachment_of(&app, sf, &draft)))
}

// PUT /api/v1/media/{id} //
//************************//

#[derive(Debug, Deserialize)]
pub struct UpdateMediaParams {
	pub description: Option<String>,
}

pub async fn put_media(
	State(app): State<App>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
	JsonOrForm(params): JsonOrForm<UpdateMediaParams>,
) -> SgResult<Json<MediaAttachment>> {
	ctx.require_scope(Scope::Write)?;
	let sf = parse_snowflake(&id)?;
	let key = keys::media(sf);
	let mut draft: MediaDraft = app.cache.get_json(&key).await?.ok_or(Error::NotFound)?;

	draft.description = params.description.filter(|d| !d.is_empty());
	app.cache.set_json(&key, &draft, Some(DRAFT_TTL)).await?;
	Ok(Json(attachment_of(&app, sf, &draft)))
}

// vim: ts=4
