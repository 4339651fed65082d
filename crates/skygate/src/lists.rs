//! List endpoints.
//!
//! Bluesky lists are not bridged to Mastodon lists; the endpoints exist so
//! clients that unconditionally fetch them keep working.

use axum::{Json, extract::Path};

use skygate_masto::entities::{Account, List};

use crate::prelude::*;

pub async fn get_lists(Auth(_ctx): Auth) -> Json<Vec<List>> {
	Json(Vec::new())
}

pub async fn get_list(Auth(_ctx): Auth, Path(_id): Path<String>) -> SgResult<Json<List>> {
	Err(Error::NotFound)
}

pub async fn get_list_accounts(
	Auth(_ctx): Auth,
	Path(_id): Path<String>,
) -> Json<Vec<Account>> {
	Json(Vec::new())
}

// vim: ts=4
