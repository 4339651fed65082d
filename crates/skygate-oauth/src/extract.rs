//! Request-body extractor accepting JSON or form encoding.
//!
//! Mastodon clients are split between `application/json` and
//! `application/x-www-form-urlencoded` for the OAuth endpoints; both must
//! deserialize into the same parameter structs.

use axum::extract::{Form, FromRequest, Json, Request};
use axum::http::header;
use serde::de::DeserializeOwned;

use skygate_types::prelude::*;

#[derive(Debug)]
pub struct JsonOrForm<T>(pub T);

impl<S, T> FromRequest<S> for JsonOrForm<T>
where
	S: Send + Sync,
	T: DeserializeOwned + 'static,
{
	type Rejection = Error;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		let content_type = req
			.headers()
			.get(header::CONTENT_TYPE)
			.and_then(|v| v.to_str().ok())
			.unwrap_or_default();

		if content_type.starts_with("application/json") {
			let Json(value) = Json::<T>::from_request(req, state)
				.await
				.map_err(|_| Error::validation("body", "malformed JSON body"))?;
			Ok(JsonOrForm(value))
		} else {
			let Form(value) = Form::<T>::from_request(req, state)
				.await
				.map_err(|_| Error::validation("body", "malformed form body"))?;
			Ok(JsonOrForm(value))
		}
	}
}

// vim: ts=4
