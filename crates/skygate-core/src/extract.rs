//! Custom extractors for skygate-specific request data

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use skygate_types::auth::AuthCtx;

use crate::prelude::*;

// Auth //
//******//
/// Authenticated user context, inserted by the bearer-auth middleware
#[derive(Clone, Debug)]
pub struct Auth(pub AuthCtx);

impl<S> FromRequestParts<S> for Auth
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		if let Some(auth) = parts.extensions.get::<Auth>().cloned() {
			Ok(auth)
		} else {
			Err(Error::Unauthorized)
		}
	}
}

// vim: ts=4
