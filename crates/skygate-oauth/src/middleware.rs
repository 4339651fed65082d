//! Bearer-token authentication middleware

use axum::{
	body::Body,
	extract::State,
	http::{Request, header, response::Response},
	middleware::Next,
};

use skygate_core::extract::Auth;
use skygate_core::prelude::*;

use crate::service::OAuthService;

fn bearer_token(req: &Request<Body>) -> SgResult<&str> {
	let auth_header = req
		.headers()
		.get(header::AUTHORIZATION)
		.and_then(|h| h.to_str().ok())
		.ok_or(Error::Unauthorized)?;

	auth_header.strip_prefix("Bearer ").map(str::trim).ok_or(Error::Unauthorized)
}

/// Validate the bearer token and attach the user context; 401 without one
pub async fn require_auth(
	State(app): State<App>,
	mut req: Request<Body>,
	next: Next,
) -> SgResult<Response<Body>> {
	let token = bearer_token(&req)?;
	let ctx = OAuthService::from_app(&app).validate(token).await?;

	req.extensions_mut().insert(Auth(ctx));
	Ok(next.run(req).await)
}

// vim: ts=4
