//! OAuth HTTP handlers: app registration, the authorize form, token
//! exchange, and revocation.

use axum::{
	Json,
	extract::{Query, State},
	http::StatusCode,
	response::{Html, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};

use skygate_core::id_map::hash_snowflake;
use skygate_core::prelude::*;

use crate::extract::JsonOrForm;
use crate::service::OAuthService;

/// Out-of-band redirect URI: show the code instead of redirecting
const OOB_REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";

// POST /api/v1/apps //
//*******************//

#[derive(Debug, Deserialize)]
pub struct RegisterAppParams {
	pub client_name: String,
	pub redirect_uris: String,
	pub scopes: Option<String>,
	pub website: Option<String>,
}

/// Mastodon `Application` entity with client credentials
#[derive(Debug, Serialize)]
pub struct AppCredentials {
	pub id: String,
	pub name: String,
	pub website: Option<String>,
	pub redirect_uri: String,
	pub client_id: String,
	pub client_secret: String,
	pub vapid_key: String,
}

pub async fn post_apps(
	State(app): State<App>,
	JsonOrForm(params): JsonOrForm<RegisterAppParams>,
) -> SgResult<(StatusCode, Json<AppCredentials>)> {
	let registered = OAuthService::from_app(&app)
		.register_app(
			&params.client_name,
			&params.redirect_uris,
			params.website.as_deref(),
			params.scopes.as_deref(),
		)
		.await?;

	Ok((
		StatusCode::OK,
		Json(AppCredentials {
			id: hash_snowflake(&registered.client_id).to_string(),
			name: registered.name.to_string(),
			website: registered.website.as_deref().map(str::to_string),
			redirect_uri: registered.redirect_uri.to_string(),
			client_id: registered.client_id.to_string(),
			client_secret: registered.client_secret.to_string(),
			vapid_key: String::new(),
		}),
	))
}

// GET /oauth/authorize //
//**********************//

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
	pub client_id: String,
	pub redirect_uri: String,
	pub scope: Option<String>,
	pub state: Option<String>,
	#[allow(dead_code)]
	pub response_type: Option<String>,
}

fn escape_attr(value: &str) -> String {
	value
		.replace('&', "&amp;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
		.replace('"', "&quot;")
}

/// The login form. The gateway cannot use Bluesky's own auth UI, so it
/// collects the handle and an app password and trades them for a session
/// at code-exchange time.
pub async fn get_authorize(
	State(app): State<App>,
	Query(query): Query<AuthorizeQuery>,
) -> SgResult<Html<String>> {
	// Fail early on unknown clients so the form never collects credentials
	// for an unregistered app
	let registered = OAuthService::from_app(&app).get_app(&query.client_id).await?;

	let html = format!(
		r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Sign in with Bluesky</title></head>
<body>
<h1>Sign in to {app_name}</h1>
<p>Use your Bluesky handle and an <strong>app password</strong>
(Settings &rarr; App Passwords), not your account password.</p>
<form method="post" action="/oauth/authorize">
<input type="hidden" name="client_id" value="{client_id}">
<input type="hidden" name="redirect_uri" value="{redirect_uri}">
<input type="hidden" name="scope" value="{scope}">
<input type="hidden" name="state" value="{state}">
<label>Handle <input type="text" name="identifier" placeholder="alice.bsky.social" required></label>
<label>App password <input type="password" name="password" required></label>
<button type="submit">Authorize</button>
</form>
</body>
</html>
"#,
		app_name = escape_attr(&registered.name),
		client_id = escape_attr(&query.client_id),
		redirect_uri = escape_attr(&query.redirect_uri),
		scope = escape_attr(query.scope.as_deref().unwrap_or("read")),
		state = escape_attr(query.state.as_deref().unwrap_or_default()),
	);
	Ok(Html(html))
}

// POST /oauth/authorize //
//***********************//

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
	pub client_id: String,
	pub redirect_uri: String,
	pub scope: Option<String>,
	pub state: Option<String>,
	pub identifier: String,
	pub password: String,
}

pub async fn post_authorize(
	State(app): State<App>,
	JsonOrForm(params): JsonOrForm<AuthorizeParams>,
) -> SgResult<Response> {
	let code = OAuthService::from_app(&app)
		.create_code(
			&params.client_id,
			&params.redirect_uri,
			params.scope.as_deref(),
			&params.identifier,
			&params.password,
		)
		.await?;

	if params.redirect_uri == OOB_REDIRECT {
		let html = format!(
			"<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
			 <title>Authorization code</title></head>\
			 <body><p>Copy this code into the application:</p><code>{}</code></body></html>",
			escape_attr(&code)
		);
		return Ok(Html(html).into_response());
	}

	let separator = if params.redirect_uri.contains('?') { '&' } else { '?' };
	let mut location = format!("{}{}code={}", params.redirect_uri, separator, code);
	if let Some(state) = &params.state {
		if !state.is_empty() {
			// `state` is an arbitrary client-chosen string; percent-encode it
			// so it can't break the query string or the Location header
			let encoded: String =
				url::form_urlencoded::byte_serialize(state.as_bytes()).collect();
			location.push_str("&state=");
			location.push_str(&encoded);
		}
	}
	Ok(Redirect::to(&location).into_response())
}

// POST /oauth/token //
//*******************//

#[derive(Debug, Deserialize)]
pub struct TokenParams {
	pub grant_type: String,
	pub client_id: String,
	pub client_secret: String,
	pub redirect_uri: Option<String>,
	pub code: Option<String>,
	pub scope: Option<String>,
	/// Password grant: Bluesky handle
	pub username: Option<String>,
	pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
	pub access_token: String,
	pub token_type: String,
	pub scope: String,
	pub created_at: i64,
}

pub async fn post_token(
	State(app): State<App>,
	JsonOrForm(params): JsonOrForm<TokenParams>,
) -> SgResult<Json<TokenResponse>> {
	let service = OAuthService::from_app(&app);

	let token = match params.grant_type.as_str() {
		"authorization_code" => {
			let code = params
				.code
				.as_deref()
				.ok_or_else(|| Error::InvalidGrant("missing code".into()))?;
			let redirect_uri = params
				.redirect_uri
				.as_deref()
				.ok_or_else(|| Error::InvalidGrant("missing redirect_uri".into()))?;
			service
				.exchange_code(&params.client_id, &params.client_secret, redirect_uri, code)
				.await?
		}
		"password" => {
			let username = params
				.username
				.as_deref()
				.ok_or_else(|| Error::InvalidGrant("missing username".into()))?;
			let password = params
				.password
				.as_deref()
				.ok_or_else(|| Error::InvalidGrant("missing password".into()))?;
			service
				.password_grant(
					&params.client_id,
					&params.client_secret,
					params.scope.as_deref(),
					username,
					password,
				)
				.await?
		}
		other => {
			return Err(Error::InvalidGrant(format!("unsupported grant type: {}", other)));
		}
	};

	Ok(Json(TokenResponse {
		access_token: token.token.to_string(),
		token_type: "Bearer".into(),
		scope: token.scopes.to_param(),
		created_at: token.created_at.0,
	}))
}

// POST /oauth/revoke //
//********************//

#[derive(Debug, Deserialize)]
pub struct RevokeParams {
	pub token: String,
	#[allow(dead_code)]
	pub client_id: Option<String>,
	#[allow(dead_code)]
	pub client_secret: Option<String>,
}

pub async fn post_revoke(
	State(app): State<App>,
	JsonOrForm(params): JsonOrForm<RevokeParams>,
) -> SgResult<Json<serde_json::Value>> {
	OAuthService::from_app(&app).revoke(&params.token).await?;
	Ok(Json(serde_json::json!({})))
}

// vim: ts=4
