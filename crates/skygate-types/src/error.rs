//! Error handling subsystem. Implements the gateway error taxonomy.
//!
//! Every failure leaving the gateway is rendered as the Mastodon error body
//! `{"error": "<code>", "error_description": "<message>"}` with the HTTP
//! status the taxonomy assigns. Handlers return `SgResult` and never build
//! error bodies themselves; `IntoResponse` is the single normalization point.

use axum::{Json, http::StatusCode, http::header, response::IntoResponse};
use serde::{Deserialize, Serialize};

use tracing::{error, warn};

pub type SgResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	// Core taxonomy
	NotFound,
	Unauthorized,
	PermissionDenied,
	ValidationFailed { field: Box<str>, message: Box<str> },
	RateLimited { retry_after: u32 },
	UpstreamUnavailable(String),

	// OAuth grant failures
	InvalidGrant(String),
	InvalidClient,
	InvalidScope(String),

	// Internal
	Cache(String),
	Parse,
	Internal(String),
	Io(std::io::Error),
}

impl Error {
	/// Shorthand for a `validation_failed` on a named request field
	pub fn validation(field: &str, message: impl Into<Box<str>>) -> Self {
		Error::ValidationFailed { field: field.into(), message: message.into() }
	}

	/// The wire code for this error, per the OAuth error shape
	pub fn code(&self) -> &'static str {
		match self {
			Error::NotFound => "not_found",
			Error::Unauthorized => "unauthorized",
			Error::PermissionDenied => "forbidden",
			Error::ValidationFailed { .. } => "unprocessable_entity",
			Error::RateLimited { .. } => "rate_limited",
			Error::UpstreamUnavailable(_) => "upstream_unavailable",
			Error::InvalidGrant(_) => "invalid_grant",
			Error::InvalidClient => "invalid_client",
			Error::InvalidScope(_) => "invalid_scope",
			Error::Cache(_) | Error::Parse | Error::Internal(_) | Error::Io(_) => {
				"internal_server_error"
			}
		}
	}

	pub fn status(&self) -> StatusCode {
		match self {
			Error::NotFound => StatusCode::NOT_FOUND,
			Error::Unauthorized => StatusCode::UNAUTHORIZED,
			Error::PermissionDenied => StatusCode::FORBIDDEN,
			Error::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
			Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
			Error::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
			Error::InvalidGrant(_) | Error::InvalidClient | Error::InvalidScope(_) => {
				StatusCode::BAD_REQUEST
			}
			Error::Cache(_) | Error::Parse | Error::Internal(_) | Error::Io(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{:?}", self)
	}
}

impl std::error::Error for Error {}

/// Mastodon-shaped error body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorResponse {
	pub error: Box<str>,
	pub error_description: Box<str>,
}

impl ErrorResponse {
	pub fn new(error: impl Into<Box<str>>, description: impl Into<Box<str>>) -> Self {
		ErrorResponse { error: error.into(), error_description: description.into() }
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		let status = self.status();
		let code = self.code();

		let description = match &self {
			Error::NotFound => "Record not found".to_string(),
			Error::Unauthorized => "The access token is invalid".to_string(),
			Error::PermissionDenied => {
				"This action is outside the authorized scopes".to_string()
			}
			Error::ValidationFailed { message, .. } => message.to_string(),
			Error::RateLimited { .. } => "Too many requests".to_string(),
			Error::UpstreamUnavailable(msg) => format!("Upstream unavailable: {}", msg),
			Error::InvalidGrant(msg) => msg.clone(),
			Error::InvalidClient => {
				"Client authentication failed due to unknown client".to_string()
			}
			Error::InvalidScope(scope) => format!("The requested scope is invalid: {}", scope),
			// Server errors (5xx) - no message exposure
			Error::Cache(_) | Error::Parse | Error::Internal(_) | Error::Io(_) => {
				"Internal server error".to_string()
			}
		};

		if status.is_server_error() {
			error!(status = %status, "request failed: {}", self);
		} else {
			warn!(status = %status, code = code, "request rejected: {}", description);
		}

		let body = Json(ErrorResponse::new(code, description));
		match self {
			Error::RateLimited { retry_after } => {
				(status, [(header::RETRY_AFTER, retry_after.to_string())], body).into_response()
			}
			_ => (status, body).into_response(),
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		warn!("io error: {}", err);
		Self::Io(err)
	}
}

impl From<std::num::ParseIntError> for Error {
	fn from(_err: std::num::ParseIntError) -> Self {
		warn!("parse int error: {}", _err);
		Error::Parse
	}
}

impl From<std::time::SystemTimeError> for Error {
	fn from(_err: std::time::SystemTimeError) -> Self {
		warn!("system time error: {}", _err);
		Error::Internal("system time error".into())
	}
}

impl From<serde_json::Error> for Error {
	fn from(_err: serde_json::Error) -> Self {
		warn!("json error: {}", _err);
		Error::Parse
	}
}

impl From<axum::http::Error> for Error {
	fn from(_err: axum::http::Error) -> Self {
		warn!("http error: {}", _err);
		Error::Internal("http error".into())
	}
}

impl From<axum::http::header::ToStrError> for Error {
	fn from(_err: axum::http::header::ToStrError) -> Self {
		warn!("header to str error: {}", _err);
		Error::Parse
	}
}


// vim: ts=4
