//! Authenticated-user context and OAuth scopes shared between the OAuth
//! service, the middleware, and the route handlers.

use serde::{Deserialize, Serialize};

use crate::pds_adapter::PdsSession;
use crate::prelude::*;

/// Recognized OAuth scopes
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
	Read,
	Write,
	Follow,
	Push,
}

impl Scope {
	pub fn as_str(&self) -> &'static str {
		match self {
			Scope::Read => "read",
			Scope::Write => "write",
			Scope::Follow => "follow",
			Scope::Push => "push",
		}
	}
}

impl std::str::FromStr for Scope {
	type Err = Error;

	fn from_str(s: &str) -> SgResult<Self> {
		match s {
			"read" => Ok(Scope::Read),
			"write" => Ok(Scope::Write),
			"follow" => Ok(Scope::Follow),
			"push" => Ok(Scope::Push),
			other => Err(Error::InvalidScope(other.to_string())),
		}
	}
}

/// A granted scope set.
///
/// Parsed from the space-separated OAuth `scope` parameter. An empty or
/// absent string defaults to `read`; any unrecognized token fails the
/// request with `invalid_scope`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Scopes(Box<[Scope]>);

impl Scopes {
	pub fn parse(raw: Option<&str>) -> SgResult<Scopes> {
		let raw = raw.unwrap_or("").trim();
		if raw.is_empty() {
			return Ok(Scopes(Box::new([Scope::Read])));
		}
		let mut scopes = Vec::new();
		for token in raw.split_whitespace() {
			let scope: Scope = token.parse()?;
			if !scopes.contains(&scope) {
				scopes.push(scope);
			}
		}
		Ok(Scopes(scopes.into()))
	}

	pub fn contains(&self, scope: Scope) -> bool {
		self.0.contains(&scope)
	}

	/// Whether every scope in `requested` is covered by this set
	pub fn covers(&self, requested: &Scopes) -> bool {
		requested.0.iter().all(|s| self.contains(*s))
	}

	pub fn to_param(&self) -> String {
		self.0.iter().map(Scope::as_str).collect::<Vec<_>>().join(" ")
	}
}

/// Context attached to a request after bearer-token validation
#[derive(Clone, Debug)]
pub struct AuthCtx {
	pub did: Box<str>,
	pub handle: Box<str>,
	pub session: PdsSession,
	pub scopes: Scopes,
}

impl AuthCtx {
	/// Fail with `forbidden` unless the token carries the scope
	pub fn require_scope(&self, scope: Scope) -> SgResult<()> {
		if self.scopes.contains(scope) { Ok(()) } else { Err(Error::PermissionDenied) }
	}
}


// vim: ts=4
