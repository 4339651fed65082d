//! The OAuth service: application registry, authorization codes, and
//! opaque bearer tokens bound to upstream sessions.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::sync::Arc;
use std::time::Duration;

use skygate_core::app::App;
use skygate_types::auth::{AuthCtx, Scopes};
use skygate_types::cache_adapter::{CacheAdapter, CacheExt, keys};
use skygate_types::pds_adapter::{PdsAdapter, PdsSession};
use skygate_types::prelude::*;
use skygate_types::utils::{CLIENT_ID_LENGTH, jwt_expires_within, random_id, random_token};

/// Authorization codes are single-use and expire after ten minutes
const CODE_TTL: Duration = Duration::from_secs(600);

/// Bearer token lifetime in seconds (the upstream refresh token outlives
/// this; expiry here forces a clean re-login rather than a broken session)
pub const TOKEN_EXPIRES_IN: i64 = 60 * 60 * 24 * 30;

/// Refresh the upstream session when its access JWT is within this many
/// seconds of expiry
const ACCESS_JWT_LEEWAY: i64 = 60;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OAuthApp {
	pub client_id: Box<str>,
	pub client_secret: Box<str>,
	pub name: Box<str>,
	pub redirect_uri: Box<str>,
	pub website: Option<Box<str>>,
	pub scopes: Scopes,
	pub created_at: Timestamp,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AuthorizationCode {
	pub code: Box<str>,
	pub client_id: Box<str>,
	pub redirect_uri: Box<str>,
	pub scopes: Scopes,
	/// Bluesky handle (or email) captured by the authorize form
	pub identifier: Box<str>,
	/// App password captured by the authorize form; consumed at exchange
	pub password: Box<str>,
	pub created_at: Timestamp,
}

#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OAuthToken {
	pub token: Box<str>,
	pub client_id: Box<str>,
	pub did: Box<str>,
	pub handle: Box<str>,
	pub session: PdsSession,
	pub scopes: Scopes,
	pub created_at: Timestamp,
	pub expires_in: i64,
}

impl OAuthToken {
	pub fn is_expired(&self, now: Timestamp) -> bool {
		now.0 > self.created_at.0 + self.expires_in
	}
}

#[derive(Clone, Debug)]
pub struct OAuthService {
	cache: Arc<dyn CacheAdapter>,
	pds: Arc<dyn PdsAdapter>,
}

impl OAuthService {
	pub fn new(cache: Arc<dyn CacheAdapter>, pds: Arc<dyn PdsAdapter>) -> Self {
		OAuthService { cache, pds }
	}

	pub fn from_app(app: &App) -> Self {
		OAuthService::new(app.cache.clone(), app.pds.clone())
	}

	// Applications //
	//**************//

	pub async fn register_app(
		&self,
		name: &str,
		redirect_uri: &str,
		website: Option<&str>,
		scope: Option<&str>,
	) -> SgResult<OAuthApp> {
		if name.trim().is_empty() {
			return Err(Error::validation("client_name", "can't be blank"));
		}
		if redirect_uri.trim().is_empty() {
			return Err(Error::validation("redirect_uris", "can't be blank"));
		}
		let scopes = Scopes::parse(scope)?;

		let app = OAuthApp {
			client_id: random_id(CLIENT_ID_LENGTH).into(),
			client_secret: random_token().into(),
			name: name.into(),
			redirect_uri: redirect_uri.into(),
			website: website.map(Into::into),
			scopes,
			created_at: Timestamp::now(),
		};
		self.cache.set_json(&keys::oauth_app(&app.client_id), &app, None).await?;
		info!(client_id = %app.client_id, name = %app.name, "registered OAuth application");
		Ok(app)
	}

	pub async fn get_app(&self, client_id: &str) -> SgResult<OAuthApp> {
		self.cache.get_json(&keys::oauth_app(client_id)).await?.ok_or(Error::InvalidClient)
	}

	// Authorization codes //
	//*********************//

	/// Validate the app and mint a single-use authorization code carrying
	/// the user's upstream credentials until the exchange
	pub async fn create_code(
		&self,
		client_id: &str,
		redirect_uri: &str,
		scope: Option<&str>,
		identifier: &str,
		password: &str,
	) -> SgResult<Box<str>> {
		let app = self.get_app(client_id).await?;
		if &*app.redirect_uri != redirect_uri {
			return Err(Error::InvalidGrant("redirect URI does not match".into()));
		}
		let scopes = Scopes::parse(scope)?;
		if !app.scopes.covers(&scopes) {
			return Err(Error::InvalidScope(scopes.to_param()));
		}
		if identifier.trim().is_empty() || password.is_empty() {
			return Err(Error::InvalidGrant("missing credentials".into()));
		}

		let code = AuthorizationCode {
			code: random_token().into(),
			client_id: app.client_id.clone(),
			redirect_uri: redirect_uri.into(),
			scopes,
			identifier: identifier.into(),
			password: password.into(),
			created_at: Timestamp::now(),
		};
		self.cache.set_json(&keys::oauth_code(&code.code), &code, Some(CODE_TTL)).await?;
		Ok(code.code)
	}

	/// Exchange a code for a bearer token. The code is consumed atomically;
	/// a second exchange of the same code fails with `invalid_grant`.
	pub async fn exchange_code(
		&self,
		client_id: &str,
		client_secret: &str,
		redirect_uri: &str,
		code: &str,
	) -> SgResult<OAuthToken> {
		let Some(stored): Option<AuthorizationCode> =
			self.cache.take_json(&keys::oauth_code(code)).await?
		else {
			return Err(Error::InvalidGrant("authorization code is invalid or expired".into()));
		};

		let app = self.get_app(client_id).await?;
		if stored.client_id != app.client_id
			|| &*app.client_secret != client_secret
			|| &*stored.redirect_uri != redirect_uri
		{
			return Err(Error::InvalidGrant("client credentials do not match the code".into()));
		}

		let session = self.login_upstream(&stored.identifier, &stored.password).await?;
		self.mint_token(&app, stored.scopes, session).await
	}

	// Password grant //
	//****************//

	pub async fn password_grant(
		&self,
		client_id: &str,
		client_secret: &str,
		scope: Option<&str>,
		identifier: &str,
		password: &str,
	) -> SgResult<OAuthToken> {
		let app = self.get_app(client_id).await?;
		if &*app.client_secret != client_secret {
			return Err(Error::InvalidClient);
		}
		let scopes = Scopes::parse(scope)?;
		if !app.scopes.covers(&scopes) {
			return Err(Error::InvalidScope(scopes.to_param()));
		}

		let session = self.login_upstream(identifier, password).await?;
		self.mint_token(&app, scopes, session).await
	}

	async fn login_upstream(&self, identifier: &str, password: &str) -> SgResult<PdsSession> {
		self.pds.create_session(identifier, password).await.map_err(|err| match err {
			// Bad upstream credentials surface as a grant failure, not a 401
			Error::Unauthorized => {
				Error::InvalidGrant("Bluesky rejected the credentials".into())
			}
			other => other,
		})
	}

	async fn mint_token(
		&self,
		app: &OAuthApp,
		scopes: Scopes,
		session: PdsSession,
	) -> SgResult<OAuthToken> {
		let token = OAuthToken {
			token: random_token().into(),
			client_id: app.client_id.clone(),
			did: session.did.clone(),
			handle: session.handle.clone(),
			session,
			scopes,
			created_at: Timestamp::now(),
			expires_in: TOKEN_EXPIRES_IN,
		};
		self.cache.set_json(&keys::oauth_token(&token.token), &token, None).await?;
		info!(client_id = %token.client_id, did = %token.did, "issued bearer token");
		Ok(token)
	}

	// Validation //
	//************//

	/// Validate a bearer token and return the user context, transparently
	/// refreshing the embedded upstream session at most once when its
	/// access JWT is stale. A token whose session can no longer be
	/// refreshed is deleted and rejected.
	pub async fn validate(&self, token: &str) -> SgResult<AuthCtx> {
		let key = keys::oauth_token(token);
		let Some(mut stored): Option<OAuthToken> = self.cache.get_json(&key).await? else {
			return Err(Error::Unauthorized);
		};

		if stored.is_expired(Timestamp::now()) {
			self.cache.delete(&key).await?;
			return Err(Error::Unauthorized);
		}

		if jwt_expires_within(&stored.session.access_jwt, ACCESS_JWT_LEEWAY) {
			match self.pds.refresh_session(&stored.session).await {
				Ok(fresh) => {
					debug!(did = %stored.did, "refreshed upstream session");
					stored.session = fresh;
					// Concurrent refreshes race benignly: session tokens
					// are interchangeable and the last writer wins
					self.cache.set_json(&key, &stored, None).await?;
				}
				Err(err) => {
					warn!(did = %stored.did, "session refresh failed: {}", err);
					self.cache.delete(&key).await?;
					return Err(Error::Unauthorized);
				}
			}
		}

		Ok(AuthCtx {
			did: stored.did,
			handle: stored.handle,
			session: stored.session,
			scopes: stored.scopes,
		})
	}

	/// Revoke a token. Idempotent: revoking an unknown token succeeds.
	pub async fn revoke(&self, token: &str) -> SgResult<()> {
		self.cache.delete(&keys::oauth_token(token)).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use skygate_cache_adapter_memory::CacheAdapterMemory;
	use skygate_types::pds_adapter::{
		CreatePost, FeedViewPost, NotificationView, Page, PostView, ProfileView, StrongRef,
		ThreadNode,
	};
	use std::sync::atomic::{AtomicU32, Ordering};

	fn jwt_with_exp(exp: i64) -> String {
		use std::fmt::Write;
		// Hand-rolled base64url for the payload; header/signature are dummies
		let payload = format!("{{\"exp\":{}}}", exp);
		const ALPHABET: &[u8] =
			b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
		let mut encoded = String::new();
		for chunk in payload.as_bytes().chunks(3) {
			let b = [chunk[0], *chunk.get(1).unwrap_or(&0), *chunk.get(2).unwrap_or(&0)];
			let n = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
			let _ = write!(encoded, "{}", ALPHABET[(n >> 18) as usize & 63] as char);
			let _ = write!(encoded, "{}", ALPHABET[(n >> 12) as usize & 63] as char);
			if chunk.len() > 1 {
				let _ = write!(encoded, "{}", ALPHABET[(n >> 6) as usize & 63] as char);
			}
			if chunk.len() > 2 {
				let _ = write!(encoded, "{}", ALPHABET[n as usize & 63] as char);
			}
		}
		format!("eyJhbGciOiJub25lIn0.{}.c2ln", encoded)
	}

	fn session(handle: &str, exp: i64) -> PdsSession {
		PdsSession {
			access_jwt: jwt_with_exp(exp).into(),
			refresh_jwt: "refresh-jwt".into(),
			did: format!("did:plc:{}", handle).into(),
			handle: format!("{}.bsky.social", handle).into(),
			email: None,
		}
	}

	/// Hand-written PDS test double: sessions only, everything else is an
	/// unexpected call
	#[derive(Debug, Default)]
	struct StubPds {
		refresh_count: AtomicU32,
		fail_login: bool,
		fail_refresh: bool,
		/// Access-JWT expiry offset for created/refreshed sessions
		session_lifetime: i64,
	}

	impl StubPds {
		fn with_lifetime(lifetime: i64) -> Self {
			StubPds { session_lifetime: lifetime, ..Default::default() }
		}
	}

	#[async_trait]
	impl PdsAdapter for StubPds {
		async fn create_session(
			&self,
			identifier: &str,
			password: &str,
		) -> SgResult<PdsSession> {
			if self.fail_login || password.is_empty() {
				return Err(Error::Unauthorized);
			}
			let handle = identifier.split('.').next().unwrap_or(identifier);
			Ok(session(handle, Timestamp::now().0 + self.session_lifetime))
		}

		async fn refresh_session(&self, old: &PdsSession) -> SgResult<PdsSession> {
			self.refresh_count.fetch_add(1, Ordering::SeqCst);
			if self.fail_refresh {
				return Err(Error::Unauthorized);
			}
			let handle = old.handle.split('.').next().unwrap_or("user");
			let mut fresh = session(handle, Timestamp::now().0 + 3600);
			fresh.did = old.did.clone();
			fresh.handle = old.handle.clone();
			Ok(fresh)
		}

		async fn get_profile(&self, _: &PdsSession, _: &str) -> SgResult<ProfileView> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn search_actors(
			&self,
			_: &PdsSession,
			_: &str,
			_: u32,
			_: Option<&str>,
		) -> SgResult<Page<ProfileView>> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn get_followers(
			&self,
			_: &PdsSession,
			_: &str,
			_: u32,
			_: Option<&str>,
		) -> SgResult<Page<ProfileView>> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn get_follows(
			&self,
			_: &PdsSession,
			_: &str,
			_: u32,
			_: Option<&str>,
		) -> SgResult<Page<ProfileView>> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn get_timeline(
			&self,
			_: &PdsSession,
			_: u32,
			_: Option<&str>,
		) -> SgResult<Page<FeedViewPost>> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn get_author_feed(
			&self,
			_: &PdsSession,
			_: &str,
			_: u32,
			_: Option<&str>,
			_: Option<&str>,
		) -> SgResult<Page<FeedViewPost>> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn get_feed(
			&self,
			_: &PdsSession,
			_: &str,
			_: u32,
			_: Option<&str>,
		) -> SgResult<Page<FeedViewPost>> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn get_post_thread(
			&self,
			_: &PdsSession,
			_: &str,
			_: u32,
		) -> SgResult<ThreadNode> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn get_posts(&self, _: &PdsSession, _: &[&str]) -> SgResult<Vec<PostView>> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn get_liked_by(
			&self,
			_: &PdsSession,
			_: &str,
			_: u32,
			_: Option<&str>,
		) -> SgResult<Page<ProfileView>> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn get_reposted_by(
			&self,
			_: &PdsSession,
			_: &str,
			_: u32,
			_: Option<&str>,
		) -> SgResult<Page<ProfileView>> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn search_posts(
			&self,
			_: &PdsSession,
			_: &str,
			_: u32,
			_: Option<&str>,
		) -> SgResult<Page<PostView>> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn create_post(
			&self,
			_: &PdsSession,
			_: &CreatePost<'_>,
		) -> SgResult<StrongRef> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn delete_record(&self, _: &PdsSession, _: &str) -> SgResult<()> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn like_post(&self, _: &PdsSession, _: &StrongRef) -> SgResult<Box<str>> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn unlike(&self, _: &PdsSession, _: &str) -> SgResult<()> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn repost(&self, _: &PdsSession, _: &StrongRef) -> SgResult<Box<str>> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn unrepost(&self, _: &PdsSession, _: &str) -> SgResult<()> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn follow(&self, _: &PdsSession, _: &str) -> SgResult<Box<str>> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn unfollow(&self, _: &PdsSession, _: &str) -> SgResult<()> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn upload_blob(
			&self,
			_: &PdsSession,
			_: Vec<u8>,
			_: &str,
		) -> SgResult<serde_json::Value> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn list_notifications(
			&self,
			_: &PdsSession,
			_: u32,
			_: Option<&str>,
			_: Option<&[&str]>,
		) -> SgResult<Page<NotificationView>> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn mark_seen(&self, _: &PdsSession) -> SgResult<()> {
			Err(Error::Internal("unexpected call".into()))
		}
		async fn unread_count(&self, _: &PdsSession) -> SgResult<u64> {
			Err(Error::Internal("unexpected call".into()))
		}
	}

	fn service_with(pds: StubPds) -> OAuthService {
		OAuthService::new(Arc::new(CacheAdapterMemory::new()), Arc::new(pds))
	}

	fn service() -> OAuthService {
		service_with(StubPds::with_lifetime(3600))
	}

	async fn registered_app(service: &OAuthService) -> OAuthApp {
		service
			.register_app("Test App", "https://app.example/callback", None, Some("read write"))
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn test_register_app_validation() {
		let svc = service();
		assert!(matches!(
			svc.register_app("", "https://cb", None, None).await,
			Err(Error::ValidationFailed { .. })
		));
		assert!(matches!(
			svc.register_app("App", "", None, None).await,
			Err(Error::ValidationFailed { .. })
		));
		assert!(matches!(
			svc.register_app("App", "https://cb", None, Some("bogus")).await,
			Err(Error::InvalidScope(_))
		));
	}

	#[tokio::test]
	async fn test_register_and_fetch_app() {
		let svc = service();
		let app = registered_app(&svc).await;
		assert_eq!(app.client_id.len(), CLIENT_ID_LENGTH);
		assert_eq!(app.client_secret.len(), 43);

		let fetched = svc.get_app(&app.client_id).await.unwrap();
		assert_eq!(fetched.name, app.name);
		assert!(matches!(svc.get_app("nope").await, Err(Error::InvalidClient)));
	}

	#[tokio::test]
	async fn test_code_flow() {
		let svc = service();
		let app = registered_app(&svc).await;

		let code = svc
			.create_code(&app.client_id, &app.redirect_uri, Some("read"), "alice", "pw")
			.await
			.unwrap();

		let token = svc
			.exchange_code(&app.client_id, &app.client_secret, &app.redirect_uri, &code)
			.await
			.unwrap();
		assert_eq!(&*token.did, "did:plc:alice");
		assert_eq!(&*token.handle, "alice.bsky.social");
	}

	#[tokio::test]
	async fn test_code_is_single_use() {
		let svc = service();
		let app = registered_app(&svc).await;
		let code = svc
			.create_code(&app.client_id, &app.redirect_uri, None, "alice", "pw")
			.await
			.unwrap();

		svc.exchange_code(&app.client_id, &app.client_secret, &app.redirect_uri, &code)
			.await
			.unwrap();
		let second = svc
			.exchange_code(&app.client_id, &app.client_secret, &app.redirect_uri, &code)
			.await;
		assert!(matches!(second, Err(Error::InvalidGrant(_))));
	}

	#[tokio::test]
	async fn test_code_requires_matching_client() {
		let svc = service();
		let app = registered_app(&svc).await;
		let code = svc
			.create_code(&app.client_id, &app.redirect_uri, None, "alice", "pw")
			.await
			.unwrap();

		let wrong_secret = svc
			.exchange_code(&app.client_id, "wrong", &app.redirect_uri, &code)
			.await;
		assert!(matches!(wrong_secret, Err(Error::InvalidGrant(_))));
		// And the code was consumed by the failed attempt's take: a code
		// presented with bad credentials is burned
		let retry = svc
			.exchange_code(&app.client_id, &app.client_secret, &app.redirect_uri, &code)
			.await;
		assert!(matches!(retry, Err(Error::InvalidGrant(_))));
	}

	#[tokio::test]
	async fn test_code_rejects_mismatched_redirect() {
		let svc = service();
		let app = registered_app(&svc).await;
		let result = svc
			.create_code(&app.client_id, "https://evil.example/cb", None, "alice", "pw")
			.await;
		assert!(matches!(result, Err(Error::InvalidGrant(_))));
	}

	#[tokio::test]
	async fn test_code_scope_must_be_subset_of_app() {
		let svc = service();
		let app = registered_app(&svc).await; // read write
		let result = svc
			.create_code(&app.client_id, &app.redirect_uri, Some("push"), "alice", "pw")
			.await;
		assert!(matches!(result, Err(Error::InvalidScope(_))));
	}

	#[tokio::test]
	async fn test_password_grant() {
		let svc = service();
		let app = registered_app(&svc).await;

		let token = svc
			.password_grant(&app.client_id, &app.client_secret, Some("read"), "bob", "pw")
			.await
			.unwrap();
		assert_eq!(&*token.did, "did:plc:bob");

		let bad_secret =
			svc.password_grant(&app.client_id, "wrong", None, "bob", "pw").await;
		assert!(matches!(bad_secret, Err(Error::InvalidClient)));
	}

	#[tokio::test]
	async fn test_bad_upstream_credentials_are_invalid_grant() {
		let svc = service();
		let app = registered_app(&svc).await;
		let result = svc
			.password_grant(&app.client_id, &app.client_secret, None, "bob", "")
			.await;
		assert!(matches!(result, Err(Error::InvalidGrant(_))));
	}

	#[tokio::test]
	async fn test_validate_returns_stable_context() {
		let svc = service();
		let app = registered_app(&svc).await;
		let token = svc
			.password_grant(&app.client_id, &app.client_secret, None, "alice", "pw")
			.await
			.unwrap();

		let ctx1 = svc.validate(&token.token).await.unwrap();
		let ctx2 = svc.validate(&token.token).await.unwrap();
		assert_eq!(ctx1.did, ctx2.did);
		assert_eq!(&*ctx1.did, "did:plc:alice");
	}

	#[tokio::test]
	async fn test_validate_unknown_token() {
		let svc = service();
		assert!(matches!(svc.validate("no-such-token").await, Err(Error::Unauthorized)));
	}

	#[tokio::test]
	async fn test_per_user_isolation() {
		let svc = service();
		let app = registered_app(&svc).await;

		let alice = svc
			.password_grant(&app.client_id, &app.client_secret, None, "alice", "pw")
			.await
			.unwrap();
		let bob = svc
			.password_grant(&app.client_id, &app.client_secret, None, "bob", "pw")
			.await
			.unwrap();

		let alice_ctx = svc.validate(&alice.token).await.unwrap();
		let bob_ctx = svc.validate(&bob.token).await.unwrap();
		assert_eq!(&*alice_ctx.did, "did:plc:alice");
		assert_eq!(&*bob_ctx.did, "did:plc:bob");
		assert_ne!(alice_ctx.session.access_jwt, bob_ctx.session.access_jwt);

		// Revoking alice leaves bob intact
		svc.revoke(&alice.token).await.unwrap();
		assert!(matches!(svc.validate(&alice.token).await, Err(Error::Unauthorized)));
		assert!(svc.validate(&bob.token).await.is_ok());
	}

	#[tokio::test]
	async fn test_transparent_refresh() {
		// Sessions are born with an already-stale access JWT
		let svc = service_with(StubPds::with_lifetime(-10));
		let app = registered_app(&svc).await;
		let token = svc
			.password_grant(&app.client_id, &app.client_secret, None, "alice", "pw")
			.await
			.unwrap();
		assert!(jwt_expires_within(&token.session.access_jwt, ACCESS_JWT_LEEWAY));

		let ctx = svc.validate(&token.token).await.unwrap();
		assert_eq!(&*ctx.did, "did:plc:alice");
		// The stored token was rewritten with the fresh session
		assert!(!jwt_expires_within(&ctx.session.access_jwt, ACCESS_JWT_LEEWAY));
		let ctx2 = svc.validate(&token.token).await.unwrap();
		assert!(!jwt_expires_within(&ctx2.session.access_jwt, ACCESS_JWT_LEEWAY));
	}

	#[tokio::test]
	async fn test_refresh_happens_once_per_validation() {
		let pds = Arc::new(StubPds::with_lifetime(-10));
		let svc = OAuthService::new(Arc::new(CacheAdapterMemory::new()), pds.clone());
		let app = registered_app(&svc).await;
		let token = svc
			.password_grant(&app.client_id, &app.client_secret, None, "alice", "pw")
			.await
			.unwrap();

		svc.validate(&token.token).await.unwrap();
		assert_eq!(pds.refresh_count.load(Ordering::SeqCst), 1);

		// The refreshed session is fresh for an hour, so a second
		// validation does not refresh again
		let ctx = svc.validate(&token.token).await.unwrap();
		assert_eq!(&*ctx.did, "did:plc:alice");
		assert_eq!(pds.refresh_count.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_failed_refresh_deletes_token() {
		let pds = StubPds { session_lifetime: -10, fail_refresh: true, ..Default::default() };
		let svc = service_with(pds);
		let app = registered_app(&svc).await;
		let token = svc
			.password_grant(&app.client_id, &app.client_secret, None, "alice", "pw")
			.await
			.unwrap();

		assert!(matches!(svc.validate(&token.token).await, Err(Error::Unauthorized)));
		// Token is gone, not merely failing
		assert!(matches!(svc.validate(&token.token).await, Err(Error::Unauthorized)));
	}

	#[tokio::test]
	async fn test_revoke_is_idempotent() {
		let svc = service();
		svc.revoke("never-existed").await.unwrap();
	}

	#[tokio::test]
	async fn test_token_expiry() {
		let token = OAuthToken {
			token: "t".into(),
			client_id: "c".into(),
			did: "did:plc:x".into(),
			handle: "x.bsky.social".into(),
			session: session("x", 3600),
			scopes: Scopes::default(),
			created_at: Timestamp(1000),
			expires_in: 100,
		};
		assert!(!token.is_expired(Timestamp(1100)));
		assert!(token.is_expired(Timestamp(1101)));
	}
}

// vim: ts=4
