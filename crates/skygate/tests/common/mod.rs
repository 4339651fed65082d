//! Shared test harness: an in-memory PDS world and router setup.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use skygate::routes::init_routes;
use skygate_cache_adapter_memory::CacheAdapterMemory;
use skygate_core::app::{App, AppBuilderOpts, AppState};
use skygate_core::rate_limit::RateLimitConfig;
use skygate_types::error::{Error, SgResult};
use skygate_types::pds_adapter::{
	CreatePost, FeedViewPost, NotificationView, Page, PdsAdapter, PdsSession, PostRecord,
	PostView, PostViewer, ProfileView, StrongRef, ThreadNode, ViewerState,
};
use skygate_types::types::Timestamp;

pub const PASSWORD: &str = "app-password-1234";

pub fn make_jwt(exp: i64) -> String {
	let payload = format!("{{\"exp\":{}}}", exp);
	format!(
		"{}.{}.{}",
		URL_SAFE_NO_PAD.encode(b"{\"alg\":\"none\"}"),
		URL_SAFE_NO_PAD.encode(payload.as_bytes()),
		URL_SAFE_NO_PAD.encode(b"sig")
	)
}

pub fn profile(did: &str, handle: &str) -> ProfileView {
	ProfileView {
		did: did.into(),
		handle: handle.into(),
		display_name: Some(format!("User {}", handle).into()),
		description: Some("test profile".into()),
		avatar: Some("https://cdn.test/avatar.jpg".into()),
		followers_count: Some(5),
		follows_count: Some(7),
		posts_count: Some(9),
		indexed_at: Some("2023-06-15T12:30:00.000Z".into()),
		..Default::default()
	}
}

pub fn post_view(uri: &str, author: &ProfileView, text: &str) -> PostView {
	PostView {
		uri: uri.into(),
		cid: format!("cid-{}", uri.len()).into(),
		author: author.clone(),
		record: PostRecord {
			text: text.into(),
			created_at: Some("2023-06-15T12:30:00.000Z".into()),
			..Default::default()
		},
		embed: None,
		reply_count: Some(0),
		repost_count: Some(0),
		like_count: Some(0),
		indexed_at: Some("2023-06-15T12:30:00.000Z".into()),
		viewer: None,
		labels: Vec::new(),
	}
}

#[derive(Debug, Default)]
pub struct World {
	/// Profiles by DID and by handle (both keys point at the same view)
	pub profiles: HashMap<String, ProfileView>,
	pub posts: HashMap<String, PostView>,
	pub timeline: Vec<FeedViewPost>,
	pub notifications: Vec<NotificationView>,
	/// Like/repost/follow record URIs → subject
	pub like_records: HashMap<String, String>,
	pub repost_records: HashMap<String, String>,
	pub follow_records: HashMap<String, String>,
	pub deleted: Vec<String>,
	pub seen_marked: bool,
	pub record_counter: u64,
}

impl World {
	pub fn add_profile(&mut self, view: ProfileView) {
		self.profiles.insert(view.did.to_string(), view.clone());
		self.profiles.insert(view.handle.to_string(), view);
	}

	pub fn add_post(&mut self, view: PostView) {
		self.posts.insert(view.uri.to_string(), view.clone());
		self.timeline.push(FeedViewPost { post: view, reason: None });
	}
}

/// In-memory PDS double implementing the full adapter surface
#[derive(Debug, Default)]
pub struct StubPds {
	pub world: Mutex<World>,
}

impl StubPds {
	fn next_uri(&self, did: &str, collection: &str) -> String {
		let mut world = self.world.lock();
		world.record_counter += 1;
		format!("at://{}/{}/rec{}", did, collection, world.record_counter)
	}
}

#[async_trait]
impl PdsAdapter for StubPds {
	async fn create_session(&self, identifier: &str, password: &str) -> SgResult<PdsSession> {
		if password != PASSWORD {
			return Err(Error::Unauthorized);
		}
		let label = identifier.split('.').next().unwrap_or(identifier);
		Ok(PdsSession {
			access_jwt: make_jwt(Timestamp::now().0 + 3600).into(),
			refresh_jwt: make_jwt(Timestamp::now().0 + 86400).into(),
			did: format!("did:plc:{}", label).into(),
			handle: identifier.into(),
			email: None,
		})
	}

	async fn refresh_session(&self, session: &PdsSession) -> SgResult<PdsSession> {
		let mut fresh = session.clone();
		fresh.access_jwt = make_jwt(Timestamp::now().0 + 3600).into();
		Ok(fresh)
	}

	async fn get_profile(&self, _session: &PdsSession, actor: &str) -> SgResult<ProfileView> {
		self.world.lock().profiles.get(actor).cloned().ok_or(Error::NotFound)
	}

	async fn search_actors(
		&self,
		_session: &PdsSession,
		query: &str,
		limit: u32,
		_cursor: Option<&str>,
	) -> SgResult<Page<ProfileView>> {
		let world = self.world.lock();
		let mut seen = std::collections::HashSet::new();
		let items = world
			.profiles
			.values()
			.filter(|p| p.handle.contains(query) && seen.insert(p.did.clone()))
			.take(limit as usize)
			.cloned()
			.collect();
		Ok(Page { items, cursor: None })
	}

	async fn get_followers(
		&self,
		_session: &PdsSession,
		_actor: &str,
		_limit: u32,
		_cursor: Option<&str>,
	) -> SgResult<Page<ProfileView>> {
		Ok(Page::empty())
	}

	async fn get_follows(
		&self,
		_session: &PdsSession,
		_actor: &str,
		_limit: u32,
		_cursor: Option<&str>,
	) -> SgResult<Page<ProfileView>> {
		Ok(Page::empty())
	}

	async fn get_timeline(
		&self,
		_session: &PdsSession,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<FeedViewPost>> {
		let world = self.world.lock();
		let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
		let items: Vec<FeedViewPost> =
			world.timeline.iter().skip(start).take(limit as usize).cloned().collect();
		let consumed = start + items.len();
		let cursor =
			(consumed < world.timeline.len()).then(|| consumed.to_string().into());
		Ok(Page { items, cursor })
	}

	async fn get_author_feed(
		&self,
		_session: &PdsSession,
		actor: &str,
		limit: u32,
		_cursor: Option<&str>,
		_filter: Option<&str>,
	) -> SgResult<Page<FeedViewPost>> {
		let world = self.world.lock();
		let items = world
			.timeline
			.iter()
			.filter(|item| &*item.post.author.did == actor || &*item.post.author.handle == actor)
			.take(limit as usize)
			.cloned()
			.collect();
		Ok(Page { items, cursor: None })
	}

	async fn get_feed(
		&self,
		session: &PdsSession,
		_feed_uri: &str,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<FeedViewPost>> {
		self.get_timeline(session, limit, cursor).await
	}

	async fn get_post_thread(
		&self,
		_session: &PdsSession,
		uri: &str,
		_depth: u32,
	) -> SgResult<ThreadNode> {
		let world = self.world.lock();
		let post = world.posts.get(uri).cloned().ok_or(Error::NotFound)?;

		let parent = post.record.reply.as_ref().and_then(|reply| {
			world.posts.get(&*reply.parent.uri).map(|p| {
				Box::new(ThreadNode::Post { post: p.clone(), parent: None, replies: None })
			})
		});
		let replies: Vec<ThreadNode> = world
			.posts
			.values()
			.filter(|p| {
				p.record.reply.as_ref().is_some_and(|r| &*r.parent.uri == uri)
			})
			.map(|p| ThreadNode::Post { post: p.clone(), parent: None, replies: None })
			.collect();

		Ok(ThreadNode::Post {
			post,
			parent,
			replies: if replies.is_empty() { None } else { Some(replies) },
		})
	}

	async fn get_posts(&self, _session: &PdsSession, uris: &[&str]) -> SgResult<Vec<PostView>> {
		let world = self.world.lock();
		Ok(uris.iter().filter_map(|uri| world.posts.get(*uri).cloned()).collect())
	}

	async fn get_liked_by(
		&self,
		_session: &PdsSession,
		_uri: &str,
		_limit: u32,
		_cursor: Option<&str>,
	) -> SgResult<Page<ProfileView>> {
		Ok(Page::empty())
	}

	async fn get_reposted_by(
		&self,
		_session: &PdsSession,
		_uri: &str,
		_limit: u32,
		_cursor: Option<&str>,
	) -> SgResult<Page<ProfileView>> {
		Ok(Page::empty())
	}

	async fn search_posts(
		&self,
		_session: &PdsSession,
		query: &str,
		limit: u32,
		_cursor: Option<&str>,
	) -> SgResult<Page<PostView>> {
		let needle = query.trim_start_matches('#');
		let world = self.world.lock();
		let items = world
			.posts
			.values()
			.filter(|p| p.record.text.contains(needle))
			.take(limit as usize)
			.cloned()
			.collect();
		Ok(Page { items, cursor: None })
	}

	async fn create_post(
		&self,
		session: &PdsSession,
		post: &CreatePost<'_>,
	) -> SgResult<StrongRef> {
		let uri = self.next_uri(&session.did, "app.bsky.feed.post");
		let author = self
			.world
			.lock()
			.profiles
			.get(&*session.did)
			.cloned()
			.unwrap_or_else(|| profile(&session.did, &session.handle));

		let mut view = post_view(&uri, &author, post.text);
		view.record.reply = post.reply.clone();
		view.record.facets = post.facets.clone();
		self.world.lock().add_post(view);
		Ok(StrongRef { uri: uri.into(), cid: "cid-new".into() })
	}

	async fn delete_record(&self, _session: &PdsSession, uri: &str) -> SgResult<()> {
		let mut world = self.world.lock();
		world.posts.remove(uri);
		world.timeline.retain(|item| &*item.post.uri != uri);
		world.deleted.push(uri.to_string());
		Ok(())
	}

	async fn like_post(&self, session: &PdsSession, subject: &StrongRef) -> SgResult<Box<str>> {
		let uri = self.next_uri(&session.did, "app.bsky.feed.like");
		let mut world = self.world.lock();
		world.like_records.insert(uri.clone(), subject.uri.to_string());
		if let Some(post) = world.posts.get_mut(&*subject.uri) {
			post.like_count = Some(post.like_count.unwrap_or(0) + 1);
			post.viewer =
				Some(PostViewer { like: Some(uri.clone().into()), repost: None });
		}
		Ok(uri.into())
	}

	async fn unlike(&self, _session: &PdsSession, like_record_uri: &str) -> SgResult<()> {
		let mut world = self.world.lock();
		let subject = world
			.like_records
			.remove(like_record_uri)
			.ok_or(Error::NotFound)?;
		if let Some(post) = world.posts.get_mut(&subject) {
			post.like_count = post.like_count.map(|c| c.saturating_sub(1));
			post.viewer = None;
		}
		Ok(())
	}

	async fn repost(&self, session: &PdsSession, subject: &StrongRef) -> SgResult<Box<str>> {
		let uri = self.next_uri(&session.did, "app.bsky.feed.repost");
		self.world.lock().repost_records.insert(uri.clone(), subject.uri.to_string());
		Ok(uri.into())
	}

	async fn unrepost(&self, _session: &PdsSession, repost_record_uri: &str) -> SgResult<()> {
		self.world
			.lock()
			.repost_records
			.remove(repost_record_uri)
			.map(|_| ())
			.ok_or(Error::NotFound)
	}

	async fn follow(&self, session: &PdsSession, did: &str) -> SgResult<Box<str>> {
		let uri = self.next_uri(&session.did, "app.bsky.graph.follow");
		let mut world = self.world.lock();
		world.follow_records.insert(uri.clone(), did.to_string());
		let handle = world.profiles.get(did).map(|p| p.handle.to_string());
		for key in [Some(did.to_string()), handle].into_iter().flatten() {
			if let Some(profile) = world.profiles.get_mut(&key) {
				profile.viewer = Some(ViewerState {
					following: Some(uri.clone().into()),
					..Default::default()
				});
			}
		}
		Ok(uri.into())
	}

	async fn unfollow(&self, _session: &PdsSession, follow_record_uri: &str) -> SgResult<()> {
		let mut world = self.world.lock();
		let did = world
			.follow_records
			.remove(follow_record_uri)
			.ok_or(Error::NotFound)?;
		let handle = world.profiles.get(&did).map(|p| p.handle.to_string());
		for key in [Some(did), handle].into_iter().flatten() {
			if let Some(profile) = world.profiles.get_mut(&key) {
				profile.viewer = None;
			}
		}
		Ok(())
	}

	async fn upload_blob(
		&self,
		_session: &PdsSession,
		bytes: Vec<u8>,
		mime_type: &str,
	) -> SgResult<serde_json::Value> {
		Ok(serde_json::json!({
			"$type": "blob",
			"ref": { "$link": format!("bafkrei{}", bytes.len()) },
			"mimeType": mime_type,
			"size": bytes.len(),
		}))
	}

	async fn list_notifications(
		&self,
		_session: &PdsSession,
		limit: u32,
		_cursor: Option<&str>,
		_reasons: Option<&[&str]>,
	) -> SgResult<Page<NotificationView>> {
		let world = self.world.lock();
		let items = world.notifications.iter().take(limit as usize).cloned().collect();
		Ok(Page { items, cursor: None })
	}

	async fn mark_seen(&self, _session: &PdsSession) -> SgResult<()> {
		self.world.lock().seen_marked = true;
		Ok(())
	}

	async fn unread_count(&self, _session: &PdsSession) -> SgResult<u64> {
		Ok(self.world.lock().notifications.len() as u64)
	}
}

// Harness //
//*********//

pub struct Harness {
	pub router: Router,
	pub app: App,
	pub pds: Arc<StubPds>,
}

pub fn setup() -> Harness {
	let pds = Arc::new(StubPds::default());
	{
		let mut world = pds.world.lock();
		world.add_profile(profile("did:plc:alice", "alice.test"));
		world.add_profile(profile("did:plc:bob", "bob.test"));
	}

	let cache = Arc::new(CacheAdapterMemory::new());
	let opts = AppBuilderOpts {
		listen: "127.0.0.1:0".into(),
		domain: "gw.test".into(),
		pds_url: "https://pds.test".into(),
		worker_id: 1,
		rate_limit: RateLimitConfig {
			anon_capacity: 10_000,
			auth_capacity: 10_000,
			window: Duration::from_secs(300),
		},
		enable_metrics: true,
		enable_tracing: true,
	};

	let app = AppState::new(opts, cache, pds.clone()).expect("app state");
	Harness { router: init_routes(app.clone()), app, pds }
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
	router.clone().oneshot(request).await.expect("infallible")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
	let bytes = response.into_body().collect().await.expect("body").to_bytes();
	serde_json::from_slice(&bytes).expect("json body")
}

pub fn get(path: &str, token: Option<&str>) -> Request<Body> {
	let mut builder = Request::builder().method("GET").uri(path);
	if let Some(token) = token {
		builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
	}
	builder.body(Body::empty()).expect("request")
}

pub fn post_json(path: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
	let mut builder = Request::builder()
		.method("POST")
		.uri(path)
		.header(header::CONTENT_TYPE, "application/json");
	if let Some(token) = token {
		builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
	}
	builder.body(Body::from(body.to_string())).expect("request")
}

pub fn post_form(path: &str, token: Option<&str>, fields: &[(&str, &str)]) -> Request<Body> {
	let body = serde_urlencoded::to_string(fields).expect("form body");
	let mut builder = Request::builder()
		.method("POST")
		.uri(path)
		.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
	if let Some(token) = token {
		builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
	}
	builder.body(Body::from(body)).expect("request")
}

/// Register an app and run the full authorization-code flow for `identifier`
pub async fn obtain_token(harness: &Harness, identifier: &str) -> String {
	let response = send(
		&harness.router,
		post_json(
			"/api/v1/apps",
			None,
			serde_json::json!({
				"client_name": "Test Client",
				"redirect_uris": "https://client.test/callback",
				"scopes": "read write follow push",
			}),
		),
	)
	.await;
	assert_eq!(response.status(), StatusCode::OK);
	let app_json = body_json(response).await;
	let client_id = app_json["client_id"].as_str().expect("client_id").to_string();
	let client_secret = app_json["client_secret"].as_str().expect("client_secret").to_string();

	let response = send(
		&harness.router,
		post_form(
			"/oauth/authorize",
			None,
			&[
				("client_id", client_id.as_str()),
				("redirect_uri", "https://client.test/callback"),
				("scope", "read write follow"),
				("state", "xyz"),
				("identifier", identifier),
				("password", PASSWORD),
			],
		),
	)
	.await;
	assert_eq!(response.status(), StatusCode::SEE_OTHER);
	let location = response
		.headers()
		.get(header::LOCATION)
		.expect("redirect location")
		.to_str()
		.expect("location str")
		.to_string();
	let code = location
		.split("code=")
		.nth(1)
		.expect("code param")
		.split('&')
		.next()
		.expect("code value")
		.to_string();

	let response = send(
		&harness.router,
		post_json(
			"/oauth/token",
			None,
			serde_json::json!({
				"grant_type": "authorization_code",
				"client_id": client_id,
				"client_secret": client_secret,
				"redirect_uri": "https://client.test/callback",
				"code": code,
			}),
		),
	)
	.await;
	assert_eq!(response.status(), StatusCode::OK);
	let token_json = body_json(response).await;
	token_json["access_token"].as_str().expect("access_token").to_string()
}

/// The snowflake id the gateway assigns to an AT URI, primed via the mapper
pub async fn status_id_of(harness: &Harness, uri: &str) -> String {
	harness.app.ids.snowflake_for_at_uri(uri).await.expect("snowflake").to_string()
}

/// The snowflake id the gateway assigns to a DID
pub async fn account_id_of(harness: &Harness, did: &str) -> String {
	harness.app.ids.snowflake_for_did(did).await.expect("snowflake").to_string()
}
