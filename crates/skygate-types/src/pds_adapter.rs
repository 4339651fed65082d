//! Adapter for the upstream AT Protocol Personal Data Server.
//!
//! Every operation that touches Bluesky goes through this trait. Calls are
//! parameterized by an explicit [`PdsSession`] value owned by the handling
//! request; the adapter keeps no per-user state, so two parallel clients
//! for the same user are safe (upstream session tokens are interchangeable).
//!
//! Wire types mirror the `app.bsky.*` / `com.atproto.*` lexicons closely
//! enough to deserialize real PDS responses; unknown unions degrade to an
//! `Unknown` variant instead of failing a whole page.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt::Debug;

use crate::prelude::*;

/// An authenticated upstream session.
///
/// The JWT pair round-trips unchanged through the cache inside the OAuth
/// token that owns it; the gateway only peeks at `access_jwt` expiry to
/// decide when to refresh.
#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdsSession {
	pub access_jwt: Box<str>,
	pub refresh_jwt: Box<str>,
	pub did: Box<str>,
	pub handle: Box<str>,
	pub email: Option<Box<str>>,
}

/// A page of results with the upstream continuation cursor
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Page<T> {
	pub items: Vec<T>,
	pub cursor: Option<Box<str>>,
}

impl<T> Page<T> {
	pub fn empty() -> Self {
		Page { items: Vec::new(), cursor: None }
	}
}

// Actor types //
//*************//

#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
	pub did: Box<str>,
	pub handle: Box<str>,
	pub display_name: Option<Box<str>>,
	pub description: Option<Box<str>>,
	pub avatar: Option<Box<str>>,
	pub banner: Option<Box<str>>,
	pub followers_count: Option<u64>,
	pub follows_count: Option<u64>,
	pub posts_count: Option<u64>,
	pub indexed_at: Option<Box<str>>,
	pub viewer: Option<ViewerState>,
	#[serde(default)]
	pub labels: Vec<Label>,
}

/// Relationship of the requesting user to a profile.
///
/// `following` / `followed_by` carry the AT URIs of the follow records,
/// which double as the handles needed to undo the follow.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerState {
	pub muted: Option<bool>,
	pub blocked_by: Option<bool>,
	pub blocking: Option<Box<str>>,
	pub following: Option<Box<str>>,
	pub followed_by: Option<Box<str>>,
}

#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
	pub src: Option<Box<str>>,
	pub val: Box<str>,
}

// Rich text //
//***********//

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Facet {
	pub index: ByteSlice,
	pub features: Vec<FacetFeature>,
}

/// Byte offsets into the UTF-8 encoding of the post text
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
	pub byte_start: usize,
	pub byte_end: usize,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "$type")]
pub enum FacetFeature {
	#[serde(rename = "app.bsky.richtext.facet#link")]
	Link { uri: Box<str> },
	#[serde(rename = "app.bsky.richtext.facet#mention")]
	Mention { did: Box<str> },
	#[serde(rename = "app.bsky.richtext.facet#tag")]
	Tag { tag: Box<str> },
	#[serde(other)]
	Unknown,
}

// Post types //
//************//

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrongRef {
	pub uri: Box<str>,
	pub cid: Box<str>,
}

#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRef {
	pub root: StrongRef,
	pub parent: StrongRef,
}

#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
	#[serde(default)]
	pub text: String,
	pub created_at: Option<Box<str>>,
	pub reply: Option<ReplyRef>,
	pub facets: Option<Vec<Facet>>,
}

#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
	pub thumb: Option<Box<str>>,
	pub fullsize: Option<Box<str>>,
	#[serde(default)]
	pub alt: Box<str>,
}

#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalView {
	pub uri: Box<str>,
	#[serde(default)]
	pub title: Box<str>,
	#[serde(default)]
	pub description: Box<str>,
	pub thumb: Option<Box<str>>,
}

/// An embedded (quoted) record as hydrated in a view
#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedRecord {
	pub uri: Box<str>,
	pub cid: Option<Box<str>>,
	pub author: Option<ProfileView>,
	pub value: Option<PostRecord>,
	pub indexed_at: Option<Box<str>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "$type")]
pub enum EmbedView {
	#[serde(rename = "app.bsky.embed.images#view")]
	Images { images: Vec<ImageView> },
	#[serde(rename = "app.bsky.embed.external#view")]
	External { external: ExternalView },
	#[serde(rename = "app.bsky.embed.record#view")]
	Record { record: serde_json::Value },
	#[serde(other)]
	Unknown,
}

impl EmbedView {
	/// The quoted record of a record embed, if it hydrated to a plain view.
	///
	/// The record union also carries notFound/blocked markers; those decode
	/// to `None` here and the translator drops the quote.
	pub fn quoted(&self) -> Option<EmbeddedRecord> {
		match self {
			EmbedView::Record { record } => {
				serde_json::from_value::<EmbeddedRecord>(record.clone()).ok()
			}
			_ => None,
		}
	}
}

#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostViewer {
	pub like: Option<Box<str>>,
	pub repost: Option<Box<str>>,
}

#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
	pub uri: Box<str>,
	pub cid: Box<str>,
	pub author: ProfileView,
	pub record: PostRecord,
	pub embed: Option<EmbedView>,
	pub reply_count: Option<u64>,
	pub repost_count: Option<u64>,
	pub like_count: Option<u64>,
	pub indexed_at: Option<Box<str>>,
	pub viewer: Option<PostViewer>,
	#[serde(default)]
	pub labels: Vec<Label>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "$type")]
pub enum FeedReason {
	#[serde(rename = "app.bsky.feed.defs#reasonRepost")]
	Repost {
		by: ProfileView,
		#[serde(rename = "indexedAt")]
		indexed_at: Option<Box<str>>,
	},
	#[serde(other)]
	Unknown,
}

#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedViewPost {
	pub post: PostView,
	pub reason: Option<FeedReason>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "$type")]
pub enum ThreadNode {
	#[serde(rename = "app.bsky.feed.defs#threadViewPost")]
	Post {
		post: PostView,
		parent: Option<Box<ThreadNode>>,
		replies: Option<Vec<ThreadNode>>,
	},
	#[serde(rename = "app.bsky.feed.defs#notFoundPost")]
	NotFound { uri: Box<str> },
	#[serde(rename = "app.bsky.feed.defs#blockedPost")]
	Blocked { uri: Box<str> },
	#[serde(other)]
	Unknown,
}

// Notifications //
//***************//

#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
	pub uri: Box<str>,
	pub cid: Box<str>,
	pub author: ProfileView,
	/// `like`, `repost`, `follow`, `mention`, `reply`, `quote`, ...
	pub reason: Box<str>,
	pub reason_subject: Option<Box<str>>,
	#[serde(default)]
	pub record: serde_json::Value,
	#[serde(default)]
	pub is_read: bool,
	pub indexed_at: Box<str>,
}

// Write inputs //
//**************//

/// Input for `create_post`. The embed is the raw record-side embed object
/// (`app.bsky.embed.images`, ...) built by the caller.
#[derive(Debug, Default)]
pub struct CreatePost<'a> {
	pub text: &'a str,
	pub reply: Option<ReplyRef>,
	pub facets: Option<Vec<Facet>>,
	pub embed: Option<serde_json::Value>,
}

/// A skygate PDS adapter.
///
/// Error mapping contract: upstream 401 → `Error::Unauthorized`, 400 with
/// a not-found-shaped body or 404 → `Error::NotFound`, 429 →
/// `Error::RateLimited`, connect failures / timeouts / 5xx →
/// `Error::UpstreamUnavailable`, anything else → `Error::Internal`.
#[async_trait]
pub trait PdsAdapter: Debug + Send + Sync {
	// Sessions
	async fn create_session(&self, identifier: &str, password: &str) -> SgResult<PdsSession>;
	async fn refresh_session(&self, session: &PdsSession) -> SgResult<PdsSession>;

	// Actors
	/// `actor` is a handle or a DID
	async fn get_profile(&self, session: &PdsSession, actor: &str) -> SgResult<ProfileView>;
	async fn search_actors(
		&self,
		session: &PdsSession,
		query: &str,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<ProfileView>>;
	async fn get_followers(
		&self,
		session: &PdsSession,
		actor: &str,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<ProfileView>>;
	async fn get_follows(
		&self,
		session: &PdsSession,
		actor: &str,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<ProfileView>>;

	// Feeds
	async fn get_timeline(
		&self,
		session: &PdsSession,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<FeedViewPost>>;
	async fn get_author_feed(
		&self,
		session: &PdsSession,
		actor: &str,
		limit: u32,
		cursor: Option<&str>,
		filter: Option<&str>,
	) -> SgResult<Page<FeedViewPost>>;
	async fn get_feed(
		&self,
		session: &PdsSession,
		feed_uri: &str,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<FeedViewPost>>;

	// Posts
	async fn get_post_thread(
		&self,
		session: &PdsSession,
		uri: &str,
		depth: u32,
	) -> SgResult<ThreadNode>;
	async fn get_posts(&self, session: &PdsSession, uris: &[&str]) -> SgResult<Vec<PostView>>;
	async fn get_liked_by(
		&self,
		session: &PdsSession,
		uri: &str,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<ProfileView>>;
	async fn get_reposted_by(
		&self,
		session: &PdsSession,
		uri: &str,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<ProfileView>>;
	async fn search_posts(
		&self,
		session: &PdsSession,
		query: &str,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<PostView>>;

	// Writes. Each returns the URI of the created record; the inverse
	// operation requires that record URI, not the target's.
	async fn create_post(
		&self,
		session: &PdsSession,
		post: &CreatePost<'_>,
	) -> SgResult<StrongRef>;
	async fn delete_record(&self, session: &PdsSession, uri: &str) -> SgResult<()>;
	async fn like_post(&self, session: &PdsSession, subject: &StrongRef) -> SgResult<Box<str>>;
	async fn unlike(&self, session: &PdsSession, like_record_uri: &str) -> SgResult<()>;
	async fn repost(&self, session: &PdsSession, subject: &StrongRef) -> SgResult<Box<str>>;
	async fn unrepost(&self, session: &PdsSession, repost_record_uri: &str) -> SgResult<()>;
	async fn follow(&self, session: &PdsSession, did: &str) -> SgResult<Box<str>>;
	async fn unfollow(&self, session: &PdsSession, follow_record_uri: &str) -> SgResult<()>;

	/// Upload a blob; returns the opaque blob object to embed in a record
	async fn upload_blob(
		&self,
		session: &PdsSession,
		bytes: Vec<u8>,
		mime_type: &str,
	) -> SgResult<serde_json::Value>;

	// Notifications
	async fn list_notifications(
		&self,
		session: &PdsSession,
		limit: u32,
		cursor: Option<&str>,
		reasons: Option<&[&str]>,
	) -> SgResult<Page<NotificationView>>;
	/// `seenAt` is intentionally not sent upstream; see DESIGN.md
	async fn mark_seen(&self, session: &PdsSession) -> SgResult<()>;
	async fn unread_count(&self, session: &PdsSession) -> SgResult<u64>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_facet_feature_decodes_lexicon_tags() {
		let json = r##"{
			"index": {"byteStart": 0, "byteEnd": 5},
			"features": [
				{"$type": "app.bsky.richtext.facet#link", "uri": "https://example.com"},
				{"$type": "app.bsky.richtext.facet#somethingNew", "x": 1}
			]
		}"##;
		let facet: Facet = serde_json::from_str(json).unwrap();
		assert_eq!(facet.index.byte_start, 0);
		assert_eq!(facet.index.byte_end, 5);
		assert!(matches!(facet.features[0], FacetFeature::Link { .. }));
		assert!(matches!(facet.features[1], FacetFeature::Unknown));
	}

	#[test]
	fn test_embed_view_union() {
		let json = r##"{
			"$type": "app.bsky.embed.images#view",
			"images": [{"thumb": "https://cdn/t.jpg", "fullsize": "https://cdn/f.jpg", "alt": "a cat"}]
		}"##;
		let embed: EmbedView = serde_json::from_str(json).unwrap();
		match embed {
			EmbedView::Images { images } => {
				assert_eq!(images.len(), 1);
				assert_eq!(&*images[0].alt, "a cat");
			}
			_ => panic!("expected images embed"),
		}

		let unknown: EmbedView =
			serde_json::from_str(r#"{"$type": "app.bsky.embed.video#view"}"#).unwrap();
		assert!(matches!(unknown, EmbedView::Unknown));
	}

	#[test]
	fn test_thread_node_recursion() {
		let json = r##"{
			"$type": "app.bsky.feed.defs#threadViewPost",
			"post": {
				"uri": "at://did:plc:a/app.bsky.feed.post/3kabc",
				"cid": "bafy1",
				"author": {"did": "did:plc:a", "handle": "a.bsky.social"},
				"record": {"text": "root"}
			},
			"replies": [{
				"$type": "app.bsky.feed.defs#notFoundPost",
				"uri": "at://did:plc:b/app.bsky.feed.post/3kdef"
			}]
		}"##;
		let node: ThreadNode = serde_json::from_str(json).unwrap();
		match node {
			ThreadNode::Post { post, parent, replies } => {
				assert_eq!(post.record.text, "root");
				assert!(parent.is_none());
				assert!(matches!(replies.unwrap()[0], ThreadNode::NotFound { .. }));
			}
			_ => panic!("expected thread post"),
		}
	}

	#[test]
	fn test_session_roundtrip_preserves_jwts() {
		let session = PdsSession {
			access_jwt: "eyJ.access".into(),
			refresh_jwt: "eyJ.refresh".into(),
			did: "did:plc:abc".into(),
			handle: "alice.bsky.social".into(),
			email: None,
		};
		let json = serde_json::to_string(&session).unwrap();
		let back: PdsSession = serde_json::from_str(&json).unwrap();
		assert_eq!(back.access_jwt, session.access_jwt);
		assert_eq!(back.refresh_jwt, session.refresh_jwt);
		assert_eq!(back.did, session.did);
	}
}

// vim: ts=4
