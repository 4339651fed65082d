//! HTTP implementation of the [`PdsAdapter`] trait over XRPC.
//!
//! One adapter instance serves every user; per-user state is carried in
//! the [`PdsSession`] passed into each call, so connections are pooled per
//! PDS host while sessions stay request-scoped.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use skygate_types::pds_adapter::{
	CreatePost, FeedViewPost, NotificationView, Page, PdsAdapter, PdsSession, PostView,
	ProfileView, StrongRef, ThreadNode,
};
use skygate_types::prelude::*;
use skygate_types::types::parse_at_uri;

mod xrpc;

use xrpc::XrpcClient;

const POST_COLLECTION: &str = "app.bsky.feed.post";
const LIKE_COLLECTION: &str = "app.bsky.feed.like";
const REPOST_COLLECTION: &str = "app.bsky.feed.repost";
const FOLLOW_COLLECTION: &str = "app.bsky.graph.follow";

fn now_iso() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug)]
pub struct PdsAdapterHttp {
	client: XrpcClient,
}

impl PdsAdapterHttp {
	pub fn new(pds_url: &str) -> SgResult<Self> {
		Ok(PdsAdapterHttp { client: XrpcClient::new(pds_url)? })
	}

	/// `createRecord` for a subject-bearing record (like, repost), returning
	/// the record's own URI
	async fn create_subject_record(
		&self,
		session: &PdsSession,
		collection: &str,
		subject: &StrongRef,
	) -> SgResult<Box<str>> {
		let record = json!({
			"$type": collection,
			"subject": { "uri": subject.uri, "cid": subject.cid },
			"createdAt": now_iso(),
		});
		let created: CreateRecordOutput = self
			.client
			.procedure(
				Some(&session.access_jwt),
				"com.atproto.repo.createRecord",
				&json!({
					"repo": session.did,
					"collection": collection,
					"record": record,
				}),
			)
			.await?;
		Ok(created.uri)
	}

	/// `deleteRecord` for a record the session's repo owns. The URI must be
	/// the record's own URI as returned by the original write.
	async fn delete_own_record(
		&self,
		session: &PdsSession,
		uri: &str,
		expected_collection: &str,
	) -> SgResult<()> {
		let (repo, collection, rkey) = parse_at_uri(uri)
			.ok_or_else(|| Error::validation("uri", format!("not an AT URI: {}", uri)))?;
		if collection != expected_collection {
			return Err(Error::validation(
				"uri",
				format!("expected a {} record, got {}", expected_collection, collection),
			));
		}
		let _: serde_json::Value = self
			.client
			.procedure(
				Some(&session.access_jwt),
				"com.atproto.repo.deleteRecord",
				&json!({ "repo": repo, "collection": collection, "rkey": rkey }),
			)
			.await?;
		Ok(())
	}
}

// XRPC response envelopes //
//*************************//

#[derive(Debug, Deserialize)]
struct ActorsPage {
	actors: Vec<ProfileView>,
	cursor: Option<Box<str>>,
}

#[derive(Debug, Deserialize)]
struct FollowersPage {
	followers: Vec<ProfileView>,
	cursor: Option<Box<str>>,
}

#[derive(Debug, Deserialize)]
struct FollowsPage {
	follows: Vec<ProfileView>,
	cursor: Option<Box<str>>,
}

#[derive(Debug, Deserialize)]
struct FeedPage {
	feed: Vec<FeedViewPost>,
	cursor: Option<Box<str>>,
}

#[derive(Debug, Deserialize)]
struct ThreadOutput {
	thread: ThreadNode,
}

#[derive(Debug, Deserialize)]
struct PostsOutput {
	posts: Vec<PostView>,
}

#[derive(Debug, Deserialize)]
struct LikeEntry {
	actor: ProfileView,
}

#[derive(Debug, Deserialize)]
struct LikesPage {
	likes: Vec<LikeEntry>,
	cursor: Option<Box<str>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepostedByPage {
	reposted_by: Vec<ProfileView>,
	cursor: Option<Box<str>>,
}

#[derive(Debug, Deserialize)]
struct PostSearchPage {
	posts: Vec<PostView>,
	cursor: Option<Box<str>>,
}

#[derive(Debug, Deserialize)]
struct NotificationsPage {
	notifications: Vec<NotificationView>,
	cursor: Option<Box<str>>,
}

#[derive(Debug, Deserialize)]
struct UnreadCountOutput {
	count: u64,
}

#[derive(Debug, Deserialize)]
struct CreateRecordOutput {
	uri: Box<str>,
	cid: Box<str>,
}

#[derive(Debug, Deserialize)]
struct UploadBlobOutput {
	blob: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PostRecordInput<'a> {
	#[serde(rename = "$type")]
	record_type: &'a str,
	text: &'a str,
	created_at: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	reply: Option<&'a skygate_types::pds_adapter::ReplyRef>,
	#[serde(skip_serializing_if = "Option::is_none")]
	facets: Option<&'a [skygate_types::pds_adapter::Facet]>,
	#[serde(skip_serializing_if = "Option::is_none")]
	embed: Option<&'a serde_json::Value>,
}

#[async_trait]
impl PdsAdapter for PdsAdapterHttp {
	async fn create_session(&self, identifier: &str, password: &str) -> SgResult<PdsSession> {
		self.client
			.procedure(
				None,
				"com.atproto.server.createSession",
				&json!({ "identifier": identifier, "password": password }),
			)
			.await
	}

	async fn refresh_session(&self, session: &PdsSession) -> SgResult<PdsSession> {
		self.client
			.procedure_empty(Some(&session.refresh_jwt), "com.atproto.server.refreshSession")
			.await
	}

	async fn get_profile(&self, session: &PdsSession, actor: &str) -> SgResult<ProfileView> {
		self.client
			.query(Some(&session.access_jwt), "app.bsky.actor.getProfile", &[("actor", actor)])
			.await
	}

	async fn search_actors(
		&self,
		session: &PdsSession,
		query: &str,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<ProfileView>> {
		let limit = limit.to_string();
		let mut params = vec![("q", query), ("limit", &limit)];
		if let Some(cursor) = cursor {
			params.push(("cursor", cursor));
		}
		let page: ActorsPage = self
			.client
			.query(Some(&session.access_jwt), "app.bsky.actor.searchActors", &params)
			.await?;
		Ok(Page { items: page.actors, cursor: page.cursor })
	}

	async fn get_followers(
		&self,
		session: &PdsSession,
		actor: &str,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<ProfileView>> {
		let limit = limit.to_string();
		let mut params = vec![("actor", actor), ("limit", &limit)];
		if let Some(cursor) = cursor {
			params.push(("cursor", cursor));
		}
		let page: FollowersPage = self
			.client
			.query(Some(&session.access_jwt), "app.bsky.graph.getFollowers", &params)
			.await?;
		Ok(Page { items: page.followers, cursor: page.cursor })
	}

	async fn get_follows(
		&self,
		session: &PdsSession,
		actor: &str,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<ProfileView>> {
		let limit = limit.to_string();
		let mut params = vec![("actor", actor), ("limit", &limit)];
		if let Some(cursor) = cursor {
			params.push(("cursor", cursor));
		}
		let page: FollowsPage = self
			.client
			.query(Some(&session.access_jwt), "app.bsky.graph.getFollows", &params)
			.await?;
		Ok(Page { items: page.follows, cursor: page.cursor })
	}

	async fn get_timeline(
		&self,
		session: &PdsSession,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<FeedViewPost>> {
		let limit = limit.to_string();
		let mut params = vec![("limit", limit.as_str())];
		if let Some(cursor) = cursor {
			params.push(("cursor", cursor));
		}
		let page: FeedPage = self
			.client
			.query(Some(&session.access_jwt), "app.bsky.feed.getTimeline", &params)
			.await?;
		Ok(Page { items: page.feed, cursor: page.cursor })
	}

	async fn get_author_feed(
		&self,
		session: &PdsSession,
		actor: &str,
		limit: u32,
		cursor: Option<&str>,
		filter: Option<&str>,
	) -> SgResult<Page<FeedViewPost>> {
		let limit = limit.to_string();
		let mut params = vec![("actor", actor), ("limit", &limit)];
		if let Some(cursor) = cursor {
			params.push(("cursor", cursor));
		}
		if let Some(filter) = filter {
			params.push(("filter", filter));
		}
		let page: FeedPage = self
			.client
			.query(Some(&session.access_jwt), "app.bsky.feed.getAuthorFeed", &params)
			.await?;
		Ok(Page { items: page.feed, cursor: page.cursor })
	}

	async fn get_feed(
		&self,
		session: &PdsSession,
		feed_uri: &str,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<FeedViewPost>> {
		let limit = limit.to_string();
		let mut params = vec![("feed", feed_uri), ("limit", &limit)];
		if let Some(cursor) = cursor {
			params.push(("cursor", cursor));
		}
		let page: FeedPage =
			self.client.query(Some(&session.access_jwt), "app.bsky.feed.getFeed", &params).await?;
		Ok(Page { items: page.feed, cursor: page.cursor })
	}

	async fn get_post_thread(
		&self,
		session: &PdsSession,
		uri: &str,
		depth: u32,
	) -> SgResult<ThreadNode> {
		let depth = depth.to_string();
		let output: ThreadOutput = self
			.client
			.query(
				Some(&session.access_jwt),
				"app.bsky.feed.getPostThread",
				&[("uri", uri), ("depth", &depth)],
			)
			.await?;
		Ok(output.thread)
	}

	async fn get_posts(&self, session: &PdsSession, uris: &[&str]) -> SgResult<Vec<PostView>> {
		if uris.is_empty() {
			return Ok(Vec::new());
		}
		let params: Vec<(&str, &str)> = uris.iter().map(|uri| ("uris", *uri)).collect();
		let output: PostsOutput = self
			.client
			.query(Some(&session.access_jwt), "app.bsky.feed.getPosts", &params)
			.await?;
		Ok(output.posts)
	}

	async fn get_liked_by(
		&self,
		session: &PdsSession,
		uri: &str,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<ProfileView>> {
		let limit = limit.to_string();
		let mut params = vec![("uri", uri), ("limit", &limit)];
		if let Some(cursor) = cursor {
			params.push(("cursor", cursor));
		}
		let page: LikesPage =
			self.client.query(Some(&session.access_jwt), "app.bsky.feed.getLikes", &params).await?;
		Ok(Page {
			items: page.likes.into_iter().map(|entry| entry.actor).collect(),
			cursor: page.cursor,
		})
	}

	async fn get_reposted_by(
		&self,
		session: &PdsSession,
		uri: &str,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<ProfileView>> {
		let limit = limit.to_string();
		let mut params = vec![("uri", uri), ("limit", &limit)];
		if let Some(cursor) = cursor {
			params.push(("cursor", cursor));
		}
		let page: RepostedByPage = self
			.client
			.query(Some(&session.access_jwt), "app.bsky.feed.getRepostedBy", &params)
			.await?;
		Ok(Page { items: page.reposted_by, cursor: page.cursor })
	}

	async fn search_posts(
		&self,
		session: &PdsSession,
		query: &str,
		limit: u32,
		cursor: Option<&str>,
	) -> SgResult<Page<PostView>> {
		let limit = limit.to_string();
		let mut params = vec![("q", query), ("limit", &limit)];
		if let Some(cursor) = cursor {
			params.push(("cursor", cursor));
		}
		let page: PostSearchPage = self
			.client
			.query(Some(&session.access_jwt), "app.bsky.feed.searchPosts", &params)
			.await?;
		Ok(Page { items: page.posts, cursor: page.cursor })
	}

	async fn create_post(
		&self,
		session: &PdsSession,
		post: &CreatePost<'_>,
	) -> SgResult<StrongRef> {
		let record = PostRecordInput {
			record_type: POST_COLLECTION,
			text: post.text,
			created_at: now_iso(),
			reply: post.reply.as_ref(),
			facets: post.facets.as_deref(),
			embed: post.embed.as_ref(),
		};
		let created: CreateRecordOutput = self
			.client
			.procedure(
				Some(&session.access_jwt),
				"com.atproto.repo.createRecord",
				&json!({
					"repo": session.did,
					"collection": POST_COLLECTION,
					"record": record,
				}),
			)
			.await?;
		Ok(StrongRef { uri: created.uri, cid: created.cid })
	}

	async fn delete_record(&self, session: &PdsSession, uri: &str) -> SgResult<()> {
		self.delete_own_record(session, uri, POST_COLLECTION).await
	}

	async fn like_post(&self, session: &PdsSession, subject: &StrongRef) -> SgResult<Box<str>> {
		self.create_subject_record(session, LIKE_COLLECTION, subject).await
	}

	async fn unlike(&self, session: &PdsSession, like_record_uri: &str) -> SgResult<()> {
		self.delete_own_record(session, like_record_uri, LIKE_COLLECTION).await
	}

	async fn repost(&self, session: &PdsSession, subject: &StrongRef) -> SgResult<Box<str>> {
		self.create_subject_record(session, REPOST_COLLECTION, subject).await
	}

	async fn unrepost(&self, session: &PdsSession, repost_record_uri: &str) -> SgResult<()> {
		self.delete_own_record(session, repost_record_uri, REPOST_COLLECTION).await
	}

	async fn follow(&self, session: &PdsSession, did: &str) -> SgResult<Box<str>> {
		let record = json!({
			"$type": FOLLOW_COLLECTION,
			"subject": did,
			"createdAt": now_iso(),
		});
		let created: CreateRecordOutput = self
			.client
			.procedure(
				Some(&session.access_jwt),
				"com.atproto.repo.createRecord",
				&json!({
					"repo": session.did,
					"collection": FOLLOW_COLLECTION,
					"record": record,
				}),
			)
			.await?;
		Ok(created.uri)
	}

	async fn unfollow(&self, session: &PdsSession, follow_record_uri: &str) -> SgResult<()> {
		self.delete_own_record(session, follow_record_uri, FOLLOW_COLLECTION).await
	}

	async fn upload_blob(
		&self,
		session: &PdsSession,
		bytes: Vec<u8>,
		mime_type: &str,
	) -> SgResult<serde_json::Value> {
		let output: UploadBlobOutput = self
			.client
			.procedure_bytes(
				Some(&session.access_jwt),
				"com.atproto.repo.uploadBlob",
				bytes,
				mime_type,
			)
			.await?;
		Ok(output.blob)
	}

	async fn list_notifications(
		&self,
		session: &PdsSession,
		limit: u32,
		cursor: Option<&str>,
		reasons: Option<&[&str]>,
	) -> SgResult<Page<NotificationView>> {
		let limit = limit.to_string();
		let mut params = vec![("limit", limit.as_str())];
		if let Some(cursor) = cursor {
			params.push(("cursor", cursor));
		}
		if let Some(reasons) = reasons {
			for reason in reasons {
				params.push(("reasons", reason));
			}
		}
		let page: NotificationsPage = self
			.client
			.query(Some(&session.access_jwt), "app.bsky.notification.listNotifications", &params)
			.await?;
		Ok(Page { items: page.notifications, cursor: page.cursor })
	}

	async fn mark_seen(&self, session: &PdsSession) -> SgResult<()> {
		// seenAt is deliberately absent; see DESIGN.md
		let _: serde_json::Value = self
			.client
			.procedure(Some(&session.access_jwt), "app.bsky.notification.updateSeen", &json!({}))
			.await?;
		Ok(())
	}

	async fn unread_count(&self, session: &PdsSession) -> SgResult<u64> {
		let output: UnreadCountOutput = self
			.client
			.query(Some(&session.access_jwt), "app.bsky.notification.getUnreadCount", &[])
			.await?;
		Ok(output.count)
	}
}


// vim: ts=4
