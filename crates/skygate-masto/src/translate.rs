//! Pure translation from Bluesky view objects to Mastodon entities.
//!
//! Translators consult only the ID mapper (for snowflake minting/priming)
//! and the rich-text renderer; they never call upstream. Handlers hydrate
//! whatever upstream data a translation needs before invoking these.

use skygate_core::id_map::{IdMapper, hash_snowflake};
use skygate_types::pds_adapter::{
	EmbedView, EmbeddedRecord, FacetFeature, FeedReason, FeedViewPost, NotificationView, PostView,
	ProfileView,
};
use skygate_types::prelude::*;
use skygate_types::types::{at_uri_did, at_uri_rkey, parse_iso_or_now};

use crate::entities::{
	Account, AccountField, AccountSource, CredentialAccount, MediaAttachment, Mention,
	Notification, PreviewCard, Relationship, Status, Tag,
};
use crate::richtext::{render_facets, render_plain};

/// Label values that mark a post as sensitive for Mastodon clients
const SENSITIVE_LABELS: &[&str] =
	&["porn", "sexual", "nudity", "graphic-media", "nsfw", "corpse"];

/// Deterministic avatar for profiles without one
fn fallback_avatar(did: &str) -> String {
	format!("https://www.gravatar.com/avatar/{:016x}?d=identicon&f=y", hash_snowflake(did))
}

fn username_of(handle: &str) -> String {
	handle.split('.').next().unwrap_or(handle).to_string()
}

#[derive(Clone, Debug)]
pub struct Translator {
	ids: IdMapper,
}

impl Translator {
	pub fn new(ids: IdMapper) -> Self {
		Translator { ids }
	}

	// Accounts //
	//**********//

	pub async fn account(&self, profile: &ProfileView) -> SgResult<Account> {
		let sf = self.ids.snowflake_for_did(&profile.did).await?;
		self.ids.prime_handle(&profile.handle, &profile.did).await?;

		let display_name = match profile.display_name.as_deref() {
			Some(name) if !name.is_empty() => name.to_string(),
			_ => profile.handle.to_string(),
		};
		let avatar = profile
			.avatar
			.as_deref()
			.map_or_else(|| fallback_avatar(&profile.did), str::to_string);
		let header = profile.banner.as_deref().unwrap_or_default().to_string();

		Ok(Account {
			id: sf.to_string(),
			username: username_of(&profile.handle),
			acct: profile.handle.to_string(),
			display_name,
			locked: false,
			bot: false,
			discoverable: false,
			created_at: parse_iso_or_now(profile.indexed_at.as_deref()),
			note: render_plain(profile.description.as_deref().unwrap_or_default()),
			url: format!("https://bsky.app/profile/{}", profile.handle),
			avatar: avatar.clone(),
			avatar_static: avatar,
			header: header.clone(),
			header_static: header,
			followers_count: profile.followers_count.unwrap_or(0),
			following_count: profile.follows_count.unwrap_or(0),
			statuses_count: profile.posts_count.unwrap_or(0),
			last_status_at: None,
			emojis: Vec::new(),
			fields: Vec::new(),
		})
	}

	/// `verify_credentials` shape: the account plus its editable source form
	pub async fn credential_account(&self, profile: &ProfileView) -> SgResult<CredentialAccount> {
		let account = self.account(profile).await?;
		let note = profile.description.as_deref().unwrap_or_default().to_string();
		Ok(CredentialAccount {
			account,
			source: AccountSource {
				privacy: "public".into(),
				sensitive: false,
				language: "en".into(),
				note,
				fields: Vec::<AccountField>::new(),
				follow_requests_count: 0,
			},
		})
	}

	/// Relationship derived from the viewer state of an upstream profile
	pub async fn relationship(&self, profile: &ProfileView) -> SgResult<Relationship> {
		let sf = self.ids.snowflake_for_did(&profile.did).await?;
		let mut rel = Relationship::none(sf.to_string());
		if let Some(viewer) = &profile.viewer {
			rel.following = viewer.following.is_some();
			rel.followed_by = viewer.followed_by.is_some();
			rel.blocking = viewer.blocking.is_some();
			rel.blocked_by = viewer.blocked_by.unwrap_or(false);
			rel.muting = viewer.muted.unwrap_or(false);
		}
		Ok(rel)
	}

	// Statuses //
	//**********//

	pub async fn status(&self, post: &PostView) -> SgResult<Status> {
		let sf = self.ids.snowflake_for_at_uri(&post.uri).await?;
		let account = self.account(&post.author).await?;

		let created_at = match post.record.created_at.as_deref() {
			Some(iso) => parse_iso_or_now(Some(iso)),
			None => parse_iso_or_now(post.indexed_at.as_deref()),
		};

		let facets = post.record.facets.as_deref().unwrap_or_default();
		let content = render_facets(&post.record.text, facets);
		let (mentions, tags) = self.facet_entities(&post.record.text, facets).await?;

		let (in_reply_to_id, in_reply_to_account_id) = match &post.record.reply {
			Some(reply) => {
				let parent_sf = self.ids.snowflake_for_at_uri(&reply.parent.uri).await?;
				let parent_account_sf = match at_uri_did(&reply.parent.uri) {
					Some(did) => Some(self.ids.snowflake_for_did(did).await?),
					None => None,
				};
				(Some(parent_sf.to_string()), parent_account_sf.map(|v| v.to_string()))
			}
			None => (None, None),
		};

		let mut media_attachments = Vec::new();
		let mut card = None;
		let mut reblog = None;
		match &post.embed {
			Some(EmbedView::Images { images }) => {
				for image in images {
					let url = image.fullsize.as_deref().unwrap_or_default().to_string();
					media_attachments.push(MediaAttachment {
						id: hash_snowflake(&url).to_string(),
						kind: "image".into(),
						preview_url: image
							.thumb
							.as_deref()
							.map_or_else(|| url.clone(), str::to_string),
						url,
						remote_url: None,
						description: if image.alt.is_empty() {
							None
						} else {
							Some(image.alt.to_string())
						},
						blurhash: None,
					});
				}
			}
			Some(EmbedView::External { external }) => {
				card = Some(PreviewCard {
					url: external.uri.to_string(),
					title: external.title.to_string(),
					description: external.description.to_string(),
					kind: "link".into(),
					author_name: String::new(),
					author_url: String::new(),
					provider_name: String::new(),
					provider_url: String::new(),
					html: String::new(),
					width: 0,
					height: 0,
					image: external.thumb.as_deref().map(str::to_string),
					embed_url: String::new(),
				});
			}
			Some(embed @ EmbedView::Record { .. }) => {
				if let Some(quoted) = embed.quoted() {
					reblog = Some(Box::new(self.quoted_status(&quoted).await?));
				}
			}
			_ => {}
		}

		let sensitive = post.labels.iter().any(|l| SENSITIVE_LABELS.contains(&&*l.val));
		let viewer = post.viewer.clone().unwrap_or_default();

		let url = at_uri_rkey(&post.uri)
			.map(|rkey| format!("https://bsky.app/profile/{}/post/{}", post.author.handle, rkey));

		Ok(Status {
			id: sf.to_string(),
			uri: url.clone().unwrap_or_else(|| post.uri.to_string()),
			url,
			created_at,
			account,
			content,
			visibility: "public".into(),
			sensitive,
			spoiler_text: String::new(),
			media_attachments,
			mentions,
			tags,
			emojis: Vec::new(),
			reblogs_count: post.repost_count.unwrap_or(0),
			favourites_count: post.like_count.unwrap_or(0),
			replies_count: post.reply_count.unwrap_or(0),
			in_reply_to_id,
			in_reply_to_account_id,
			reblog,
			card,
			language: None,
			text: None,
			favourited: viewer.like.is_some(),
			reblogged: viewer.repost.is_some(),
			muted: false,
			bookmarked: false,
			pinned: false,
			edited_at: None,
		})
	}

	/// A quoted record carries less hydration than a full post view; missing
	/// pieces degrade to empty rather than failing the outer status.
	async fn quoted_status(&self, quoted: &EmbeddedRecord) -> SgResult<Status> {
		let sf = self.ids.snowflake_for_at_uri(&quoted.uri).await?;
		let author = quoted.author.clone().unwrap_or_default();
		let account = self.account(&author).await?;
		let record = quoted.value.clone().unwrap_or_default();
		let facets = record.facets.as_deref().unwrap_or_default();
		let (mentions, tags) = self.facet_entities(&record.text, facets).await?;

		let url = at_uri_rkey(&quoted.uri)
			.map(|rkey| format!("https://bsky.app/profile/{}/post/{}", author.handle, rkey));

		Ok(Status {
			id: sf.to_string(),
			uri: url.clone().unwrap_or_else(|| quoted.uri.to_string()),
			url,
			created_at: match record.created_at.as_deref() {
				Some(iso) => parse_iso_or_now(Some(iso)),
				None => parse_iso_or_now(quoted.indexed_at.as_deref()),
			},
			account,
			content: render_facets(&record.text, facets),
			visibility: "public".into(),
			sensitive: false,
			spoiler_text: String::new(),
			media_attachments: Vec::new(),
			mentions,
			tags,
			emojis: Vec::new(),
			reblogs_count: 0,
			favourites_count: 0,
			replies_count: 0,
			in_reply_to_id: None,
			in_reply_to_account_id: None,
			reblog: None,
			card: None,
			language: None,
			text: None,
			favourited: false,
			reblogged: false,
			muted: false,
			bookmarked: false,
			pinned: false,
			edited_at: None,
		})
	}

	/// A timeline item: plain post, or a repost wrapper around one
	pub async fn feed_status(&self, item: &FeedViewPost) -> SgResult<Status> {
		let inner = self.status(&item.post).await?;
		match &item.reason {
			Some(FeedReason::Repost { by, indexed_at }) => {
				let account = self.account(by).await?;
				// A wrapper needs its own stable id, distinct per reposter
				let wrapper_key = format!("repost:{}:{}", by.did, item.post.uri);
				Ok(Status {
					id: hash_snowflake(&wrapper_key).to_string(),
					uri: inner.uri.clone(),
					url: inner.url.clone(),
					created_at: parse_iso_or_now(indexed_at.as_deref()),
					account,
					content: String::new(),
					visibility: "public".into(),
					sensitive: false,
					spoiler_text: String::new(),
					media_attachments: Vec::new(),
					mentions: Vec::new(),
					tags: Vec::new(),
					emojis: Vec::new(),
					reblogs_count: inner.reblogs_count,
					favourites_count: inner.favourites_count,
					replies_count: inner.replies_count,
					in_reply_to_id: None,
					in_reply_to_account_id: None,
					reblog: Some(Box::new(inner)),
					card: None,
					language: None,
					text: None,
					favourited: false,
					reblogged: false,
					muted: false,
					bookmarked: false,
					pinned: false,
					edited_at: None,
				})
			}
			_ => Ok(inner),
		}
	}

	/// Mastodon mention/tag lists derived from the facets. Mentions carry
	/// the visible text as `acct` and prime the handle→DID relation.
	async fn facet_entities(
		&self,
		text: &str,
		facets: &[skygate_types::pds_adapter::Facet],
	) -> SgResult<(Vec<Mention>, Vec<Tag>)> {
		let mut mentions = Vec::new();
		let mut tags = Vec::new();

		for facet in facets {
			let visible = text
				.get(facet.index.byte_start..facet.index.byte_end.min(text.len()))
				.unwrap_or_default();
			for feature in &facet.features {
				match feature {
					FacetFeature::Mention { did } => {
						let handle = visible.strip_prefix('@').unwrap_or(visible);
						if handle.is_empty() {
							continue;
						}
						self.ids.prime_handle(handle, did).await?;
						let sf = self.ids.snowflake_for_did(did).await?;
						mentions.push(Mention {
							id: sf.to_string(),
							username: username_of(handle),
							url: format!("https://bsky.app/profile/{}", handle),
							acct: handle.to_string(),
						});
					}
					FacetFeature::Tag { tag } => {
						tags.push(Tag {
							name: tag.to_string(),
							url: format!("https://bsky.app/hashtag/{}", tag),
						});
					}
					_ => {}
				}
			}
		}
		Ok((mentions, tags))
	}

	// Notifications //
	//***************//

	/// Map an upstream notification; `None` for kinds Mastodon cannot show.
	/// `subject` is the hydrated post the notification refers to, when the
	/// kind has one (the caller batches those lookups).
	pub async fn notification(
		&self,
		view: &NotificationView,
		subject: Option<&PostView>,
	) -> SgResult<Option<Notification>> {
		let kind = match &*view.reason {
			"like" => "favourite",
			"repost" => "reblog",
			"follow" => "follow",
			"reply" | "mention" | "quote" => "mention",
			_ => return Ok(None),
		};

		let sf = self.ids.snowflake_for_at_uri(&view.uri).await?;
		let account = self.account(&view.author).await?;
		let status = match subject {
			Some(post) => Some(self.status(post).await?),
			None => None,
		};

		Ok(Some(Notification {
			id: sf.to_string(),
			kind: kind.into(),
			created_at: parse_iso_or_now(Some(&view.indexed_at)),
			account,
			status,
		}))
	}

	/// The AT URI of the post a notification's `status` should show:
	/// the subject for likes/reposts, the notification's own record for
	/// mentions/replies/quotes, nothing for follows.
	pub fn notification_subject_uri(view: &NotificationView) -> Option<&str> {
		match &*view.reason {
			"like" | "repost" => view.reason_subject.as_deref(),
			"reply" | "mention" | "quote" => Some(&view.uri),
			_ => None,
		}
	}
}


// vim: ts=4
