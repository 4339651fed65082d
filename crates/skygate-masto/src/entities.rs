//! Mastodon v1 API entities.
//!
//! Snake_case keys, ISO-8601 UTC dates, IDs as decimal snowflake strings.
//! Option fields serialize as `null` (Mastodon emits explicit nulls).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AccountField {
	pub name: String,
	pub value: String,
	pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Account {
	pub id: String,
	pub username: String,
	pub acct: String,
	pub display_name: String,
	pub locked: bool,
	pub bot: bool,
	pub discoverable: bool,
	pub created_at: DateTime<Utc>,
	pub note: String,
	pub url: String,
	pub avatar: String,
	pub avatar_static: String,
	pub header: String,
	pub header_static: String,
	pub followers_count: u64,
	pub following_count: u64,
	pub statuses_count: u64,
	pub last_status_at: Option<String>,
	pub emojis: Vec<serde_json::Value>,
	pub fields: Vec<AccountField>,
}

/// `verify_credentials` response: an account plus its source form
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CredentialAccount {
	#[serde(flatten)]
	pub account: Account,
	pub source: AccountSource,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AccountSource {
	pub privacy: String,
	pub sensitive: bool,
	pub language: String,
	pub note: String,
	pub fields: Vec<AccountField>,
	pub follow_requests_count: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MediaAttachment {
	pub id: String,
	#[serde(rename = "type")]
	pub kind: String,
	pub url: String,
	pub preview_url: String,
	pub remote_url: Option<String>,
	pub description: Option<String>,
	pub blurhash: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PreviewCard {
	pub url: String,
	pub title: String,
	pub description: String,
	#[serde(rename = "type")]
	pub kind: String,
	pub author_name: String,
	pub author_url: String,
	pub provider_name: String,
	pub provider_url: String,
	pub html: String,
	pub width: u32,
	pub height: u32,
	pub image: Option<String>,
	pub embed_url: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Mention {
	pub id: String,
	pub username: String,
	pub url: String,
	pub acct: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Tag {
	pub name: String,
	pub url: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Status {
	pub id: String,
	pub uri: String,
	pub url: Option<String>,
	pub created_at: DateTime<Utc>,
	pub account: Account,
	pub content: String,
	pub visibility: String,
	pub sensitive: bool,
	pub spoiler_text: String,
	pub media_attachments: Vec<MediaAttachment>,
	pub mentions: Vec<Mention>,
	pub tags: Vec<Tag>,
	pub emojis: Vec<serde_json::Value>,
	pub reblogs_count: u64,
	pub favourites_count: u64,
	pub replies_count: u64,
	pub in_reply_to_id: Option<String>,
	pub in_reply_to_account_id: Option<String>,
	pub reblog: Option<Box<Status>>,
	pub card: Option<PreviewCard>,
	pub language: Option<String>,
	pub text: Option<String>,
	pub favourited: bool,
	pub reblogged: bool,
	pub muted: bool,
	pub bookmarked: bool,
	pub pinned: bool,
	pub edited_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Notification {
	pub id: String,
	#[serde(rename = "type")]
	pub kind: String,
	pub created_at: DateTime<Utc>,
	pub account: Account,
	pub status: Option<Status>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Relationship {
	pub id: String,
	pub following: bool,
	pub showing_reblogs: bool,
	pub notifying: bool,
	pub followed_by: bool,
	pub blocking: bool,
	pub blocked_by: bool,
	pub muting: bool,
	pub muting_notifications: bool,
	pub requested: bool,
	pub domain_blocking: bool,
	pub endorsed: bool,
	pub note: String,
}

impl Relationship {
	/// The all-false relationship towards an account
	pub fn none(id: String) -> Self {
		Relationship {
			id,
			following: false,
			showing_reblogs: true,
			notifying: false,
			followed_by: false,
			blocking: false,
			blocked_by: false,
			muting: false,
			muting_notifications: false,
			requested: false,
			domain_blocking: false,
			endorsed: false,
			note: String::new(),
		}
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Context {
	pub ancestors: Vec<Status>,
	pub descendants: Vec<Status>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct List {
	pub id: String,
	pub title: String,
	pub replies_policy: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SearchResults {
	pub accounts: Vec<Account>,
	pub statuses: Vec<Status>,
	pub hashtags: Vec<Tag>,
}

// Instance metadata //
//*******************//

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InstanceStats {
	pub user_count: u64,
	pub status_count: u64,
	pub domain_count: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InstanceUrls {
	pub streaming_api: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StatusesConfiguration {
	pub max_characters: u32,
	pub max_media_attachments: u32,
	pub characters_reserved_per_url: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MediaAttachmentsConfiguration {
	pub supported_mime_types: Vec<String>,
	pub image_size_limit: u64,
	pub image_matrix_limit: u64,
	pub video_size_limit: u64,
	pub video_frame_rate_limit: u64,
	pub video_matrix_limit: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InstanceConfiguration {
	pub statuses: StatusesConfiguration,
	pub media_attachments: MediaAttachmentsConfiguration,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InstanceV1 {
	pub uri: String,
	pub title: String,
	pub short_description: String,
	pub description: String,
	pub email: String,
	pub version: String,
	pub urls: InstanceUrls,
	pub stats: InstanceStats,
	pub thumbnail: Option<String>,
	pub languages: Vec<String>,
	pub registrations: bool,
	pub approval_required: bool,
	pub invites_enabled: bool,
	pub configuration: InstanceConfiguration,
	pub contact_account: Option<Account>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InstanceV2Registrations {
	pub enabled: bool,
	pub approval_required: bool,
	pub message: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InstanceV2Contact {
	pub email: String,
	pub account: Option<Account>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InstanceV2 {
	pub domain: String,
	pub title: String,
	pub version: String,
	pub source_url: String,
	pub description: String,
	pub thumbnail: serde_json::Value,
	pub languages: Vec<String>,
	pub configuration: InstanceConfiguration,
	pub registrations: InstanceV2Registrations,
	pub contact: InstanceV2Contact,
	pub rules: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_json_roundtrip() {
		let account = Account {
			id: "123".into(),
			username: "alice".into(),
			acct: "alice.bsky.social".into(),
			display_name: "Alice".into(),
			locked: false,
			bot: false,
			discoverable: false,
			created_at: Utc::now(),
			note: "<p></p>".into(),
			url: "https://bsky.app/profile/alice.bsky.social".into(),
			avatar: "https://cdn/avatar.jpg".into(),
			avatar_static: "https://cdn/avatar.jpg".into(),
			header: String::new(),
			header_static: String::new(),
			followers_count: 1,
			following_count: 2,
			statuses_count: 3,
			last_status_at: None,
			emojis: vec![],
			fields: vec![],
		};
		let status = Status {
			id: "456".into(),
			uri: "https://bsky.app/profile/alice.bsky.social/post/3kabc".into(),
			url: Some("https://bsky.app/profile/alice.bsky.social/post/3kabc".into()),
			created_at: Utc::now(),
			account,
			content: "<p>hi</p>".into(),
			visibility: "public".into(),
			sensitive: false,
			spoiler_text: String::new(),
			media_attachments: vec![],
			mentions: vec![],
			tags: vec![],
			emojis: vec![],
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
		};

		let json = serde_json::to_value(&status).unwrap();
		// Snake_case keys, string id, explicit nulls
		assert_eq!(json["id"], "456");
		assert_eq!(json["visibility"], "public");
		assert!(json["in_reply_to_id"].is_null());
		assert_eq!(json["account"]["acct"], "alice.bsky.social");

		let back: Status = serde_json::from_value(json).unwrap();
		assert_eq!(back.id, status.id);
		assert_eq!(back.account.username, "alice");
	}

	#[test]
	fn test_media_attachment_type_key() {
		let attachment = MediaAttachment {
			id: "1".into(),
			kind: "image".into(),
			url: "https://cdn/full.jpg".into(),
			preview_url: "https://cdn/thumb.jpg".into(),
			remote_url: None,
			description: Some("alt".into()),
			blurhash: None,
		};
		let json = serde_json::to_value(&attachment).unwrap();
		assert_eq!(json["type"], "image");
	}
}

// vim: ts=4
