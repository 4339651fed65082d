//! Instance metadata, health, and metrics endpoints

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use skygate_core::app::VERSION;
use skygate_masto::entities::{
	InstanceConfiguration, InstanceStats, InstanceUrls, InstanceV1, InstanceV2,
	InstanceV2Contact, InstanceV2Registrations, MediaAttachmentsConfiguration,
	StatusesConfiguration,
};

use crate::prelude::*;

/// Mastodon version the gateway claims compatibility with
const COMPAT_VERSION: &str = "4.2.0";

/// Bluesky's effective post length
const MAX_CHARACTERS: u32 = 300;
const MAX_MEDIA_ATTACHMENTS: u32 = 4;
pub const IMAGE_SIZE_LIMIT: u64 = 16 * 1024 * 1024;

fn version_string() -> String {
	format!("{} (compatible; skygate {})", COMPAT_VERSION, VERSION)
}

fn configuration() -> InstanceConfiguration {
	InstanceConfiguration {
		statuses: StatusesConfiguration {
			max_characters: MAX_CHARACTERS,
			max_media_attachments: MAX_MEDIA_ATTACHMENTS,
			characters_reserved_per_url: 23,
		},
		media_attachments: MediaAttachmentsConfiguration {
			supported_mime_types: vec![
				"image/jpeg".into(),
				"image/png".into(),
				"image/gif".into(),
				"image/webp".into(),
			],
			image_size_limit: IMAGE_SIZE_LIMIT,
			image_matrix_limit: 16_777_216,
			video_size_limit: 0,
			video_frame_rate_limit: 0,
			video_matrix_limit: 0,
		},
	}
}

fn description(domain: &str) -> String {
	format!("Mastodon-compatible gateway to Bluesky at {}", domain)
}

pub async fn get_instance_v1(State(app): State<App>) -> Json<InstanceV1> {
	let domain = app.opts.domain.to_string();
	Json(InstanceV1 {
		uri: domain.clone(),
		title: "skygate".into(),
		short_description: description(&domain),
		description: description(&domain),
		email: format!("admin@{}", domain),
		version: version_string(),
		urls: InstanceUrls { streaming_api: String::new() },
		stats: InstanceStats { user_count: 0, status_count: 0, domain_count: 1 },
		thumbnail: None,
		languages: vec!["en".into()],
		registrations: false,
		approval_required: false,
		invites_enabled: false,
		configuration: configuration(),
		contact_account: None,
	})
}

pub async fn get_instance_v2(State(app): State<App>) -> Json<InstanceV2> {
	let domain = app.opts.domain.to_string();
	Json(InstanceV2 {
		domain: domain.clone(),
		title: "skygate".into(),
		version: version_string(),
		source_url: "https://github.com/skygate-proxy/skygate-rs".into(),
		description: description(&domain),
		thumbnail: serde_json::json!({ "url": "" }),
		languages: vec!["en".into()],
		configuration: configuration(),
		registrations: InstanceV2Registrations {
			enabled: false,
			approval_required: false,
			message: None,
		},
		contact: InstanceV2Contact { email: format!("admin@{}", domain), account: None },
		rules: Vec::new(),
	})
}

pub async fn healthz() -> StatusCode {
	StatusCode::OK
}

pub async fn metrics(State(app): State<App>) -> SgResult<impl IntoResponse> {
	let body = app.metrics.render()?;
	Ok(([("content-type", "text/plain; version=0.0.4")], body))
}

// vim: ts=4
