//! OAuth 2.0 core for the skygate gateway.
//!
//! Mastodon clients authenticate with classic OAuth (app registration,
//! authorization-code or password grant, opaque bearer tokens). Each issued
//! token owns exactly one upstream Bluesky session, created at grant time
//! and refreshed transparently during validation. All state lives in the
//! cache; the service itself is stateless and cheap to construct per use.

pub mod extract;
pub mod handler;
pub mod middleware;
pub mod service;

pub use service::{OAuthService, OAuthToken};

// vim: ts=4
