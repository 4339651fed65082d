//! Mastodon entity types and the Bluesky → Mastodon translation layer.
//!
//! Translation is stateless: given the ID mapper and an upstream view
//! object, the translators produce the Mastodon-shaped entity a client
//! expects, byte for byte where the entity format pins one down.

pub mod entities;
pub mod pagination;
pub mod richtext;
pub mod translate;

pub use translate::Translator;

// vim: ts=4
