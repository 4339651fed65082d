//! Core infrastructure for the skygate gateway.
//!
//! This crate contains the shared infrastructure modules used by the router
//! crate and the feature crates: application state, the snowflake ID
//! generator and ID mapper, the request middleware chain, the distributed
//! rate limiter, and Prometheus metrics.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod app;
pub mod extract;
pub mod id_map;
pub mod metrics;
pub mod middleware;
pub mod prelude;
pub mod rate_limit;
pub mod snowflake;

pub use app::{App, AppBuilderOpts, AppState};
pub use extract::Auth;

// vim: ts=4
