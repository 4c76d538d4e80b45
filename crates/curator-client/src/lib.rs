//! # curator-client
//!
//! Remote API surface for curator.
//!
//! This crate provides:
//!
//! - **The API seam**: the [`RemoteApi`] trait the engine and sync driver
//!   program against, with [`HttpRemoteApi`] as the production
//!   implementation.
//! - **Wire extraction**: pure helpers in [`wire`] that pull the small
//!   field set the core cares about (items, continuation cursor, generated
//!   post id, media variants) out of otherwise opaque payloads.
//! - **The failure taxonomy**: [`ClientError`] separates transient failures
//!   (timeout, rate limit) from permanent ones (identity rejected).

pub mod api;
pub mod error;
pub mod http;
pub mod wire;

pub use api::{Category, RemoteApi, TimelinePage};
pub use error::{ClientError, ClientResult};
pub use http::{ClientConfig, HttpRemoteApi};
