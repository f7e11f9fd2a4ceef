//! HTTP transport for lww-gossip
//!
//! This crate provides:
//! - `PeerClient`: pushes a full snapshot to one peer with a bounded timeout
//! - `router`/`serve`: the axum endpoint serving `POST /gossip` and `GET /health`

pub mod client;
pub mod http;

pub use client::{PeerClient, PushError};
pub use http::{router, router_with_hook, serve, MergeHook, ServeError};
