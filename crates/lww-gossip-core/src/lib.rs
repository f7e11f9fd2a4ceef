//! lww-gossip core library
//!
//! This crate provides the replicated state of a gossip node: a
//! last-writer-wins map CRDT, the JSON wire shape exchanged between peers,
//! and the merge-on-receive path that validates inbound batches.
//!
//! # Modules
//!
//! - [`types`]: `Entry`, `Version` and the dominance order
//! - [`store`]: `LwwStore`, the lock-guarded map that owns the merge rule
//! - [`wire`]: gossip payload encoding and item normalization
//! - [`receiver`]: `GossipReceiver`, validate-then-merge for inbound batches
//! - [`error`]: Error types

pub mod error;
pub mod receiver;
pub mod store;
pub mod types;
pub mod wire;

pub use error::{RejectedItem, ValidationError};
pub use receiver::{GossipReceiver, ReceiveReport};
pub use store::LwwStore;
pub use types::*;
pub use wire::GossipPayload;
