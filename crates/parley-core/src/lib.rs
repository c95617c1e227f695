//! # parley-core
//!
//! Foundation types for the Parley chat client.
//!
//! This crate provides the shared vocabulary the other Parley crates depend on:
//!
//! - **Branded IDs**: `SessionId`, `MessageId` as newtypes for type safety
//! - **Messages**: the `Message` record with its `user`/`bot` sender
//! - **Timeline**: the ordered, patchable log of the active conversation
//! - **Retry**: the bounded exponential backoff schedule for reconnects

#![deny(unsafe_code)]

pub mod ids;
pub mod message;
pub mod retry;
pub mod timeline;

pub use ids::{MessageId, SessionId};
pub use message::{Message, Sender};
pub use retry::ReconnectPolicy;
pub use timeline::Timeline;
