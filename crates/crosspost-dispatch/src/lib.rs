//! Destination registry and fan-out dispatcher for crosspost.
//!
//! This crate provides:
//! - The `Publisher` capability: one `publish` operation per destination
//! - Reqwest façades for X, Instagram, and Bluesky
//! - A registry of lazily-built credentialed clients with explicit reset
//! - The dispatcher fanning a post out to all its destinations while
//!   isolating per-destination failures
//! - The media cache bridge between posts and the object store

mod bluesky;
mod dispatcher;
mod error;
mod instagram;
mod media;
mod publisher;
mod registry;
mod x;

pub use bluesky::BlueskyPublisher;
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, PublishError};
pub use instagram::InstagramPublisher;
pub use media::{MediaPayload, delete_attachment, fetch_attachment, store_attachment};
pub use publisher::Publisher;
pub use registry::{DestinationRegistry, RegistryConfig};
pub use x::XPublisher;
