//! Record types and durable-store interfaces for crosspost.
//!
//! This crate defines:
//! - The shared record types (posts, attachments, credentials)
//! - Collaborator traits for the durable post store, object store,
//!   and credential source
//! - In-memory implementations used by tests and as the dev default

mod credentials;
mod error;
mod object_store;
mod post_store;
mod records;

pub use credentials::{CredentialSource, MemoryCredentialStore};
pub use error::StoreError;
pub use object_store::{MemoryObjectStore, ObjectStore};
pub use post_store::{MemoryPostStore, PostFilter, PostStore};
pub use records::{Asset, Credentials, Destination, Post, Repeat};
