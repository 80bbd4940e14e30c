//! Durable post store interface.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{Post, StoreError};

/// Filter for listing posts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostFilter {
    /// Restrict to posts with this `immediate` flag.
    pub immediate: Option<bool>,
}

impl PostFilter {
    /// Posts that are candidates for (re)scheduling.
    pub fn scheduled() -> Self {
        Self {
            immediate: Some(false),
        }
    }

    fn matches(&self, post: &Post) -> bool {
        self.immediate.is_none_or(|flag| post.immediate == flag)
    }
}

/// Durable storage for post records.
///
/// Returns fully-formed [`Post`] entities; callers never reconstruct
/// records from raw field maps.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// List posts matching the filter.
    async fn list_posts(&self, filter: PostFilter) -> Result<Vec<Post>, StoreError>;

    /// Get a post by id.
    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, StoreError>;

    /// Insert or replace a post record.
    async fn put_post(&self, post: Post) -> Result<(), StoreError>;

    /// Delete a post record. Unknown ids are a no-op.
    async fn delete_post(&self, id: Uuid) -> Result<(), StoreError>;
}

/// In-memory post store.
#[derive(Default)]
pub struct MemoryPostStore {
    posts: RwLock<HashMap<Uuid, Post>>,
}

impl MemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostStore for MemoryPostStore {
    async fn list_posts(&self, filter: PostFilter) -> Result<Vec<Post>, StoreError> {
        let posts = self.posts.read().await;
        let mut matching: Vec<Post> = posts
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        // Stable order for callers iterating the result
        matching.sort_by_key(|p| p.created_at);
        Ok(matching)
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
        Ok(self.posts.read().await.get(&id).cloned())
    }

    async fn put_post(&self, post: Post) -> Result<(), StoreError> {
        self.posts.write().await.insert(post.id, post);
        Ok(())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), StoreError> {
        self.posts.write().await.remove(&id);
        Ok(())
    }
}
