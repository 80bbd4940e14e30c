//! Binary object store interface for media attachments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::StoreError;

/// Storage for binary media objects, addressed by bucket and key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download `bucket/key` as an in-memory byte buffer.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Upload bytes to `bucket/key`, creating the bucket if absent.
    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<(), StoreError>;

    /// Delete the object at `bucket/key`. Missing objects are a no-op.
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
}

/// In-memory object store.
#[derive(Default)]
pub struct MemoryObjectStore {
    buckets: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let buckets = self.buckets.read().await;
        buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
            .ok_or_else(|| StoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write().await;
        // Bucket is created on first write
        let objects = buckets.entry(bucket.to_string()).or_default();
        debug!(bucket, key, size = data.len(), "stored object");
        objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write().await;
        if let Some(objects) = buckets.get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_creates_bucket() {
        let store = MemoryObjectStore::new();
        store
            .put("media", "cat.jpg", b"bytes".to_vec())
            .await
            .unwrap();

        let data = store.get("media", "cat.jpg").await.unwrap();
        assert_eq!(data, b"bytes");
    }

    #[tokio::test]
    async fn test_get_missing_object() {
        let store = MemoryObjectStore::new();
        let err = store.get("media", "missing").await.unwrap_err();
        assert!(matches!(err, StoreError::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryObjectStore::new();
        store.put("media", "a", b"x".to_vec()).await.unwrap();
        store.delete("media", "a").await.unwrap();
        store.delete("media", "a").await.unwrap();
        store.delete("no-such-bucket", "a").await.unwrap();

        assert!(store.get("media", "a").await.is_err());
    }
}
