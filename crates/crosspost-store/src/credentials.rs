//! Credential source interface.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{Credentials, Destination, StoreError};

/// Source of destination credentials.
///
/// Only the most recently stored record per destination is visible.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// The latest credentials for a destination, if any were ever stored.
    async fn latest_credentials(
        &self,
        destination: Destination,
    ) -> Result<Option<Credentials>, StoreError>;
}

/// In-memory credential store, keeping the newest record per destination.
#[derive(Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<Destination, (DateTime<Utc>, Credentials)>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a credential record, superseding any previous one for the
    /// same destination.
    pub async fn store(&self, credentials: Credentials) {
        let mut records = self.records.write().await;
        records.insert(credentials.destination(), (Utc::now(), credentials));
    }
}

#[async_trait]
impl CredentialSource for MemoryCredentialStore {
    async fn latest_credentials(
        &self,
        destination: Destination,
    ) -> Result<Option<Credentials>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&destination).map(|(_, c)| c.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_store_has_no_credentials() {
        let store = MemoryCredentialStore::new();
        let creds = store
            .latest_credentials(Destination::Bluesky)
            .await
            .unwrap();
        assert!(creds.is_none());
    }

    #[tokio::test]
    async fn test_latest_record_wins() {
        let store = MemoryCredentialStore::new();
        store
            .store(Credentials::Bluesky {
                handle: "old.bsky.social".to_string(),
                app_password: "old".to_string(),
            })
            .await;
        store
            .store(Credentials::Bluesky {
                handle: "new.bsky.social".to_string(),
                app_password: "new".to_string(),
            })
            .await;

        let creds = store
            .latest_credentials(Destination::Bluesky)
            .await
            .unwrap()
            .unwrap();
        match creds {
            Credentials::Bluesky { handle, .. } => assert_eq!(handle, "new.bsky.social"),
            other => panic!("unexpected credentials: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_destinations_are_independent() {
        let store = MemoryCredentialStore::new();
        store
            .store(Credentials::Instagram {
                username: "alice".to_string(),
                password: "secret".to_string(),
            })
            .await;

        assert!(
            store
                .latest_credentials(Destination::X)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .latest_credentials(Destination::Instagram)
                .await
                .unwrap()
                .is_some()
        );
    }
}
