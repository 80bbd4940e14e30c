//! Destination registry: lazy credentialed clients with explicit reset.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crosspost_store::{CredentialSource, Credentials, Destination};

use crate::publisher::Unconfigured;
use crate::{BlueskyPublisher, DispatchError, InstagramPublisher, Publisher, XPublisher};

/// Endpoint configuration for the destination façades.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub bluesky_pds_url: String,
    pub x_api_url: String,
    pub instagram_api_url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bluesky_pds_url: "https://bsky.social".to_string(),
            x_api_url: "https://api.x.com".to_string(),
            instagram_api_url: "https://i.instagram.com/api/v1".to_string(),
        }
    }
}

/// Maps destinations to publish capabilities.
///
/// Clients are built lazily from the most recently stored credentials
/// and cached as per-destination singletons. `reset` drops a cached
/// client so the next `instance` call re-derives it; cached clients are
/// replaced wholesale, never mutated in place.
pub struct DestinationRegistry {
    credentials: Arc<dyn CredentialSource>,
    config: RegistryConfig,
    clients: RwLock<HashMap<Destination, Arc<dyn Publisher>>>,
}

impl DestinationRegistry {
    pub fn new(credentials: Arc<dyn CredentialSource>, config: RegistryConfig) -> Self {
        Self {
            credentials,
            config,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// The publish capability for a destination.
    ///
    /// With no stored credentials this returns an unconfigured
    /// capability that fails fast on `publish`; it is not cached, so
    /// the next call re-checks the credential source.
    pub async fn instance(
        &self,
        destination: Destination,
    ) -> Result<Arc<dyn Publisher>, DispatchError> {
        if let Some(client) = self.clients.read().await.get(&destination) {
            return Ok(Arc::clone(client));
        }

        let Some(credentials) = self.credentials.latest_credentials(destination).await? else {
            warn!(destination = %destination, "no credentials stored");
            return Ok(Arc::new(Unconfigured { destination }));
        };

        let client = self.build(destination, credentials);
        self.clients
            .write()
            .await
            .insert(destination, Arc::clone(&client));
        debug!(destination = %destination, "built destination client");
        Ok(client)
    }

    /// Install a capability directly, bypassing credential lookup.
    pub async fn install(&self, destination: Destination, client: Arc<dyn Publisher>) {
        self.clients.write().await.insert(destination, client);
    }

    /// Drop the cached client for one destination.
    ///
    /// Required after a credential change so stale tokens are never
    /// reused.
    pub async fn reset(&self, destination: Destination) {
        if self.clients.write().await.remove(&destination).is_some() {
            debug!(destination = %destination, "reset destination client");
        }
    }

    /// Drop all cached clients.
    pub async fn reset_all(&self) {
        self.clients.write().await.clear();
        debug!("reset all destination clients");
    }

    fn build(&self, destination: Destination, credentials: Credentials) -> Arc<dyn Publisher> {
        match (destination, credentials) {
            (Destination::Bluesky, Credentials::Bluesky { handle, app_password }) => Arc::new(
                BlueskyPublisher::new(&self.config.bluesky_pds_url, handle, app_password),
            ),
            (Destination::X, Credentials::X { bearer_token, .. }) => {
                Arc::new(XPublisher::new(&self.config.x_api_url, bearer_token))
            }
            (Destination::Instagram, Credentials::Instagram { username, password }) => Arc::new(
                InstagramPublisher::new(&self.config.instagram_api_url, username, password),
            ),
            (destination, credentials) => {
                // Credential record does not match the destination; treat
                // the destination as unconfigured
                warn!(
                    destination = %destination,
                    stored_for = %credentials.destination(),
                    "mismatched credential record"
                );
                Arc::new(Unconfigured { destination })
            }
        }
    }
}
