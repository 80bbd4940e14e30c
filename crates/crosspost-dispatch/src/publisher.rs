//! The publish capability.

use async_trait::async_trait;

use crosspost_store::Destination;

use crate::{MediaPayload, PublishError};

/// A destination's single capability: publish text with optional media.
///
/// Implementations own their network timeouts; "takes too long" and
/// "returns failure" look identical to callers.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str, media: Option<MediaPayload>) -> Result<(), PublishError>;
}

/// Stand-in capability for a destination with no stored credentials.
///
/// Fails fast with a configuration error instead of attempting network
/// I/O.
pub(crate) struct Unconfigured {
    pub destination: Destination,
}

#[async_trait]
impl Publisher for Unconfigured {
    async fn publish(&self, _text: &str, _media: Option<MediaPayload>) -> Result<(), PublishError> {
        Err(PublishError::NotConfigured(self.destination))
    }
}
