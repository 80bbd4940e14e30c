//! Error types for publishing and dispatch.

use thiserror::Error;

use crosspost_store::{Destination, StoreError};

/// Errors from a single destination's publish capability.
#[derive(Debug, Error)]
pub enum PublishError {
    /// No credentials have been stored for this destination.
    #[error("{0} is not configured: no credentials stored")]
    NotConfigured(Destination),

    /// The destination requires a media attachment.
    #[error("{0} requires a media attachment")]
    MediaRequired(Destination),

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The destination API rejected the request.
    #[error("{destination} API error: {message}")]
    Api {
        destination: Destination,
        message: String,
    },
}

/// Errors from dispatching a post.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The post's media attachment could not be fetched.
    #[error("failed to fetch media {bucket}/{key}: {source}")]
    MediaFetch {
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },

    /// Store failure outside the media fetch path.
    #[error(transparent)]
    Store(#[from] StoreError),
}
