//! Fan-out dispatcher.

use std::sync::Arc;

use tracing::{error, info};

use crosspost_store::{ObjectStore, Post};

use crate::{DestinationRegistry, DispatchError, MediaPayload, fetch_attachment};

/// Fans a post out to every bound destination.
///
/// Holds no scheduling state; the scheduler invokes [`Dispatcher::dispatch_safe`]
/// as a job callback.
pub struct Dispatcher {
    registry: Arc<DestinationRegistry>,
    objects: Arc<dyn ObjectStore>,
}

impl Dispatcher {
    pub fn new(registry: Arc<DestinationRegistry>, objects: Arc<dyn ObjectStore>) -> Self {
        Self { registry, objects }
    }

    /// Publish a post to all its destinations.
    ///
    /// If `media` is absent but the post references an attachment, it is
    /// fetched once; a fetch failure aborts the whole dispatch. Per
    /// destination failures are caught and logged: failing to publish to
    /// one destination never prevents an attempt at the next.
    pub async fn dispatch(
        &self,
        post: &Post,
        media: Option<MediaPayload>,
    ) -> Result<(), DispatchError> {
        let media = match media {
            Some(payload) => Some(payload),
            None => match &post.attachment {
                Some(asset) => Some(fetch_attachment(self.objects.as_ref(), asset).await?),
                None => None,
            },
        };

        info!(
            post_id = %post.id,
            destinations = ?post.destinations,
            has_media = media.is_some(),
            "dispatching post"
        );

        for &destination in &post.destinations {
            let publisher = match self.registry.instance(destination).await {
                Ok(publisher) => publisher,
                Err(e) => {
                    error!(
                        post_id = %post.id,
                        destination = %destination,
                        error = %e,
                        "failed to resolve destination client"
                    );
                    continue;
                }
            };

            // Each destination consumes its own copy of the payload
            let media_copy = media.as_ref().map(MediaPayload::copy);
            match publisher.publish(&post.text, media_copy).await {
                Ok(()) => {
                    info!(post_id = %post.id, destination = %destination, "published");
                }
                Err(e) => {
                    error!(
                        post_id = %post.id,
                        destination = %destination,
                        error = %e,
                        "failed to publish"
                    );
                }
            }
        }

        Ok(())
    }

    /// [`Dispatcher::dispatch`] with every error caught and logged.
    ///
    /// Safe to hand to the scheduler: a fired job must never surface an
    /// unhandled failure to the execution clock.
    pub async fn dispatch_safe(&self, post: &Post, media: Option<MediaPayload>) {
        if let Err(e) = self.dispatch(post, media).await {
            error!(post_id = %post.id, error = %e, "dispatch failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    use crosspost_store::{
        Asset, Destination, MemoryCredentialStore, MemoryObjectStore, StoreError,
    };

    use crate::{PublishError, Publisher, RegistryConfig};

    /// Test double recording every publish call it receives.
    struct RecordingPublisher {
        calls: Mutex<Vec<(String, Option<MediaPayload>)>>,
        fail: bool,
    }

    impl RecordingPublisher {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn calls(&self) -> Vec<(String, Option<MediaPayload>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(
            &self,
            text: &str,
            media: Option<MediaPayload>,
        ) -> Result<(), PublishError> {
            self.calls
                .lock()
                .unwrap()
                .push((text.to_string(), media));
            if self.fail {
                Err(PublishError::Api {
                    destination: Destination::X,
                    message: "simulated outage".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn registry() -> Arc<DestinationRegistry> {
        Arc::new(DestinationRegistry::new(
            Arc::new(MemoryCredentialStore::new()),
            RegistryConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_failure_in_one_destination_does_not_block_others() {
        let registry = registry();
        let failing = RecordingPublisher::new(true);
        let healthy = RecordingPublisher::new(false);
        registry
            .install(Destination::X, Arc::clone(&failing) as _)
            .await;
        registry
            .install(Destination::Bluesky, Arc::clone(&healthy) as _)
            .await;

        let objects = Arc::new(MemoryObjectStore::new());
        let dispatcher = Dispatcher::new(registry, objects);

        let post = Post::new("hello", vec![Destination::X, Destination::Bluesky]);
        dispatcher.dispatch(&post, None).await.unwrap();

        assert_eq!(failing.calls().len(), 1);
        assert_eq!(healthy.calls().len(), 1);
        assert_eq!(healthy.calls()[0].0, "hello");
    }

    #[tokio::test]
    async fn test_each_destination_gets_an_independent_media_copy() {
        let registry = registry();
        let a = RecordingPublisher::new(false);
        let b = RecordingPublisher::new(true);
        registry.install(Destination::Bluesky, Arc::clone(&a) as _).await;
        registry.install(Destination::X, Arc::clone(&b) as _).await;

        let objects = Arc::new(MemoryObjectStore::new());
        let dispatcher = Dispatcher::new(registry, objects);

        let post = Post::new("with media", vec![Destination::Bluesky, Destination::X]);
        let media = MediaPayload::new("m.png", "image/png", b"hello".to_vec());
        dispatcher.dispatch(&post, Some(media)).await.unwrap();

        // Both destinations received full, byte-identical copies of the
        // source payload, even though one publish failed
        let a_media = a.calls()[0].1.clone().unwrap();
        let b_media = b.calls()[0].1.clone().unwrap();
        assert_eq!(a_media.bytes, b"hello");
        assert_eq!(b_media.bytes, b"hello");
    }

    #[tokio::test]
    async fn test_attachment_is_fetched_once_from_object_store() {
        let registry = registry();
        let publisher = RecordingPublisher::new(false);
        registry
            .install(Destination::Bluesky, Arc::clone(&publisher) as _)
            .await;

        let objects = Arc::new(MemoryObjectStore::new());
        objects
            .put("media", "k1", b"stored bytes".to_vec())
            .await
            .unwrap();

        let dispatcher = Dispatcher::new(registry, Arc::clone(&objects) as _);

        let post = Post::new("fetched", vec![Destination::Bluesky]).with_attachment(Asset {
            bucket: "media".to_string(),
            key: "k1".to_string(),
            file_name: "m.png".to_string(),
            mime_type: "image/png".to_string(),
        });

        dispatcher.dispatch(&post, None).await.unwrap();

        let received = publisher.calls()[0].1.clone().unwrap();
        assert_eq!(received.bytes, b"stored bytes");
        assert_eq!(received.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_media_fetch_failure_is_fatal() {
        let registry = registry();
        let publisher = RecordingPublisher::new(false);
        registry
            .install(Destination::Bluesky, Arc::clone(&publisher) as _)
            .await;

        let objects = Arc::new(MemoryObjectStore::new());
        let dispatcher = Dispatcher::new(registry, objects);

        let post = Post::new("broken", vec![Destination::Bluesky]).with_attachment(Asset {
            bucket: "media".to_string(),
            key: "missing".to_string(),
            file_name: "m.png".to_string(),
            mime_type: "image/png".to_string(),
        });

        let err = dispatcher.dispatch(&post, None).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::MediaFetch {
                source: StoreError::ObjectNotFound { .. },
                ..
            }
        ));
        // No destination was attempted
        assert!(publisher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_safe_swallows_errors() {
        let registry = registry();
        let objects = Arc::new(MemoryObjectStore::new());
        let dispatcher = Dispatcher::new(registry, objects);

        let post = Post::new("broken", vec![Destination::Bluesky]).with_attachment(Asset {
            bucket: "media".to_string(),
            key: "missing".to_string(),
            file_name: "m.png".to_string(),
            mime_type: "image/png".to_string(),
        });

        // Must not panic or propagate
        dispatcher.dispatch_safe(&post, None).await;
    }
}
