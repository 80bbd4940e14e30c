//! Composition root and post lifecycle operations.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crosspost_dispatch::{
    DestinationRegistry, DispatchError, Dispatcher, MediaPayload, RegistryConfig,
    delete_attachment, store_attachment,
};
use crosspost_scheduler::{JobCallback, Scheduler, SchedulerError};
use crosspost_store::{
    Credentials, MemoryCredentialStore, MemoryObjectStore, MemoryPostStore, ObjectStore, Post,
    PostStore, StoreError,
};

/// Errors from post lifecycle operations.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A schedulable post must name at least one destination.
    #[error("post {0} has no destinations")]
    NoDestinations(Uuid),

    /// Media bytes need an attachment reference to be stored under,
    /// or they would be lost before the post fires.
    #[error("post {0} has media bytes but no attachment reference")]
    MediaWithoutAttachment(Uuid),
}

/// Explicitly-wired services. There are no process-wide singletons;
/// everything the dispatcher and scheduler need is injected here.
pub struct App {
    pub posts: Arc<dyn PostStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub credentials: Arc<MemoryCredentialStore>,
    pub registry: Arc<DestinationRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub scheduler: Arc<Scheduler>,
}

impl App {
    /// Wire an app against in-memory stores (the dev default; durable
    /// backends plug in behind the same traits).
    pub fn with_memory_stores(config: RegistryConfig) -> Self {
        let posts: Arc<dyn PostStore> = Arc::new(MemoryPostStore::new());
        let objects: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
        let credentials = Arc::new(MemoryCredentialStore::new());

        let registry = Arc::new(DestinationRegistry::new(
            Arc::clone(&credentials) as _,
            config,
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&objects),
        ));
        let scheduler = Arc::new(Scheduler::new());

        Self {
            posts,
            objects,
            credentials,
            registry,
            dispatcher,
            scheduler,
        }
    }

    /// Persist a post and either publish it now or arm its job.
    ///
    /// Attachment bytes, when provided, are uploaded to the object store
    /// before anything is published; providing bytes without an
    /// attachment reference is an error. Immediate posts are dispatched at
    /// once and never registered with the scheduler; posts without a
    /// `scheduled_at` are treated the same way.
    pub async fn create_post(
        &self,
        post: Post,
        media: Option<MediaPayload>,
    ) -> Result<(), AppError> {
        if media.is_some() && post.attachment.is_none() {
            return Err(AppError::MediaWithoutAttachment(post.id));
        }

        if let (Some(asset), Some(payload)) = (&post.attachment, &media) {
            store_attachment(self.objects.as_ref(), asset, payload).await?;
        }

        self.posts.put_post(post.clone()).await?;

        if post.immediate {
            info!(post_id = %post.id, "publishing immediate post");
            self.dispatcher.dispatch(&post, media).await?;
            return Ok(());
        }

        if post.destinations.is_empty() {
            return Err(AppError::NoDestinations(post.id));
        }

        let Some(when) = post.scheduled_at else {
            info!(post_id = %post.id, "post has no schedule, publishing now");
            self.dispatcher.dispatch(&post, media).await?;
            return Ok(());
        };

        let callback = dispatch_callback(Arc::clone(&self.dispatcher), post.clone());
        self.scheduler
            .schedule(post.id, when, post.repeat, callback)
            .await?;
        info!(post_id = %post.id, scheduled_at = %when, repeat = ?post.repeat, "scheduled post");
        Ok(())
    }

    /// Cancel a post's job, delete its attachment, and remove the record.
    pub async fn delete_post(&self, id: Uuid) -> Result<(), AppError> {
        let post = self
            .posts
            .get_post(id)
            .await?
            .ok_or(StoreError::PostNotFound(id))?;

        self.scheduler.cancel(id).await;

        if let Some(asset) = &post.attachment {
            delete_attachment(self.objects.as_ref(), asset).await;
        }

        self.posts.delete_post(id).await?;
        info!(post_id = %id, "deleted post");
        Ok(())
    }

    /// Store new credentials and drop the destination's cached client so
    /// the next publish re-derives it.
    pub async fn rotate_credentials(&self, credentials: Credentials) {
        let destination = credentials.destination();
        self.credentials.store(credentials).await;
        self.registry.reset(destination).await;
        info!(destination = %destination, "rotated credentials");
    }

    /// Stop the scheduler, optionally draining in-flight publishes.
    pub async fn shutdown(&self, wait: bool) {
        self.scheduler.shutdown(wait).await;
    }
}

/// A scheduler callback that dispatches the given post.
///
/// Built on `dispatch_safe`: the execution clock must never see an
/// unhandled failure from a fired job.
pub fn dispatch_callback(dispatcher: Arc<Dispatcher>, post: Post) -> JobCallback {
    Arc::new(move || {
        let dispatcher = Arc::clone(&dispatcher);
        let post = post.clone();
        Box::pin(async move {
            dispatcher.dispatch_safe(&post, None).await;
            Ok(())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use crosspost_store::{Asset, Destination};
    use pretty_assertions::assert_eq;

    fn app() -> App {
        App::with_memory_stores(RegistryConfig::default())
    }

    fn asset() -> Asset {
        Asset {
            bucket: "media".to_string(),
            key: "k-cat.png".to_string(),
            file_name: "cat.png".to_string(),
            mime_type: "image/png".to_string(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_scheduled_post_arms_a_job() {
        let app = app();
        let post = Post::new("later", vec![Destination::Bluesky])
            .scheduled_at(Utc::now() + Duration::hours(1));
        let id = post.id;

        app.create_post(post, None).await.unwrap();

        assert!(app.scheduler.is_scheduled(id).await);
        assert!(app.posts.get_post(id).await.unwrap().is_some());

        app.shutdown(true).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_immediate_post_is_never_registered() {
        let app = app();
        // Immediate wins over scheduled_at; the registry has no
        // credentials so the publish fails fast and is logged
        let post = Post::new("now", vec![Destination::Bluesky])
            .scheduled_at(Utc::now() + Duration::hours(1))
            .immediate();
        let id = post.id;

        app.create_post(post, None).await.unwrap();
        assert!(!app.scheduler.is_scheduled(id).await);

        app.shutdown(true).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_schedulable_post_requires_destinations() {
        let app = app();
        let post = Post::new("nowhere", vec![]).scheduled_at(Utc::now() + Duration::hours(1));
        let id = post.id;

        let err = app.create_post(post, None).await.unwrap_err();
        assert!(matches!(err, AppError::NoDestinations(bad) if bad == id));
        assert!(!app.scheduler.is_scheduled(id).await);

        app.shutdown(true).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_uploads_attachment_bytes() {
        let app = app();
        let post = Post::new("with media", vec![Destination::Bluesky])
            .scheduled_at(Utc::now() + Duration::hours(1))
            .with_attachment(asset());

        let media = MediaPayload::new("cat.png", "image/png", b"hello".to_vec());
        app.create_post(post, Some(media)).await.unwrap();

        let stored = app.objects.get("media", "k-cat.png").await.unwrap();
        assert_eq!(stored, b"hello");

        app.shutdown(true).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_media_without_attachment_is_rejected() {
        let app = app();
        let media = MediaPayload::new("cat.png", "image/png", b"hello".to_vec());

        // Scheduled path: nowhere to store the bytes until fire time
        let post = Post::new("scheduled", vec![Destination::Bluesky])
            .scheduled_at(Utc::now() + Duration::hours(1));
        let id = post.id;
        let err = app.create_post(post, Some(media.copy())).await.unwrap_err();
        assert!(matches!(err, AppError::MediaWithoutAttachment(bad) if bad == id));
        assert!(!app.scheduler.is_scheduled(id).await);

        // Immediate path agrees instead of publishing the orphan bytes
        let post = Post::new("now", vec![Destination::Bluesky]).immediate();
        let err = app.create_post(post, Some(media)).await.unwrap_err();
        assert!(matches!(err, AppError::MediaWithoutAttachment(_)));

        app.shutdown(true).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_post_cancels_and_cleans_up() {
        let app = app();
        let post = Post::new("doomed", vec![Destination::Bluesky])
            .scheduled_at(Utc::now() + Duration::hours(1))
            .with_attachment(asset());
        let id = post.id;

        let media = MediaPayload::new("cat.png", "image/png", b"hello".to_vec());
        app.create_post(post, Some(media)).await.unwrap();

        app.delete_post(id).await.unwrap();

        assert!(!app.scheduler.is_scheduled(id).await);
        assert!(app.posts.get_post(id).await.unwrap().is_none());
        assert!(app.objects.get("media", "k-cat.png").await.is_err());

        app.shutdown(true).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_unknown_post_is_an_error() {
        let app = app();
        let err = app.delete_post(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::PostNotFound(_))));
        app.shutdown(true).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rotate_credentials_resets_registry() {
        let app = app();
        app.credentials
            .store(Credentials::Bluesky {
                handle: "old.bsky.social".to_string(),
                app_password: "old".to_string(),
            })
            .await;

        let before = app.registry.instance(Destination::Bluesky).await.unwrap();

        app.rotate_credentials(Credentials::Bluesky {
            handle: "new.bsky.social".to_string(),
            app_password: "new".to_string(),
        })
        .await;

        let after = app.registry.instance(Destination::Bluesky).await.unwrap();
        assert!(!Arc::ptr_eq(&before, &after));

        app.shutdown(true).await;
    }
}
