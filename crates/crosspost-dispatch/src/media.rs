//! Media payloads and the bridge to the object store.

use tracing::{debug, warn};

use crosspost_store::{Asset, ObjectStore};

use crate::DispatchError;

/// An in-memory media attachment ready for publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    /// Original file name.
    pub file_name: String,
    /// MIME type of the bytes.
    pub mime_type: String,
    /// The content itself.
    pub bytes: Vec<u8>,
}

impl MediaPayload {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// An independently-owned copy of this payload.
    ///
    /// Each destination receives its own copy so that consuming one can
    /// never affect another.
    pub fn copy(&self) -> MediaPayload {
        self.clone()
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }
}

/// Fetch a post's attachment from the object store.
///
/// A fetch failure is fatal to the dispatch that needed the media; the
/// caller decides whether to log and continue.
pub async fn fetch_attachment(
    objects: &dyn ObjectStore,
    asset: &Asset,
) -> Result<MediaPayload, DispatchError> {
    let bytes = objects
        .get(&asset.bucket, &asset.key)
        .await
        .map_err(|source| DispatchError::MediaFetch {
            bucket: asset.bucket.clone(),
            key: asset.key.clone(),
            source,
        })?;

    debug!(
        bucket = %asset.bucket,
        key = %asset.key,
        size = bytes.len(),
        "fetched attachment"
    );

    Ok(MediaPayload::new(
        asset.file_name.clone(),
        asset.mime_type.clone(),
        bytes,
    ))
}

/// Upload attachment bytes to the object store.
pub async fn store_attachment(
    objects: &dyn ObjectStore,
    asset: &Asset,
    payload: &MediaPayload,
) -> Result<(), DispatchError> {
    objects
        .put(&asset.bucket, &asset.key, payload.bytes.clone())
        .await?;
    Ok(())
}

/// Delete an attachment from the object store.
///
/// Failures are logged, not raised: deleting artifacts is best-effort
/// cleanup.
pub async fn delete_attachment(objects: &dyn ObjectStore, asset: &Asset) {
    if let Err(e) = objects.delete(&asset.bucket, &asset.key).await {
        warn!(
            bucket = %asset.bucket,
            key = %asset.key,
            error = %e,
            "failed to delete attachment"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosspost_store::MemoryObjectStore;
    use pretty_assertions::assert_eq;

    fn asset() -> Asset {
        Asset {
            bucket: "media".to_string(),
            key: "abc123-cat.png".to_string(),
            file_name: "cat.png".to_string(),
            mime_type: "image/png".to_string(),
        }
    }

    #[tokio::test]
    async fn test_store_then_fetch_round_trip() {
        let objects = MemoryObjectStore::new();
        let payload = MediaPayload::new("cat.png", "image/png", b"hello".to_vec());

        store_attachment(&objects, &asset(), &payload).await.unwrap();
        let fetched = fetch_attachment(&objects, &asset()).await.unwrap();

        assert_eq!(fetched, payload);
    }

    #[tokio::test]
    async fn test_fetch_missing_attachment_is_fatal() {
        let objects = MemoryObjectStore::new();
        let err = fetch_attachment(&objects, &asset()).await.unwrap_err();
        assert!(matches!(err, DispatchError::MediaFetch { .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_attachment_is_silent() {
        let objects = MemoryObjectStore::new();
        delete_attachment(&objects, &asset()).await;
    }

    #[test]
    fn test_copies_are_independent() {
        let payload = MediaPayload::new("cat.png", "image/png", b"hello".to_vec());
        let mut copy = payload.copy();
        copy.bytes.clear();

        assert_eq!(payload.bytes, b"hello");
    }

    #[test]
    fn test_mime_kind_helpers() {
        let image = MediaPayload::new("a.png", "image/png", vec![]);
        let video = MediaPayload::new("a.mp4", "video/mp4", vec![]);

        assert!(image.is_image() && !image.is_video());
        assert!(video.is_video() && !video.is_image());
    }
}
