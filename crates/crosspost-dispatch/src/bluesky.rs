//! Bluesky publish façade.
//!
//! Speaks raw XRPC against a PDS: `createSession` to log in,
//! `uploadBlob` for media, `createRecord` for the feed post.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crosspost_store::Destination;

use crate::{MediaPayload, PublishError, Publisher};

/// An authenticated PDS session.
#[derive(Debug, Clone, Deserialize)]
struct Session {
    #[serde(rename = "accessJwt")]
    access_jwt: String,
    did: String,
}

/// Publishes posts to a Bluesky account.
pub struct BlueskyPublisher {
    http: Client,
    pds_url: String,
    handle: String,
    app_password: String,
    session: RwLock<Option<Session>>,
}

impl BlueskyPublisher {
    pub fn new(
        pds_url: impl Into<String>,
        handle: impl Into<String>,
        app_password: impl Into<String>,
    ) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            pds_url: pds_url.into(),
            handle: handle.into(),
            app_password: app_password.into(),
            session: RwLock::new(None),
        }
    }

    /// Log in if there is no session yet, returning a copy of it.
    async fn ensure_session(&self) -> Result<Session, PublishError> {
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(session.clone());
        }

        #[derive(Serialize)]
        struct LoginRequest<'a> {
            identifier: &'a str,
            password: &'a str,
        }

        let url = format!("{}/xrpc/com.atproto.server.createSession", self.pds_url);
        let response = self
            .http
            .post(&url)
            .json(&LoginRequest {
                identifier: &self.handle,
                password: &self.app_password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PublishError::Api {
                destination: Destination::Bluesky,
                message: format!("login failed ({}): {}", status, text),
            });
        }

        let session: Session = response.json().await?;
        debug!(did = %session.did, "logged in to PDS");
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// Upload media bytes, returning the blob reference for the embed.
    async fn upload_blob(
        &self,
        session: &Session,
        media: &MediaPayload,
    ) -> Result<serde_json::Value, PublishError> {
        #[derive(Deserialize)]
        struct UploadBlobResponse {
            blob: serde_json::Value,
        }

        let url = format!("{}/xrpc/com.atproto.repo.uploadBlob", self.pds_url);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", session.access_jwt))
            .header("Content-Type", media.mime_type.clone())
            .body(media.bytes.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PublishError::Api {
                destination: Destination::Bluesky,
                message: format!("uploadBlob failed ({}): {}", status, text),
            });
        }

        let parsed: UploadBlobResponse = response.json().await?;
        debug!(size = media.bytes.len(), mime_type = %media.mime_type, "uploaded blob");
        Ok(parsed.blob)
    }

    /// Build the embed value for the media kind.
    fn embed_for(media: &MediaPayload, blob: serde_json::Value) -> serde_json::Value {
        if media.is_video() {
            serde_json::json!({
                "$type": "app.bsky.embed.video",
                "video": blob,
                "alt": media.file_name,
            })
        } else {
            serde_json::json!({
                "$type": "app.bsky.embed.images",
                "images": [{
                    "image": blob,
                    "alt": media.file_name,
                }],
            })
        }
    }
}

#[async_trait]
impl Publisher for BlueskyPublisher {
    async fn publish(&self, text: &str, media: Option<MediaPayload>) -> Result<(), PublishError> {
        let session = self.ensure_session().await?;

        let mut record = serde_json::json!({
            "$type": "app.bsky.feed.post",
            "text": text,
            "createdAt": Utc::now().to_rfc3339(),
        });

        if let Some(media) = media {
            let blob = self.upload_blob(&session, &media).await?;
            record["embed"] = Self::embed_for(&media, blob);
        }

        let url = format!("{}/xrpc/com.atproto.repo.createRecord", self.pds_url);
        let body = serde_json::json!({
            "repo": session.did,
            "collection": "app.bsky.feed.post",
            "record": record,
        });

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", session.access_jwt))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            // A rejected token may be stale: drop the session so the
            // next publish logs in again
            if status == reqwest::StatusCode::UNAUTHORIZED {
                *self.session.write().await = None;
            }
            return Err(PublishError::Api {
                destination: Destination::Bluesky,
                message: format!("createRecord failed ({}): {}", status, text),
            });
        }

        debug!("published to Bluesky");
        Ok(())
    }
}
