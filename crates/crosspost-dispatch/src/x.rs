//! X (Twitter) publish façade.
//!
//! Media is uploaded first to obtain a media id, then the tweet is
//! created referencing it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crosspost_store::Destination;

use crate::{MediaPayload, PublishError, Publisher};

/// Publishes posts to an X account.
pub struct XPublisher {
    http: Client,
    api_url: String,
    bearer_token: String,
}

impl XPublisher {
    pub fn new(api_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            api_url: api_url.into(),
            bearer_token: bearer_token.into(),
        }
    }

    /// Upload media bytes, returning the media id to attach to a tweet.
    async fn upload_media(&self, media: &MediaPayload) -> Result<String, PublishError> {
        #[derive(Deserialize)]
        struct UploadResponse {
            data: UploadData,
        }
        #[derive(Deserialize)]
        struct UploadData {
            id: String,
        }

        let category = if media.is_video() {
            "tweet_video"
        } else {
            "tweet_image"
        };

        let url = format!("{}/2/media/upload", self.api_url);
        let response = self
            .http
            .post(&url)
            .query(&[("media_category", category)])
            .header("Authorization", format!("Bearer {}", self.bearer_token))
            .header("Content-Type", media.mime_type.clone())
            .body(media.bytes.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PublishError::Api {
                destination: Destination::X,
                message: format!("media upload failed ({}): {}", status, text),
            });
        }

        let parsed: UploadResponse = response.json().await?;
        debug!(media_id = %parsed.data.id, category, "uploaded media to X");
        Ok(parsed.data.id)
    }
}

#[async_trait]
impl Publisher for XPublisher {
    async fn publish(&self, text: &str, media: Option<MediaPayload>) -> Result<(), PublishError> {
        let mut body = serde_json::json!({ "text": text });

        if let Some(media) = media {
            let media_id = self.upload_media(&media).await?;
            body["media"] = serde_json::json!({ "media_ids": [media_id] });
        }

        let url = format!("{}/2/tweets", self.api_url);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.bearer_token))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PublishError::Api {
                destination: Destination::X,
                message: format!("tweet creation failed ({}): {}", status, text),
            });
        }

        debug!("published to X");
        Ok(())
    }
}
