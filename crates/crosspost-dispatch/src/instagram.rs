//! Instagram publish façade.
//!
//! Instagram posts always carry media; text is the caption. Photo vs
//! video upload is chosen by the payload's MIME type.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crosspost_store::Destination;

use crate::{MediaPayload, PublishError, Publisher};

/// Publishes posts to an Instagram account.
pub struct InstagramPublisher {
    http: Client,
    api_url: String,
    username: String,
    password: String,
    session_token: RwLock<Option<String>>,
}

impl InstagramPublisher {
    pub fn new(
        api_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            api_url: api_url.into(),
            username: username.into(),
            password: password.into(),
            session_token: RwLock::new(None),
        }
    }

    /// Log in if there is no session yet, returning the session token.
    async fn ensure_session(&self) -> Result<String, PublishError> {
        if let Some(token) = self.session_token.read().await.as_ref() {
            return Ok(token.clone());
        }

        #[derive(Deserialize)]
        struct LoginResponse {
            session_token: String,
        }

        let url = format!("{}/accounts/login", self.api_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PublishError::Api {
                destination: Destination::Instagram,
                message: format!("login failed ({}): {}", status, text),
            });
        }

        let parsed: LoginResponse = response.json().await?;
        debug!(username = %self.username, "logged in to Instagram");
        *self.session_token.write().await = Some(parsed.session_token.clone());
        Ok(parsed.session_token)
    }
}

#[async_trait]
impl Publisher for InstagramPublisher {
    async fn publish(&self, text: &str, media: Option<MediaPayload>) -> Result<(), PublishError> {
        let Some(media) = media else {
            return Err(PublishError::MediaRequired(Destination::Instagram));
        };

        let token = self.ensure_session().await?;

        let endpoint = if media.is_video() {
            "media/upload/video"
        } else {
            "media/upload/photo"
        };

        let url = format!("{}/{}", self.api_url, endpoint);
        let response = self
            .http
            .post(&url)
            .query(&[("caption", text), ("file_name", &media.file_name)])
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", media.mime_type.clone())
            .body(media.bytes.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            // Session may have expired; force a fresh login next time
            if status == reqwest::StatusCode::UNAUTHORIZED {
                *self.session_token.write().await = None;
            }
            return Err(PublishError::Api {
                destination: Destination::Instagram,
                message: format!("upload failed ({}): {}", status, text),
            });
        }

        debug!("published to Instagram");
        Ok(())
    }
}
