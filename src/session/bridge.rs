//! HTTP adapter to the browser-automation sidecar.

use super::manager::{RemoteState, SessionBackend};
use super::{ChatSummary, MediaPayload, SendOptions, SessionError};
use crate::config::SessionConfig;
use base64::Engine as _;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error body returned by the sidecar on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Serialize)]
struct SendMediaBody<'a> {
    mimetype: &'a str,
    filename: &'a str,
    data: String,
    caption: &'a str,
    send_media_as_document: bool,
}

/// Default bound on a session state request.
pub const DEFAULT_STATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the sidecar's JSON API.
///
/// `timeout` covers every call, uploads included. State polls use the
/// shorter `state_timeout` so a hung sidecar is noticed quickly.
pub struct BridgeClient {
    client: Client,
    base_url: String,
    state_timeout: Duration,
}

impl BridgeClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            state_timeout: DEFAULT_STATE_TIMEOUT.min(timeout),
        }
    }

    /// Client configured from the `[session]` section.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            &config.bridge_url,
            Duration::from_secs(config.request_timeout_secs),
        )
        .with_state_timeout(Duration::from_secs(config.state_timeout_secs.max(1)))
    }

    pub fn with_state_timeout(mut self, timeout: Duration) -> Self {
        self.state_timeout = timeout;
        self
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SessionError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SessionError::Transport(format!("invalid bridge url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SessionError::Transport("bridge url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn transport(context: &str, e: reqwest::Error) -> SessionError {
        SessionError::Transport(format!("{context}: {e}"))
    }

    /// Turn a non-success response into a classified error.
    async fn error_from(response: reqwest::Response) -> SessionError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => SessionError::classify(body.kind.as_deref(), &body.error),
            Err(_) if text.trim().is_empty() => {
                SessionError::Rejected(format!("sidecar returned {status}"))
            }
            Err(_) => SessionError::classify(None, &text),
        }
    }

    async fn post_empty(&self, segments: &[&str], context: &str) -> Result<(), SessionError> {
        let response = self
            .client
            .post(self.url(segments)?)
            .send()
            .await
            .map_err(|e| Self::transport(context, e))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionBackend for BridgeClient {
    async fn start(&self) -> Result<(), SessionError> {
        self.post_empty(&["session", "start"], "Failed to start session")
            .await
    }

    async fn destroy(&self) -> Result<(), SessionError> {
        self.post_empty(&["session", "destroy"], "Failed to destroy session")
            .await
    }

    async fn remote_state(&self) -> Result<RemoteState, SessionError> {
        let response = self
            .client
            .get(self.url(&["session", "state"])?)
            .timeout(self.state_timeout)
            .send()
            .await
            .map_err(|e| Self::transport("Failed to GET session state", e))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| Self::transport("Invalid session state body", e))
    }

    async fn get_chat(&self, id: &str) -> Result<Option<ChatSummary>, SessionError> {
        let response = self
            .client
            .get(self.url(&["chats", id])?)
            .send()
            .await
            .map_err(|e| Self::transport("Failed to GET chat", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        response
            .json()
            .await
            .map(Some)
            .map_err(|e| Self::transport("Invalid chat body", e))
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>, SessionError> {
        let response = self
            .client
            .get(self.url(&["chats"])?)
            .send()
            .await
            .map_err(|e| Self::transport("Failed to GET chats", e))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| Self::transport("Invalid chat list body", e))
    }

    async fn send_media(
        &self,
        chat_id: &str,
        media: &MediaPayload,
        options: &SendOptions,
    ) -> Result<(), SessionError> {
        let bytes = tokio::fs::read(&media.path)
            .await
            .map_err(|e| SessionError::local_file(&media.path, &e))?;

        tracing::debug!(
            mimetype = %media.mimetype,
            encoded_mb = (bytes.len() as f64 * 4.0 / 3.0) / (1024.0 * 1024.0),
            "Encoding media for upload"
        );

        let body = SendMediaBody {
            mimetype: &media.mimetype,
            filename: &media.filename,
            data: base64::engine::general_purpose::STANDARD.encode(&bytes),
            caption: &options.caption,
            send_media_as_document: options.send_as_document,
        };
        drop(bytes);

        let response = self
            .client
            .post(self.url(&["chats", chat_id, "messages"])?)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::transport("Failed to POST message", e))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }
}
