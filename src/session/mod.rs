//! External messaging session boundary.
//!
//! The messaging client lives in a browser-automation sidecar that can crash
//! or disconnect at any moment. This module defines:
//!
//! - [`MessagingSession`]: the query-only view the delivery core holds
//! - [`SessionError`]: tagged failures, classified once at the boundary
//! - [`SessionManager`]: the process-wide owner of the session lifecycle
//! - [`BridgeClient`]: the HTTP adapter to the sidecar

mod bridge;
mod manager;

pub use bridge::{BridgeClient, DEFAULT_STATE_TIMEOUT};
pub use manager::{
    LifecycleSettings, RemoteState, RemoteStatus, SessionBackend, SessionManager, SessionSnapshot,
    SessionSupervisor,
};

use mediarelay_common::paths::mime_type;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Lifecycle state of the process-wide session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No client has been started yet, or it was torn down by a reset.
    Uninitialized,
    /// A client is starting or waiting for QR pairing.
    Authenticating,
    /// Authenticated and usable.
    Ready,
    /// Lost, crashed, or failed to start; reinitialization may be pending.
    Disconnected,
    /// Pairing was rejected.
    AuthFailed,
}

/// Lifecycle events emitted by the messaging client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Qr(String),
    Authenticated,
    Ready,
    Disconnected(String),
    AuthFailure(String),
}

/// Failure reported by the session adapter, already classified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session is absent or not authenticated.
    #[error("session not ready")]
    NotReady,

    /// The automation page frame was detached.
    #[error("detached Frame: {0}")]
    FrameDetached(String),

    /// The browser target closed underneath a call.
    #[error("Target closed: {0}")]
    TargetClosed(String),

    /// The browser crashed (known crash sentinel).
    #[error("browser crashed: {0}")]
    BrowserCrash(String),

    /// The sidecar refused or failed the request for a non-crash reason.
    #[error("session rejected request: {0}")]
    Rejected(String),

    /// The sidecar could not be reached.
    #[error("session transport error: {0}")]
    Transport(String),

    /// The media file could not be read before upload.
    #[error("failed to read {}: {message}", path.display())]
    LocalFile {
        path: PathBuf,
        kind: io::ErrorKind,
        message: String,
    },
}

impl SessionError {
    /// Translate a raw sidecar failure into a tagged error.
    ///
    /// An explicit `kind` reported by the sidecar wins; otherwise the message
    /// text is matched against the known crash signatures. A bare `"t"` is a
    /// crash sentinel produced by the automation library when an oversized
    /// upload kills the page.
    pub fn classify(kind: Option<&str>, message: &str) -> Self {
        let message = message.trim();
        match kind {
            Some("not_ready") => return Self::NotReady,
            Some("frame_detached") => return Self::FrameDetached(message.to_string()),
            Some("target_closed") => return Self::TargetClosed(message.to_string()),
            Some("browser_crash") => return Self::BrowserCrash(message.to_string()),
            _ => {}
        }

        let lower = message.to_lowercase();
        if lower.contains("detached frame") {
            Self::FrameDetached(message.to_string())
        } else if lower.contains("target closed") {
            Self::TargetClosed(message.to_string())
        } else if lower.contains("browser_crash") || message == "t" {
            Self::BrowserCrash(message.to_string())
        } else if lower.contains("not ready") {
            Self::NotReady
        } else {
            Self::Rejected(message.to_string())
        }
    }

    /// The automation surface is gone; retrying against it is pointless.
    pub fn is_crash(&self) -> bool {
        matches!(
            self,
            Self::FrameDetached(_) | Self::TargetClosed(_) | Self::BrowserCrash(_)
        )
    }

    /// Frame detachment that may clear up if the call is repeated after a pause.
    pub fn is_transient_detachment(&self) -> bool {
        matches!(self, Self::FrameDetached(_) | Self::TargetClosed(_))
    }

    pub fn local_file(path: &Path, err: &io::Error) -> Self {
        Self::LocalFile {
            path: path.to_path_buf(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Short machine-readable signature for logs.
    pub fn signature(&self) -> &'static str {
        match self {
            Self::NotReady => "not_ready",
            Self::FrameDetached(_) => "frame_detached",
            Self::TargetClosed(_) => "target_closed",
            Self::BrowserCrash(_) => "browser_crash",
            Self::Rejected(_) => "rejected",
            Self::Transport(_) => "transport",
            Self::LocalFile { .. } => "local_file",
        }
    }
}

/// A chat as listed by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Opaque reference to a resolved chat, valid for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatHandle {
    id: String,
    name: Option<String>,
}

impl ChatHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl From<ChatSummary> for ChatHandle {
    fn from(chat: ChatSummary) -> Self {
        Self {
            id: chat.id,
            name: chat.name,
        }
    }
}

/// File to upload together with the metadata the session needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub path: PathBuf,
    pub mimetype: String,
    pub filename: String,
}

impl MediaPayload {
    /// Describe a file for upload, deriving its MIME type from the extension.
    pub fn from_path(path: &Path) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "media".to_string());

        Self {
            path: path.to_path_buf(),
            mimetype: mime_type(path).to_string(),
            filename,
        }
    }
}

/// Per-message send options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub caption: String,
    pub send_as_document: bool,
}

/// The capabilities the delivery core needs from the messaging session.
///
/// The session can become unready at any time; implementations re-check
/// readiness on every call and fail with [`SessionError::NotReady`].
#[async_trait::async_trait]
pub trait MessagingSession: Send + Sync {
    /// Whether the session is currently authenticated and usable.
    fn is_ready(&self) -> bool;

    /// Look up a chat by its qualified identifier.
    async fn get_chat_by_id(&self, id: &str) -> Result<Option<ChatHandle>, SessionError>;

    /// List all chats visible to the session.
    async fn get_chats(&self) -> Result<Vec<ChatSummary>, SessionError>;

    /// Upload media to a chat.
    async fn send_message(
        &self,
        chat: &ChatHandle,
        media: &MediaPayload,
        options: &SendOptions,
    ) -> Result<(), SessionError>;

    /// Flip the shared readiness flag after a crash signature.
    ///
    /// Readiness stays off for every job until the session is reinitialized.
    fn mark_crashed(&self, reason: &str);
}
