//! Core type definitions for media classification and attachment modes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad media category, decided from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// A video container (mp4, mov, avi, mkv).
    Video,
    /// An audio container (mp3, wav, m4a).
    Audio,
    /// Anything else; forwarded without transformation.
    Other,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// How an upload is presented to the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentMode {
    /// Inline media with direct playback.
    Inline,
    /// Document attachment.
    Document,
}

impl AttachmentMode {
    /// Select the attachment mode for a MIME type.
    ///
    /// Video plays inline. Audio is always a document because large inline
    /// audio faults on the platform side. Everything else is a document.
    pub fn for_mime(mime: &str) -> Self {
        if mime.starts_with("video/") {
            Self::Inline
        } else {
            Self::Document
        }
    }

    /// Whether the upload should set the send-as-document flag.
    pub fn is_document(self) -> bool {
        matches!(self, Self::Document)
    }
}

impl fmt::Display for AttachmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline => write!(f, "inline"),
            Self::Document => write!(f, "document"),
        }
    }
}
