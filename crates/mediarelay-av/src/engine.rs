//! The transcoding engine boundary.

use crate::{EncodeRequest, Result};
use std::fmt;
use std::path::Path;

/// Which stream of a container to inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSelector {
    /// First video stream.
    Video,
    /// First audio stream.
    Audio,
}

impl StreamSelector {
    /// ffprobe `-select_streams` specifier.
    pub fn specifier(self) -> &'static str {
        match self {
            StreamSelector::Video => "v:0",
            StreamSelector::Audio => "a:0",
        }
    }
}

impl fmt::Display for StreamSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSelector::Video => write!(f, "video"),
            StreamSelector::Audio => write!(f, "audio"),
        }
    }
}

/// Codec probing and re-encoding performed by an external engine.
///
/// Implementations must not block the async runtime; the engine work happens
/// in a child process that is awaited.
#[async_trait::async_trait]
pub trait TranscodingEngine: Send + Sync {
    /// Return the lowercase codec name of the selected stream.
    ///
    /// `Ok(None)` means the container has no such stream.
    async fn probe_codec(&self, path: &Path, stream: StreamSelector) -> Result<Option<String>>;

    /// Run one encode, writing `request.output`.
    async fn encode(&self, request: &EncodeRequest) -> Result<()>;
}
