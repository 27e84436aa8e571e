use crate::session::SessionError;
use std::path::PathBuf;

/// Failures that end a delivery job.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("File too large ({size_mb:.2}MB). Max limit is {limit_mb}MB.")]
    FileTooLarge { size_mb: f64, limit_mb: f64 },

    #[error("transcode failed: {0}")]
    TranscodeFailure(#[from] mediarelay_av::Error),

    #[error("Chat not found: {raw} (resolved: {resolved})")]
    ChatNotFound { raw: String, resolved: String },

    #[error("messaging session not ready")]
    SessionNotReady,

    /// The automation surface died under a call; the shared session is
    /// marked not ready when this surfaces.
    #[error("messaging session crashed: {0}")]
    SessionCrashed(SessionError),

    #[error(transparent)]
    Session(SessionError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DeliveryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable tag reported alongside the message.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::FileTooLarge { .. } => "file_too_large",
            Self::TranscodeFailure(_) => "transcode_failure",
            Self::ChatNotFound { .. } => "chat_not_found",
            Self::SessionNotReady => "session_not_ready",
            Self::SessionCrashed(_) => "session_crashed",
            Self::Session(_) => "session_error",
            Self::Io { .. } => "io_error",
        }
    }
}

impl From<SessionError> for DeliveryError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotReady => Self::SessionNotReady,
            SessionError::LocalFile {
                path,
                kind,
                message,
            } => Self::io(path, std::io::Error::new(kind, message)),
            err if err.is_crash() => Self::SessionCrashed(err),
            err => Self::Session(err),
        }
    }
}
