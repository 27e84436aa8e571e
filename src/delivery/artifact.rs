//! Ownership-tagged media artifacts and temporary file naming.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Prefix shared by every temporary artifact the pipeline writes.
pub const TEMP_PREFIX: &str = "temp_";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Whether the pipeline owns the file behind an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The caller's input. Never deleted by the pipeline.
    Borrowed,
    /// A transient output the pipeline must delete.
    Owned,
}

/// The current media file of a delivery job.
///
/// An owned artifact removes its file exactly once, either through
/// [`ProcessedMedia::discard`] or when dropped.
#[derive(Debug)]
pub struct ProcessedMedia {
    path: PathBuf,
    ownership: Ownership,
    released: bool,
}

impl ProcessedMedia {
    /// Wrap the caller's original file.
    pub fn original(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ownership: Ownership::Borrowed,
            released: false,
        }
    }

    /// Claim a pipeline output path. The file need not exist yet.
    pub fn owned(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ownership: Ownership::Owned,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_temporary(&self) -> bool {
        self.ownership == Ownership::Owned
    }

    /// Delete the file now if owned.
    pub fn discard(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.ownership != Ownership::Owned || self.released {
            return;
        }
        self.released = true;

        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Cleaned up temp file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Cleanup failed"),
        }
    }
}

impl Drop for ProcessedMedia {
    fn drop(&mut self) {
        self.release();
    }
}

/// What a temporary artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempKind {
    Audio,
    Converted,
    Video,
}

impl TempKind {
    fn extension(self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Converted | Self::Video => "mp4",
        }
    }
}

impl fmt::Display for TempKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Converted => write!(f, "converted"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Fresh path `temp_<kind>_<millis>_<seq>.<ext>` under `dir`.
pub fn temp_path(dir: &Path, kind: TempKind) -> PathBuf {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let millis = chrono::Utc::now().timestamp_millis();
    dir.join(format!(
        "{TEMP_PREFIX}{kind}_{millis}_{seq}.{}",
        kind.extension()
    ))
}
