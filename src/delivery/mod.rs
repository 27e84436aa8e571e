//! Adaptive media delivery.
//!
//! A job flows through the size gate, the compression planner when the file
//! is oversized, the chat resolver, and a bounded upload loop. The pipeline
//! holds at most one temporary artifact at a time and removes it on every
//! exit path.

mod artifact;
mod error;
mod inspector;
mod orchestrator;
mod planner;
mod resolver;
mod size_gate;
mod transcoder;

pub use artifact::{temp_path, Ownership, ProcessedMedia, TempKind, TEMP_PREFIX};
pub use error::DeliveryError;
pub use inspector::{probe_format, FormatProbe};
pub use orchestrator::DeliveryOrchestrator;
pub use planner::{AudioTier, CompressionLevel, CompressionPlanner, VIDEO_LADDER};
pub use resolver::{ChatResolver, ResolverSettings};
pub use size_gate::{classify, classify_size, file_size_mb, SizeClass};
pub use transcoder::Transcoder;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Delivery path reported on success.
pub const DELIVERED_VIA_MEDIA: &str = "wa_media";

/// Input to one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaJob {
    pub source_path: PathBuf,
    pub recipient: String,
    pub caption: String,
}

impl MediaJob {
    pub fn new(
        source_path: impl Into<PathBuf>,
        recipient: impl Into<String>,
        caption: impl Into<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            recipient: recipient.into(),
            caption: caption.into(),
        }
    }
}

/// Result of a delivery, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_via: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered() -> Self {
        Self {
            success: true,
            delivered_via: Some(DELIVERED_VIA_MEDIA.to_string()),
            error: None,
            error_kind: None,
        }
    }

    pub fn failed(err: &DeliveryError) -> Self {
        Self {
            success: false,
            delivered_via: None,
            error: Some(err.to_string()),
            error_kind: Some(err.error_kind().to_string()),
        }
    }
}
