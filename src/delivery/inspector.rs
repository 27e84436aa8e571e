//! Codec compatibility check for video containers.

use mediarelay_av::{StreamSelector, TranscodingEngine};
use mediarelay_common::paths::is_video_container;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// Codecs found in a file and whether the platform plays them as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatProbe {
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub is_compatible: bool,
}

impl FormatProbe {
    fn trivially_compatible() -> Self {
        Self {
            video_codec: None,
            audio_codec: None,
            is_compatible: true,
        }
    }

    fn unknown() -> Self {
        Self {
            video_codec: None,
            audio_codec: None,
            is_compatible: false,
        }
    }
}

fn is_h264_family(codec: &str) -> bool {
    codec == "h264" || codec.starts_with("avc")
}

fn is_aac_family(codec: &str) -> bool {
    codec == "aac" || codec.contains("mp4a")
}

/// Inspect `path` with the engine.
///
/// Non-video extensions are compatible without probing. A failed or empty
/// video probe counts as incompatible; a missing audio stream is fine.
pub async fn probe_format(engine: &dyn TranscodingEngine, path: &Path) -> FormatProbe {
    if !is_video_container(path) {
        return FormatProbe::trivially_compatible();
    }

    let video_codec = match engine.probe_codec(path, StreamSelector::Video).await {
        Ok(Some(codec)) => codec,
        Ok(None) => {
            warn!(path = %path.display(), "No video stream found; will convert");
            return FormatProbe::unknown();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not check video codec; will convert");
            return FormatProbe::unknown();
        }
    };

    let audio_codec = match engine.probe_codec(path, StreamSelector::Audio).await {
        Ok(codec) => codec,
        Err(e) => {
            debug!(error = %e, "Audio probe failed; treating as silent video");
            None
        }
    };

    let is_compatible =
        is_h264_family(&video_codec) && audio_codec.as_deref().map_or(true, is_aac_family);

    if is_compatible {
        debug!(video = %video_codec, audio = ?audio_codec, "Video format compatible");
    } else {
        warn!(
            video = %video_codec,
            audio = ?audio_codec,
            "Video format not compatible; will convert to H.264+AAC"
        );
    }

    FormatProbe {
        video_codec: Some(video_codec),
        audio_codec,
        is_compatible,
    }
}
