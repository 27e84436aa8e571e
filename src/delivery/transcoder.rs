//! Domain presets over the transcoding engine.

use super::planner::CompressionLevel;
use mediarelay_av::{EncodeRequest, TranscodingEngine};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// CRF used when normalizing codecs ahead of the ladder.
pub const NORMALIZE_CRF: u32 = 23;
pub const NORMALIZE_AUDIO_BITRATE: &str = "128k";

const VIDEO_CODEC: &str = "libx264";
const AUDIO_CODEC: &str = "aac";

/// Stateless wrapper that turns pipeline steps into engine requests.
#[derive(Clone)]
pub struct Transcoder {
    engine: Arc<dyn TranscodingEngine>,
    preset: String,
}

impl Transcoder {
    pub fn new(engine: Arc<dyn TranscodingEngine>, preset: impl Into<String>) -> Self {
        Self {
            engine,
            preset: preset.into(),
        }
    }

    pub fn engine(&self) -> &dyn TranscodingEngine {
        self.engine.as_ref()
    }

    /// First audio stream only, stereo, at `bitrate`.
    pub fn audio_request(input: &Path, output: &Path, bitrate: &str) -> EncodeRequest {
        EncodeRequest::new(input, output)
            .audio_bitrate(bitrate)
            .map("0:a:0")
            .audio_channels(2)
    }

    pub fn level_request(
        &self,
        input: &Path,
        output: &Path,
        level: &CompressionLevel,
    ) -> EncodeRequest {
        EncodeRequest::new(input, output)
            .crf(level.crf)
            .preset(self.preset.as_str())
            .max_width(level.max_width)
            .video_codec(VIDEO_CODEC)
            .audio_codec(AUDIO_CODEC)
            .audio_bitrate(level.audio_bitrate)
            .faststart()
    }

    pub fn normalize_request(&self, input: &Path, output: &Path) -> EncodeRequest {
        EncodeRequest::new(input, output)
            .video_codec(VIDEO_CODEC)
            .audio_codec(AUDIO_CODEC)
            .audio_bitrate(NORMALIZE_AUDIO_BITRATE)
            .preset(self.preset.as_str())
            .crf(NORMALIZE_CRF)
            .faststart()
    }

    pub async fn encode_audio(
        &self,
        input: &Path,
        output: &Path,
        bitrate: &str,
    ) -> mediarelay_av::Result<()> {
        self.engine
            .encode(&Self::audio_request(input, output, bitrate))
            .await
    }

    pub async fn encode_level(
        &self,
        input: &Path,
        output: &Path,
        level: &CompressionLevel,
    ) -> mediarelay_av::Result<()> {
        info!(
            level = level.index,
            crf = level.crf,
            max_width = level.max_width,
            "Compression attempt"
        );
        self.engine
            .encode(&self.level_request(input, output, level))
            .await
    }

    pub async fn normalize(&self, input: &Path, output: &Path) -> mediarelay_av::Result<()> {
        info!("Converting video to H.264+AAC format");
        self.engine.encode(&self.normalize_request(input, output)).await
    }
}
