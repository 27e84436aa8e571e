//! Compression decisions: audio bitrate tiers and the video quality ladder.

use super::artifact::{temp_path, ProcessedMedia, TempKind};
use super::inspector::probe_format;
use super::size_gate::file_size_mb;
use super::transcoder::Transcoder;
use super::DeliveryError;
use crate::config::DeliveryPolicy;
use mediarelay_common::paths::media_kind;
use mediarelay_common::MediaKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One rung of the video ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel {
    /// 1-based position in the ladder.
    pub index: u8,
    pub crf: u32,
    /// Width cap; height follows the aspect ratio.
    pub max_width: u32,
    pub audio_bitrate: &'static str,
}

/// Levels in order of increasing compression. Each attempt re-encodes the
/// same source, never the previous level's output.
pub const VIDEO_LADDER: [CompressionLevel; 3] = [
    CompressionLevel {
        index: 1,
        crf: 28,
        max_width: 1280,
        audio_bitrate: "96k",
    },
    CompressionLevel {
        index: 2,
        crf: 32,
        max_width: 960,
        audio_bitrate: "96k",
    },
    CompressionLevel {
        index: 3,
        crf: 35,
        max_width: 720,
        audio_bitrate: "96k",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioTier {
    Light,
    Heavy,
}

impl AudioTier {
    /// Pure function of the input size.
    pub fn for_size(size_mb: f64, policy: &DeliveryPolicy) -> Self {
        if size_mb > policy.audio_tier_limit_mb {
            Self::Heavy
        } else {
            Self::Light
        }
    }

    pub fn bitrate(self, policy: &DeliveryPolicy) -> &str {
        match self {
            Self::Light => &policy.audio_bitrate_light,
            Self::Heavy => &policy.audio_bitrate_heavy,
        }
    }
}

/// Chooses and runs the re-encode for an oversized file.
pub struct CompressionPlanner {
    transcoder: Transcoder,
    policy: DeliveryPolicy,
}

impl CompressionPlanner {
    pub fn new(transcoder: Transcoder, policy: DeliveryPolicy) -> Self {
        Self { transcoder, policy }
    }

    fn work_dir(&self, source: &Path) -> PathBuf {
        match self.policy.work_dir {
            Some(ref dir) => dir.clone(),
            None => source
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// Compress `source`, whose size is `size_mb`.
    ///
    /// Returns `None` for extensions with no compression path; the caller
    /// keeps its current artifact.
    pub async fn compress(
        &self,
        source: &Path,
        size_mb: f64,
    ) -> Result<Option<ProcessedMedia>, DeliveryError> {
        match media_kind(source) {
            MediaKind::Audio => self.compress_audio(source, size_mb).await.map(Some),
            MediaKind::Video => self.compress_video(source).await.map(Some),
            MediaKind::Other => {
                warn!(path = %source.display(), "Unknown file type, skipping compression");
                Ok(None)
            }
        }
    }

    async fn compress_audio(
        &self,
        source: &Path,
        size_mb: f64,
    ) -> Result<ProcessedMedia, DeliveryError> {
        let tier = AudioTier::for_size(size_mb, &self.policy);
        let bitrate = tier.bitrate(&self.policy);
        info!(size_mb, ?tier, bitrate, "Re-encoding audio");

        let output = ProcessedMedia::owned(temp_path(&self.work_dir(source), TempKind::Audio));
        self.transcoder
            .encode_audio(source, output.path(), bitrate)
            .await?;

        let new_size = file_size_mb(output.path()).await?;
        info!(from_mb = size_mb, to_mb = new_size, "Audio processed");
        Ok(output)
    }

    async fn compress_video(&self, source: &Path) -> Result<ProcessedMedia, DeliveryError> {
        let dir = self.work_dir(source);
        let limit = self.policy.no_compression_limit_mb;

        let probe = probe_format(self.transcoder.engine(), source).await;
        let mut normalized: Option<ProcessedMedia> = None;
        if !probe.is_compatible {
            let converted = ProcessedMedia::owned(temp_path(&dir, TempKind::Converted));
            match self.transcoder.normalize(source, converted.path()).await {
                Ok(()) => normalized = Some(converted),
                Err(e) => {
                    warn!(error = %e, "Format conversion failed, proceeding with original file");
                }
            }
        }
        let ladder_source = normalized.as_ref().map_or(source, |m| m.path());

        let mut current: Option<ProcessedMedia> = None;
        for level in &VIDEO_LADDER {
            if let Some(previous) = current.take() {
                previous.discard();
            }

            let output = ProcessedMedia::owned(temp_path(&dir, TempKind::Video));
            self.transcoder
                .encode_level(ladder_source, output.path(), level)
                .await?;

            let size_mb = file_size_mb(output.path()).await?;
            current = Some(output);

            if size_mb <= limit {
                info!(level = level.index, size_mb, "Video is under the limit");
                break;
            }
            if usize::from(level.index) == VIDEO_LADDER.len() {
                warn!(
                    size_mb,
                    attempts = VIDEO_LADDER.len(),
                    "Video still over the limit, sending best compressed version"
                );
            } else {
                warn!(
                    level = level.index,
                    size_mb,
                    limit,
                    "Video still too large, trying more aggressive compression"
                );
            }
        }

        // The ladder is non-empty and every iteration either stores an
        // artifact or returns early with an error.
        current.ok_or_else(|| {
            DeliveryError::TranscodeFailure(mediarelay_av::Error::InvalidInput(
                "compression ladder produced no output".to_string(),
            ))
        })
    }
}
