//! Encode requests and their ffmpeg argument rendering.

use std::path::{Path, PathBuf};

/// A single re-encode operation handed to a [`TranscodingEngine`].
///
/// Every field other than the paths is optional; unset options are left to
/// the engine's defaults.
///
/// [`TranscodingEngine`]: crate::TranscodingEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeRequest {
    /// Source file.
    pub input: PathBuf,
    /// Destination file, overwritten if present.
    pub output: PathBuf,
    /// Video encoder (e.g. `libx264`).
    pub video_codec: Option<String>,
    /// Audio encoder (e.g. `aac`).
    pub audio_codec: Option<String>,
    /// Audio bitrate (e.g. `128k`).
    pub audio_bitrate: Option<String>,
    /// Constant rate factor for the video encoder.
    pub crf: Option<u32>,
    /// Encoder speed preset.
    pub preset: Option<String>,
    /// Video filter expression for scaling.
    pub scale: Option<String>,
    /// Output audio channel count.
    pub audio_channels: Option<u8>,
    /// Stream selection (e.g. `0:a:0`).
    pub map: Option<String>,
    /// Move the moov atom to the front for progressive playback.
    pub faststart: bool,
}

impl EncodeRequest {
    /// Create a request with no encoder options set.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            video_codec: None,
            audio_codec: None,
            audio_bitrate: None,
            crf: None,
            preset: None,
            scale: None,
            audio_channels: None,
            map: None,
            faststart: false,
        }
    }

    pub fn video_codec(mut self, codec: impl Into<String>) -> Self {
        self.video_codec = Some(codec.into());
        self
    }

    pub fn audio_codec(mut self, codec: impl Into<String>) -> Self {
        self.audio_codec = Some(codec.into());
        self
    }

    pub fn audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.audio_bitrate = Some(bitrate.into());
        self
    }

    pub fn crf(mut self, crf: u32) -> Self {
        self.crf = Some(crf);
        self
    }

    pub fn preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    /// Cap the video width at `max_width`, keeping aspect ratio with an even height.
    pub fn max_width(mut self, max_width: u32) -> Self {
        self.scale = Some(format!("scale='min({},iw)':-2", max_width));
        self
    }

    pub fn audio_channels(mut self, channels: u8) -> Self {
        self.audio_channels = Some(channels);
        self
    }

    pub fn map(mut self, selector: impl Into<String>) -> Self {
        self.map = Some(selector.into());
        self
    }

    pub fn faststart(mut self) -> Self {
        self.faststart = true;
        self
    }

    /// Source path.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Destination path.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Render the full ffmpeg argument vector, input and output included.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            self.input.to_string_lossy().to_string(),
        ];

        if let Some(ref selector) = self.map {
            args.extend(["-map".to_string(), selector.clone()]);
        }

        if let Some(ref codec) = self.video_codec {
            args.extend(["-c:v".to_string(), codec.clone()]);
        }
        if let Some(ref preset) = self.preset {
            args.extend(["-preset".to_string(), preset.clone()]);
        }
        if let Some(crf) = self.crf {
            args.extend(["-crf".to_string(), crf.to_string()]);
        }
        if let Some(ref scale) = self.scale {
            args.extend(["-vf".to_string(), scale.clone()]);
        }

        if let Some(ref codec) = self.audio_codec {
            args.extend(["-c:a".to_string(), codec.clone()]);
        }
        if let Some(ref bitrate) = self.audio_bitrate {
            args.extend(["-b:a".to_string(), bitrate.clone()]);
        }
        if let Some(channels) = self.audio_channels {
            args.extend(["-ac".to_string(), channels.to_string()]);
        }

        if self.faststart {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}
