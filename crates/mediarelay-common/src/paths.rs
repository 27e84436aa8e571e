//! Path utilities for classifying media files by extension.
//!
//! Classification drives both the compression path (audio tiers versus the
//! video ladder) and how a file is attached when it is uploaded.

use crate::types::MediaKind;
use std::path::Path;

/// Video containers handled by the compression ladder and format inspection.
const VIDEO_CONTAINERS: &[&str] = &["mp4", "mov", "avi", "mkv"];

/// Audio containers handled by the bitrate tier re-encode.
const AUDIO_CONTAINERS: &[&str] = &["mp3", "wav", "m4a"];

/// Fallback MIME type for anything not in the table.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if a path has a video container extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use mediarelay_common::paths::is_video_container;
///
/// assert!(is_video_container(Path::new("clip.mkv")));
/// assert!(is_video_container(Path::new("/path/to/clip.MOV")));
/// assert!(!is_video_container(Path::new("song.mp3")));
/// ```
pub fn is_video_container(path: &Path) -> bool {
    lowercase_extension(path)
        .map(|ext| VIDEO_CONTAINERS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Check if a path has an audio container extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use mediarelay_common::paths::is_audio_container;
///
/// assert!(is_audio_container(Path::new("voice.m4a")));
/// assert!(!is_audio_container(Path::new("clip.mp4")));
/// ```
pub fn is_audio_container(path: &Path) -> bool {
    lowercase_extension(path)
        .map(|ext| AUDIO_CONTAINERS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Classify a path into the media kind that selects its compression path.
pub fn media_kind(path: &Path) -> MediaKind {
    if is_video_container(path) {
        MediaKind::Video
    } else if is_audio_container(path) {
        MediaKind::Audio
    } else {
        MediaKind::Other
    }
}

/// Map a file extension to the MIME type used for upload.
///
/// Only a fixed table is recognized; everything else is sent as
/// `application/octet-stream`.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use mediarelay_common::paths::mime_type;
///
/// assert_eq!(mime_type(Path::new("clip.mp4")), "video/mp4");
/// assert_eq!(mime_type(Path::new("archive.zip")), "application/octet-stream");
/// ```
pub fn mime_type(path: &Path) -> &'static str {
    match lowercase_extension(path).as_deref() {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        _ => DEFAULT_MIME_TYPE,
    }
}
