//! # mediarelay-av
//!
//! Transcoding engine boundary for mediarelay.
//!
//! This crate provides:
//! - The [`TranscodingEngine`] trait the delivery pipeline drives
//! - [`EncodeRequest`], a builder for a single re-encode and its ffmpeg arguments
//! - [`Ffmpeg`], an engine that shells out to the ffmpeg/ffprobe CLIs
//! - Locating and versioning the ffmpeg/ffprobe pair
//!
//! ## Features
//!
//! - `tracing` - Enable tracing support
//!
//! ## Example
//!
//! ```no_run
//! use mediarelay_av::{Ffmpeg, StreamSelector, TranscodingEngine};
//! use std::path::Path;
//!
//! # async fn run() -> mediarelay_av::Result<()> {
//! let engine = Ffmpeg::locate(None, None)?;
//! let codec = engine
//!     .probe_codec(Path::new("/path/to/clip.mp4"), StreamSelector::Video)
//!     .await?;
//! println!("Video codec: {:?}", codec);
//! # Ok(())
//! # }
//! ```

mod encode;
mod engine;
mod error;
mod ffmpeg;
pub mod tools;

// Re-exports
pub use encode::EncodeRequest;
pub use engine::{StreamSelector, TranscodingEngine};
pub use error::{Error, Result};
pub use ffmpeg::{Ffmpeg, DEFAULT_PROBE_TIMEOUT};
pub use tools::{inspect, Tool, ToolStatus};
