//! Mediarelay-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across mediarelay:
//!
//! - **Typed IDs**: Type-safe UUID wrapper for delivery jobs
//! - **Core Types**: Media kinds and attachment modes
//! - **Path Utilities**: Extension-based media classification and MIME mapping
//!
//! # Examples
//!
//! ```
//! use mediarelay_common::{JobId, MediaKind};
//! use mediarelay_common::paths::{media_kind, mime_type};
//! use std::path::Path;
//!
//! let job_id = JobId::new();
//! assert!(!job_id.to_string().is_empty());
//!
//! assert_eq!(media_kind(Path::new("clip.mkv")), MediaKind::Video);
//! assert_eq!(mime_type(Path::new("song.mp3")), "audio/mpeg");
//! ```

pub mod ids;
pub mod paths;
pub mod types;

pub use ids::*;
pub use types::*;
