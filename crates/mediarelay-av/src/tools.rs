//! Locating and versioning the ffmpeg/ffprobe pair.

use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// An executable the engine shells out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
}

impl Tool {
    pub const ALL: [Tool; 2] = [Tool::Ffmpeg, Tool::Ffprobe];

    pub fn name(self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
        }
    }

    /// Find the executable. A configured path that exists wins over PATH.
    pub fn resolve(self, configured: Option<&Path>) -> Result<PathBuf> {
        match configured {
            Some(path) if path.exists() => Ok(path.to_path_buf()),
            _ => which::which(self.name()).map_err(|_| Error::tool_not_found(self.name())),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where one tool resolved to and which release answered.
#[derive(Debug, Clone)]
pub struct ToolStatus {
    pub tool: Tool,
    pub path: Option<PathBuf>,
    /// Release from the `-version` banner, e.g. `6.1.1`.
    pub version: Option<String>,
}

impl ToolStatus {
    /// Resolved and answered `-version`.
    pub fn is_usable(&self) -> bool {
        self.version.is_some()
    }
}

/// Inspect both tools using the same lookup as [`Ffmpeg::locate`](crate::Ffmpeg::locate).
///
/// # Example
///
/// ```no_run
/// for status in mediarelay_av::inspect(None, None) {
///     println!("{}: {:?}", status.tool, status.version);
/// }
/// ```
pub fn inspect(ffmpeg: Option<&Path>, ffprobe: Option<&Path>) -> [ToolStatus; 2] {
    [status(Tool::Ffmpeg, ffmpeg), status(Tool::Ffprobe, ffprobe)]
}

fn status(tool: Tool, configured: Option<&Path>) -> ToolStatus {
    let path = tool.resolve(configured).ok();
    let version = path.as_deref().and_then(|exe| {
        let output = Command::new(exe).arg("-version").output().ok()?;
        if !output.status.success() {
            return None;
        }
        parse_release(tool, &String::from_utf8_lossy(&output.stdout))
    });

    ToolStatus {
        tool,
        path,
        version,
    }
}

/// Pull the release out of a `<tool> version <release> Copyright ...` banner.
fn parse_release(tool: Tool, banner: &str) -> Option<String> {
    banner
        .lines()
        .next()?
        .trim()
        .strip_prefix(tool.name())?
        .trim_start()
        .strip_prefix("version")?
        .split_whitespace()
        .next()
        .map(str::to_string)
}
