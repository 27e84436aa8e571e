//! ffmpeg/ffprobe-backed [`TranscodingEngine`].

use crate::tools::Tool;
use crate::{EncodeRequest, Error, Result, StreamSelector, TranscodingEngine};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Default upper bound for a single ffprobe invocation.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Lines of ffmpeg stderr kept in a failure message.
const STDERR_TAIL_LINES: usize = 20;

/// Transcoding engine that shells out to the ffmpeg and ffprobe CLIs.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    probe_timeout: Duration,
}

impl Ffmpeg {
    /// Create an engine from explicit executable paths.
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Locate ffmpeg and ffprobe, preferring configured paths over PATH.
    pub fn locate(ffmpeg: Option<&Path>, ffprobe: Option<&Path>) -> Result<Self> {
        Ok(Self::new(
            Tool::Ffmpeg.resolve(ffmpeg)?,
            Tool::Ffprobe.resolve(ffprobe)?,
        ))
    }

    /// Override the ffprobe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    fn spawn_error(tool: &str, e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::tool_not_found(tool)
        } else {
            Error::Io(e)
        }
    }
}

#[async_trait::async_trait]
impl TranscodingEngine for Ffmpeg {
    async fn probe_codec(&self, path: &Path, stream: StreamSelector) -> Result<Option<String>> {
        let mut command = Command::new(&self.ffprobe);
        command
            .args([
                "-v",
                "error",
                "-select_streams",
                stream.specifier(),
                "-show_entries",
                "stream=codec_name",
                "-of",
                "default=noprint_wrappers=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.probe_timeout, command.output())
            .await
            .map_err(|_| Error::timeout("ffprobe", self.probe_timeout.as_secs()))?
            .map_err(|e| Self::spawn_error("ffprobe", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::tool_failed("ffprobe", stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let codec = parse_codec_name(&stdout);

        #[cfg(feature = "tracing")]
        tracing::debug!(path = %path.display(), %stream, codec = ?codec, "probed stream codec");

        Ok(codec)
    }

    async fn encode(&self, request: &EncodeRequest) -> Result<()> {
        if !request.input().exists() {
            return Err(Error::file_not_found(request.input()));
        }

        let args = request.to_args();

        #[cfg(feature = "tracing")]
        tracing::debug!("FFmpeg args: {:?}", args);

        let output = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Self::spawn_error("ffmpeg", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::tool_failed(
                "ffmpeg",
                format!("{} ({})", stderr_tail(&stderr), output.status),
            ));
        }

        Ok(())
    }
}

/// Extract the codec from `codec_name=<name>` lines of ffprobe's default writer.
fn parse_codec_name(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix("codec_name="))
        .map(|name| name.trim().to_lowercase())
        .find(|name| !name.is_empty())
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
