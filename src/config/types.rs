use mediarelay_av::{Ffmpeg, ToolStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub policy: DeliveryPolicy,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on one `/send/enhanced` request. The delivery itself keeps
    /// running after the response is abandoned.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_request_timeout() -> u64 {
    1200
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Size thresholds, bitrates and retry bounds for the delivery pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryPolicy {
    /// Files at or below this size are sent unmodified.
    #[serde(default = "default_no_compression_limit")]
    pub no_compression_limit_mb: f64,

    /// Files above this size are rejected outright.
    #[serde(default = "default_max_input_size")]
    pub max_input_size_mb: f64,

    /// Audio above this size gets the heavy bitrate.
    #[serde(default = "default_audio_tier_limit")]
    pub audio_tier_limit_mb: f64,

    #[serde(default = "default_audio_bitrate_light")]
    pub audio_bitrate_light: String,

    #[serde(default = "default_audio_bitrate_heavy")]
    pub audio_bitrate_heavy: String,

    /// x264 preset used for normalization and every ladder level.
    #[serde(default = "default_video_preset")]
    pub video_preset: String,

    #[serde(default = "default_attempts")]
    pub upload_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub upload_retry_delay_ms: u64,

    #[serde(default = "default_attempts")]
    pub resolve_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub resolve_retry_delay_ms: u64,

    /// Directory for temporary artifacts (defaults to the input's directory).
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

fn default_no_compression_limit() -> f64 {
    70.0
}
fn default_max_input_size() -> f64 {
    700.0
}
fn default_audio_tier_limit() -> f64 {
    70.0
}
fn default_audio_bitrate_light() -> String {
    "128k".to_string()
}
fn default_audio_bitrate_heavy() -> String {
    "64k".to_string()
}
fn default_video_preset() -> String {
    "fast".to_string()
}
fn default_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    3000
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            no_compression_limit_mb: default_no_compression_limit(),
            max_input_size_mb: default_max_input_size(),
            audio_tier_limit_mb: default_audio_tier_limit(),
            audio_bitrate_light: default_audio_bitrate_light(),
            audio_bitrate_heavy: default_audio_bitrate_heavy(),
            video_preset: default_video_preset(),
            upload_attempts: default_attempts(),
            upload_retry_delay_ms: default_retry_delay_ms(),
            resolve_attempts: default_attempts(),
            resolve_retry_delay_ms: default_retry_delay_ms(),
            work_dir: None,
        }
    }
}

impl DeliveryPolicy {
    pub fn upload_retry_delay(&self) -> Duration {
        Duration::from_millis(self.upload_retry_delay_ms)
    }

    pub fn resolve_retry_delay(&self) -> Duration {
        Duration::from_millis(self.resolve_retry_delay_ms)
    }
}

/// Connection and lifecycle settings for the messaging session sidecar.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Base URL of the browser-automation sidecar.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Recipient label that addresses the sender's own status feed.
    #[serde(default = "default_status_label")]
    pub status_label: String,

    /// Suffix appended to phone numbers to form a direct-contact handle.
    #[serde(default = "default_contact_suffix")]
    pub contact_suffix: String,

    #[serde(default = "default_broadcast_id")]
    pub broadcast_id: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    #[serde(default = "default_init_retry_delay")]
    pub init_retry_delay_secs: u64,

    #[serde(default = "default_reset_delay")]
    pub reset_delay_secs: u64,

    /// Timeout for a single session state poll.
    #[serde(default = "default_state_timeout")]
    pub state_timeout_secs: u64,

    /// Per-request timeout for the remaining bridge calls (uploads of large
    /// files included).
    #[serde(default = "default_bridge_timeout")]
    pub request_timeout_secs: u64,
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:3100".to_string()
}
fn default_status_label() -> String {
    "הסטטוס שלי".to_string()
}
fn default_contact_suffix() -> String {
    "c.us".to_string()
}
fn default_broadcast_id() -> String {
    "status@broadcast".to_string()
}
fn default_poll_interval() -> u64 {
    2
}
fn default_reconnect_delay() -> u64 {
    5
}
fn default_init_retry_delay() -> u64 {
    10
}
fn default_reset_delay() -> u64 {
    2
}
fn default_state_timeout() -> u64 {
    crate::session::DEFAULT_STATE_TIMEOUT.as_secs()
}
fn default_bridge_timeout() -> u64 {
    600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            status_label: default_status_label(),
            contact_suffix: default_contact_suffix(),
            broadcast_id: default_broadcast_id(),
            poll_interval_secs: default_poll_interval(),
            reconnect_delay_secs: default_reconnect_delay(),
            init_retry_delay_secs: default_init_retry_delay(),
            reset_delay_secs: default_reset_delay(),
            state_timeout_secs: default_state_timeout(),
            request_timeout_secs: default_bridge_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Upper bound on one ffprobe run.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_probe_timeout() -> u64 {
    mediarelay_av::DEFAULT_PROBE_TIMEOUT.as_secs()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl ToolsConfig {
    /// Locate ffmpeg and ffprobe with the configured paths and probe timeout.
    pub fn locate_engine(&self) -> mediarelay_av::Result<Ffmpeg> {
        let engine = Ffmpeg::locate(self.ffmpeg_path.as_deref(), self.ffprobe_path.as_deref())?;
        Ok(engine.with_probe_timeout(Duration::from_secs(self.probe_timeout_secs)))
    }

    /// Report both tools as [`locate_engine`](Self::locate_engine) would find them.
    pub fn inspect(&self) -> [ToolStatus; 2] {
        mediarelay_av::inspect(self.ffmpeg_path.as_deref(), self.ffprobe_path.as_deref())
    }
}
