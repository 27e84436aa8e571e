//! Shared fakes for integration tests.
//!
//! [`FakeEngine`] writes sparse output files of scripted sizes instead of
//! encoding. [`FakeSession`] is a scriptable [`MessagingSession`] and
//! [`FakeBackend`] a scriptable sidecar for driving a real `SessionManager`.

#![allow(dead_code)]

use async_trait::async_trait;
use mediarelay::config::{Config, DeliveryPolicy};
use mediarelay::session::{
    ChatHandle, ChatSummary, MediaPayload, MessagingSession, RemoteState, SendOptions,
    SessionBackend, SessionError,
};
use mediarelay_av::{EncodeRequest, StreamSelector, TranscodingEngine};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub const MB: u64 = 1024 * 1024;

/// Create a sparse file of `mb` megabytes.
pub fn sparse_file(dir: &Path, name: &str, mb: u64) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).expect("create fixture");
    file.set_len(mb * MB).expect("size fixture");
    path
}

/// Temporary artifacts left in `dir`.
pub fn temp_artifacts(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .expect("read dir")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(mediarelay::delivery::TEMP_PREFIX))
        })
        .collect()
}

/// Default policy with retry waits removed.
pub fn fast_policy() -> DeliveryPolicy {
    DeliveryPolicy {
        upload_retry_delay_ms: 0,
        resolve_retry_delay_ms: 0,
        ..DeliveryPolicy::default()
    }
}

pub fn fast_config() -> Config {
    Config {
        policy: fast_policy(),
        ..Config::default()
    }
}

pub fn chat(id: &str, name: &str) -> ChatSummary {
    ChatSummary {
        id: id.to_string(),
        name: Some(name.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Transcoding engine
// ---------------------------------------------------------------------------

/// Scripted result of one encode call.
#[derive(Debug, Clone, Copy)]
pub enum EncodeStep {
    /// Write an output of this many MB.
    Size(u64),
    Fail,
}

pub struct FakeEngine {
    video_codec: Option<&'static str>,
    audio_codec: Option<&'static str>,
    probe_fails: bool,
    steps: Mutex<VecDeque<EncodeStep>>,
    pub requests: Mutex<Vec<EncodeRequest>>,
    pub probes: AtomicUsize,
}

impl FakeEngine {
    /// Engine reporting H.264 video and AAC audio.
    pub fn compatible() -> Self {
        Self::with_codecs(Some("h264"), Some("aac"))
    }

    pub fn with_codecs(video: Option<&'static str>, audio: Option<&'static str>) -> Self {
        Self {
            video_codec: video,
            audio_codec: audio,
            probe_fails: false,
            steps: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn failing_probe() -> Self {
        Self {
            probe_fails: true,
            ..Self::with_codecs(None, None)
        }
    }

    /// Queue encode results; once exhausted every encode writes 10 MB.
    pub fn steps(self, steps: &[EncodeStep]) -> Self {
        self.steps.lock().extend(steps.iter().copied());
        self
    }

    pub fn encodes(&self) -> Vec<EncodeRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TranscodingEngine for FakeEngine {
    async fn probe_codec(
        &self,
        _path: &Path,
        stream: StreamSelector,
    ) -> mediarelay_av::Result<Option<String>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.probe_fails {
            return Err(mediarelay_av::Error::tool_failed("ffprobe", "invalid data"));
        }
        let codec = match stream {
            StreamSelector::Video => self.video_codec,
            StreamSelector::Audio => self.audio_codec,
        };
        Ok(codec.map(str::to_string))
    }

    async fn encode(&self, request: &EncodeRequest) -> mediarelay_av::Result<()> {
        self.requests.lock().push(request.clone());
        let step = self.steps.lock().pop_front().unwrap_or(EncodeStep::Size(10));

        match step {
            EncodeStep::Size(mb) => {
                let file = std::fs::File::create(request.output())?;
                file.set_len(mb * MB)?;
                Ok(())
            }
            EncodeStep::Fail => {
                // Leave a partial output behind like a crashed encoder would
                std::fs::write(request.output(), b"partial")?;
                Err(mediarelay_av::Error::tool_failed("ffmpeg", "Conversion failed!"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Messaging session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: String,
    pub path: PathBuf,
    pub mimetype: String,
    pub caption: String,
    pub send_as_document: bool,
    /// Size of the file at upload time; `None` if it was missing.
    pub size_mb: Option<f64>,
}

pub struct FakeSession {
    ready: AtomicBool,
    chats: Vec<ChatSummary>,
    chat_errors: Mutex<VecDeque<SessionError>>,
    send_results: Mutex<VecDeque<Result<(), SessionError>>>,
    disconnect_on_send_failure: bool,
    pub sent: Mutex<Vec<SentMessage>>,
    pub crashes: Mutex<Vec<String>>,
    pub get_chats_calls: AtomicUsize,
    pub get_by_id_calls: AtomicUsize,
}

impl FakeSession {
    pub fn ready(chats: Vec<ChatSummary>) -> Self {
        Self {
            ready: AtomicBool::new(true),
            chats,
            chat_errors: Mutex::new(VecDeque::new()),
            send_results: Mutex::new(VecDeque::new()),
            disconnect_on_send_failure: false,
            sent: Mutex::new(Vec::new()),
            crashes: Mutex::new(Vec::new()),
            get_chats_calls: AtomicUsize::new(0),
            get_by_id_calls: AtomicUsize::new(0),
        }
    }

    pub fn not_ready() -> Self {
        let session = Self::ready(Vec::new());
        session.ready.store(false, Ordering::SeqCst);
        session
    }

    /// Errors returned by successive `get_chats` calls before succeeding.
    pub fn chat_errors(self, errors: Vec<SessionError>) -> Self {
        self.chat_errors.lock().extend(errors);
        self
    }

    /// Results of successive uploads; once exhausted uploads succeed.
    pub fn send_results(self, results: Vec<Result<(), SessionError>>) -> Self {
        self.send_results.lock().extend(results);
        self
    }

    pub fn disconnect_on_send_failure(mut self) -> Self {
        self.disconnect_on_send_failure = true;
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl MessagingSession for FakeSession {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn get_chat_by_id(&self, id: &str) -> Result<Option<ChatHandle>, SessionError> {
        self.get_by_id_calls.fetch_add(1, Ordering::SeqCst);
        if !self.is_ready() {
            return Err(SessionError::NotReady);
        }
        Ok(self
            .chats
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .map(ChatHandle::from))
    }

    async fn get_chats(&self) -> Result<Vec<ChatSummary>, SessionError> {
        self.get_chats_calls.fetch_add(1, Ordering::SeqCst);
        if !self.is_ready() {
            return Err(SessionError::NotReady);
        }
        if let Some(err) = self.chat_errors.lock().pop_front() {
            return Err(err);
        }
        Ok(self.chats.clone())
    }

    async fn send_message(
        &self,
        chat: &ChatHandle,
        media: &MediaPayload,
        options: &SendOptions,
    ) -> Result<(), SessionError> {
        if !self.is_ready() {
            return Err(SessionError::NotReady);
        }

        let size_mb = std::fs::metadata(&media.path)
            .ok()
            .map(|m| m.len() as f64 / MB as f64);
        self.sent.lock().push(SentMessage {
            chat_id: chat.id().to_string(),
            path: media.path.clone(),
            mimetype: media.mimetype.clone(),
            caption: options.caption.clone(),
            send_as_document: options.send_as_document,
            size_mb,
        });

        let result = self.send_results.lock().pop_front().unwrap_or(Ok(()));
        if result.is_err() && self.disconnect_on_send_failure {
            self.ready.store(false, Ordering::SeqCst);
        }
        result
    }

    fn mark_crashed(&self, reason: &str) {
        self.crashes.lock().push(reason.to_string());
        self.ready.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Sidecar backend
// ---------------------------------------------------------------------------

pub struct FakeBackend {
    pub chats: Vec<ChatSummary>,
    pub remote: Mutex<Option<RemoteState>>,
    pub send_delay: Duration,
    pub starts: AtomicUsize,
    pub destroys: AtomicUsize,
    pub sends: AtomicUsize,
}

impl FakeBackend {
    pub fn new(chats: Vec<ChatSummary>) -> Self {
        Self {
            chats,
            remote: Mutex::new(None),
            send_delay: Duration::ZERO,
            starts: AtomicUsize::new(0),
            destroys: AtomicUsize::new(0),
            sends: AtomicUsize::new(0),
        }
    }

    pub fn slow_sends(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }
}

#[async_trait]
impl SessionBackend for FakeBackend {
    async fn start(&self) -> Result<(), SessionError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn destroy(&self) -> Result<(), SessionError> {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remote_state(&self) -> Result<RemoteState, SessionError> {
        self.remote
            .lock()
            .clone()
            .ok_or_else(|| SessionError::Transport("connection refused".to_string()))
    }

    async fn get_chat(&self, id: &str) -> Result<Option<ChatSummary>, SessionError> {
        Ok(self.chats.iter().find(|c| c.id == id).cloned())
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>, SessionError> {
        Ok(self.chats.clone())
    }

    async fn send_media(
        &self,
        _chat_id: &str,
        _media: &MediaPayload,
        _options: &SendOptions,
    ) -> Result<(), SessionError> {
        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
