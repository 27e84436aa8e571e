//! Process-wide owner of the messaging session lifecycle.

use super::{
    ChatHandle, ChatSummary, MediaPayload, MessagingSession, SendOptions, SessionError,
    SessionEvent, SessionState,
};
use crate::config::SessionConfig;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Status reported by the sidecar for its client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Starting,
    Qr,
    Authenticated,
    Ready,
    Disconnected,
    AuthFailure,
}

/// Snapshot of the sidecar's client state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RemoteState {
    pub state: RemoteStatus,
    #[serde(default)]
    pub qr: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl RemoteState {
    /// The lifecycle event this snapshot announces, if any.
    fn event(&self) -> Option<SessionEvent> {
        let reason = || self.reason.clone().unwrap_or_default();
        match self.state {
            RemoteStatus::Starting => None,
            RemoteStatus::Qr => Some(SessionEvent::Qr(self.qr.clone().unwrap_or_default())),
            RemoteStatus::Authenticated => Some(SessionEvent::Authenticated),
            RemoteStatus::Ready => Some(SessionEvent::Ready),
            RemoteStatus::Disconnected => Some(SessionEvent::Disconnected(reason())),
            RemoteStatus::AuthFailure => Some(SessionEvent::AuthFailure(reason())),
        }
    }
}

/// Raw operations against whatever hosts the messaging client.
#[async_trait::async_trait]
pub trait SessionBackend: Send + Sync {
    async fn start(&self) -> Result<(), SessionError>;
    async fn destroy(&self) -> Result<(), SessionError>;
    async fn remote_state(&self) -> Result<RemoteState, SessionError>;
    async fn get_chat(&self, id: &str) -> Result<Option<ChatSummary>, SessionError>;
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, SessionError>;
    async fn send_media(
        &self,
        chat_id: &str,
        media: &MediaPayload,
        options: &SendOptions,
    ) -> Result<(), SessionError>;
}

/// Delays that drive polling and reinitialization.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub poll_interval: Duration,
    /// Upper bound on one state poll; a hung sidecar counts as unreachable.
    pub poll_timeout: Duration,
    pub reconnect_delay: Duration,
    pub init_retry_delay: Duration,
    pub reset_delay: Duration,
}

impl From<&SessionConfig> for LifecycleSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            poll_timeout: Duration::from_secs(config.state_timeout_secs.max(1)),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
            init_retry_delay: Duration::from_secs(config.init_retry_delay_secs),
            reset_delay: Duration::from_secs(config.reset_delay_secs),
        }
    }
}

/// Point-in-time view for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub ready: bool,
    pub qr: Option<String>,
}

/// Reinitialization request sent to the supervisor.
#[derive(Debug, Clone, Copy)]
struct ReinitRequest {
    delay: Duration,
    /// Fixed when requested, so a slow supervisor turn does not push it back.
    due: Instant,
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    qr: Option<String>,
    /// Set by a crash signature; ignores `ready` reports until reinitialized.
    crashed: bool,
    last_remote: Option<RemoteState>,
}

/// Shared session handle.
///
/// Cloned as `Arc<SessionManager>` into the server and every delivery. The
/// state can change between any two calls, so every capability re-checks it.
pub struct SessionManager {
    backend: Arc<dyn SessionBackend>,
    settings: LifecycleSettings,
    inner: RwLock<Inner>,
    reinit_tx: mpsc::UnboundedSender<ReinitRequest>,
}

impl SessionManager {
    /// Create the manager and the supervisor that drives it.
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        settings: LifecycleSettings,
    ) -> (Arc<Self>, SessionSupervisor) {
        let (reinit_tx, reinit_rx) = mpsc::unbounded_channel();
        let manager = Arc::new(Self {
            backend,
            settings,
            inner: RwLock::new(Inner {
                state: SessionState::Uninitialized,
                qr: None,
                crashed: false,
                last_remote: None,
            }),
            reinit_tx,
        });

        let supervisor = SessionSupervisor {
            manager: Arc::clone(&manager),
            reinit_rx,
        };

        (manager, supervisor)
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.read();
        SessionSnapshot {
            state: inner.state,
            ready: inner.state == SessionState::Ready,
            qr: inner.qr.clone(),
        }
    }

    /// Ask the supervisor to (re)initialize after `delay`.
    fn request_reinitialize(&self, delay: Duration) {
        let request = ReinitRequest {
            delay,
            due: Instant::now() + delay,
        };
        if self.reinit_tx.send(request).is_err() {
            debug!("Session supervisor is gone; reinitialization not scheduled");
        }
    }

    /// Start a fresh client on the sidecar.
    ///
    /// On failure the session is marked disconnected and another attempt is
    /// scheduled after the init retry delay.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        info!("Initializing messaging session");
        {
            let mut inner = self.inner.write();
            inner.state = SessionState::Authenticating;
            inner.crashed = false;
            inner.last_remote = None;
        }

        match self.backend.start().await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(error = %e, "Failed to initialize messaging session");
                self.inner.write().state = SessionState::Disconnected;
                self.request_reinitialize(self.settings.init_retry_delay);
                Err(e)
            }
        }
    }

    /// Tear down the client and reinitialize after the reset delay.
    pub async fn reset(&self) -> Result<(), SessionError> {
        info!("Resetting messaging session");
        self.backend.destroy().await?;

        {
            let mut inner = self.inner.write();
            inner.state = SessionState::Uninitialized;
            inner.qr = None;
            inner.crashed = false;
            inner.last_remote = None;
        }

        self.request_reinitialize(self.settings.reset_delay);
        Ok(())
    }

    /// Apply one lifecycle event.
    pub fn handle_event(&self, event: SessionEvent) {
        let mut inner = self.inner.write();
        match event {
            SessionEvent::Qr(code) => {
                info!("QR code received");
                inner.state = SessionState::Authenticating;
                inner.qr = Some(code);
            }
            SessionEvent::Authenticated => {
                info!("Messaging session authenticated");
            }
            SessionEvent::Ready => {
                if inner.crashed {
                    debug!("Ignoring ready report for a crashed session");
                    return;
                }
                info!("Messaging session is ready");
                inner.state = SessionState::Ready;
                inner.qr = None;
            }
            SessionEvent::Disconnected(reason) => {
                warn!(%reason, "Messaging session disconnected");
                inner.state = SessionState::Disconnected;
                drop(inner);
                self.request_reinitialize(self.settings.reconnect_delay);
            }
            SessionEvent::AuthFailure(message) => {
                error!(%message, "Messaging session authentication failed");
                inner.state = SessionState::AuthFailed;
            }
        }
    }

    /// Fetch the sidecar's state and dispatch any change as an event.
    pub async fn poll(&self) {
        let remote = tokio::time::timeout(self.settings.poll_timeout, self.backend.remote_state())
            .await
            .unwrap_or_else(|_| {
                Err(SessionError::Transport(format!(
                    "session state request timed out after {}s",
                    self.settings.poll_timeout.as_secs()
                )))
            });

        match remote {
            Ok(remote) => {
                let changed = self.inner.read().last_remote.as_ref() != Some(&remote);
                if !changed {
                    return;
                }
                let event = remote.event();
                self.inner.write().last_remote = Some(remote);
                if let Some(event) = event {
                    self.handle_event(event);
                }
            }
            Err(e) => {
                let was_ready = self.state() == SessionState::Ready;
                if was_ready {
                    self.inner.write().last_remote = None;
                    self.handle_event(SessionEvent::Disconnected(format!(
                        "sidecar unreachable: {e}"
                    )));
                } else {
                    debug!(error = %e, "Session state poll failed");
                }
            }
        }
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(SessionError::NotReady)
        }
    }
}

#[async_trait::async_trait]
impl MessagingSession for SessionManager {
    fn is_ready(&self) -> bool {
        self.inner.read().state == SessionState::Ready
    }

    async fn get_chat_by_id(&self, id: &str) -> Result<Option<ChatHandle>, SessionError> {
        self.ensure_ready()?;
        Ok(self.backend.get_chat(id).await?.map(ChatHandle::from))
    }

    async fn get_chats(&self) -> Result<Vec<ChatSummary>, SessionError> {
        self.ensure_ready()?;
        self.backend.list_chats().await
    }

    async fn send_message(
        &self,
        chat: &ChatHandle,
        media: &MediaPayload,
        options: &SendOptions,
    ) -> Result<(), SessionError> {
        self.ensure_ready()?;
        self.backend.send_media(chat.id(), media, options).await
    }

    fn mark_crashed(&self, reason: &str) {
        let mut inner = self.inner.write();
        warn!(%reason, "Marking messaging session as not ready after crash");
        inner.crashed = true;
        if inner.state == SessionState::Ready {
            inner.state = SessionState::Disconnected;
        }
    }
}

/// Background task that polls the sidecar and performs scheduled reinitialization.
pub struct SessionSupervisor {
    manager: Arc<SessionManager>,
    reinit_rx: mpsc::UnboundedReceiver<ReinitRequest>,
}

impl SessionSupervisor {
    /// Initialize the session, then supervise it until shutdown.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Session supervisor started");

        if until_shutdown(&mut shutdown, self.manager.initialize())
            .await
            .is_none()
        {
            info!("Session supervisor stopped");
            return;
        }

        let mut ticker = tokio::time::interval(self.manager.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut reinit_at: Option<Instant> = None;

        loop {
            let deadline = reinit_at.unwrap_or_else(Instant::now);
            let finished = tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    changed.is_err() || *shutdown.borrow()
                }
                Some(request) = self.reinit_rx.recv() => {
                    debug!(
                        delay_ms = request.delay.as_millis() as u64,
                        "Reinitialization scheduled"
                    );
                    reinit_at = Some(request.due);
                    false
                }
                _ = tokio::time::sleep_until(deadline), if reinit_at.is_some() => {
                    reinit_at = None;
                    info!("Attempting to reinitialize messaging session");
                    until_shutdown(&mut shutdown, self.manager.initialize())
                        .await
                        .is_none()
                }
                _ = ticker.tick() => {
                    until_shutdown(&mut shutdown, self.manager.poll()).await.is_none()
                }
            };
            if finished {
                break;
            }
        }

        info!("Session supervisor stopped");
    }
}

/// Drive `work` to completion unless shutdown is signalled first.
async fn until_shutdown<F: std::future::Future>(
    shutdown: &mut watch::Receiver<bool>,
    work: F,
) -> Option<F::Output> {
    tokio::select! {
        output = work => Some(output),
        _ = shutdown.wait_for(|stop| *stop) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeBackend {
        starts: AtomicUsize,
        destroys: AtomicUsize,
        fail_start: bool,
        /// State polls never answer.
        hang_state: bool,
        remote: Mutex<Option<RemoteState>>,
        chats: Vec<ChatSummary>,
        sends: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SessionBackend for FakeBackend {
        async fn start(&self) -> Result<(), SessionError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                Err(SessionError::Transport("connection refused".to_string()))
            } else {
                Ok(())
            }
        }

        async fn destroy(&self) -> Result<(), SessionError> {
            self.destroys.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn remote_state(&self) -> Result<RemoteState, SessionError> {
            if self.hang_state {
                std::future::pending::<()>().await;
            }
            self.remote
                .lock()
                .clone()
                .ok_or_else(|| SessionError::Transport("down".to_string()))
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
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn settings() -> LifecycleSettings {
        LifecycleSettings {
            poll_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(3),
            reconnect_delay: Duration::from_secs(5),
            init_retry_delay: Duration::from_secs(10),
            reset_delay: Duration::from_secs(2),
        }
    }

    fn remote(state: RemoteStatus) -> RemoteState {
        RemoteState {
            state,
            qr: None,
            reason: None,
        }
    }

    #[test]
    fn test_lifecycle_events() {
        let (manager, _supervisor) =
            SessionManager::new(Arc::new(FakeBackend::default()), settings());
        assert_eq!(manager.state(), SessionState::Uninitialized);

        manager.handle_event(SessionEvent::Qr("2@abc".to_string()));
        let snap = manager.snapshot();
        assert_eq!(snap.state, SessionState::Authenticating);
        assert_eq!(snap.qr.as_deref(), Some("2@abc"));
        assert!(!snap.ready);

        manager.handle_event(SessionEvent::Ready);
        let snap = manager.snapshot();
        assert!(snap.ready);
        assert!(snap.qr.is_none());

        manager.handle_event(SessionEvent::AuthFailure("bad".to_string()));
        assert_eq!(manager.state(), SessionState::AuthFailed);
        assert!(!manager.is_ready());
    }

    #[test]
    fn test_disconnect_schedules_reconnect() {
        let (manager, mut supervisor) =
            SessionManager::new(Arc::new(FakeBackend::default()), settings());
        manager.handle_event(SessionEvent::Ready);
        manager.handle_event(SessionEvent::Disconnected("NAVIGATION".to_string()));

        assert_eq!(manager.state(), SessionState::Disconnected);
        assert_eq!(supervisor.reinit_rx.try_recv().unwrap().delay, Duration::from_secs(5));
    }

    #[test]
    fn test_crash_latch_ignores_ready_until_reinit() {
        let (manager, _supervisor) =
            SessionManager::new(Arc::new(FakeBackend::default()), settings());
        manager.handle_event(SessionEvent::Ready);
        manager.mark_crashed("detached Frame");
        assert!(!manager.is_ready());

        manager.handle_event(SessionEvent::Ready);
        assert!(!manager.is_ready());
    }

    #[tokio::test]
    async fn test_initialize_clears_crash_latch() {
        let (manager, _supervisor) =
            SessionManager::new(Arc::new(FakeBackend::default()), settings());
        manager.handle_event(SessionEvent::Ready);
        manager.mark_crashed("Target closed");

        manager.initialize().await.unwrap();
        manager.handle_event(SessionEvent::Ready);
        assert!(manager.is_ready());
    }

    #[tokio::test]
    async fn test_failed_initialize_schedules_retry() {
        let backend = Arc::new(FakeBackend {
            fail_start: true,
            ..Default::default()
        });
        let (manager, mut supervisor) = SessionManager::new(backend.clone(), settings());

        assert!(manager.initialize().await.is_err());
        assert_eq!(manager.state(), SessionState::Disconnected);
        assert_eq!(backend.starts.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.reinit_rx.try_recv().unwrap().delay, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_reset_destroys_and_schedules() {
        let backend = Arc::new(FakeBackend::default());
        let (manager, mut supervisor) = SessionManager::new(backend.clone(), settings());
        manager.handle_event(SessionEvent::Qr("code".to_string()));

        manager.reset().await.unwrap();
        let snap = manager.snapshot();
        assert_eq!(snap.state, SessionState::Uninitialized);
        assert!(snap.qr.is_none());
        assert_eq!(backend.destroys.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.reinit_rx.try_recv().unwrap().delay, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_capabilities_gate_on_readiness() {
        let backend = Arc::new(FakeBackend {
            chats: vec![ChatSummary {
                id: "1@c.us".to_string(),
                name: Some("Alice".to_string()),
            }],
            ..Default::default()
        });
        let (manager, _supervisor) = SessionManager::new(backend.clone(), settings());

        assert_eq!(manager.get_chats().await.unwrap_err(), SessionError::NotReady);
        assert_eq!(
            manager.get_chat_by_id("1@c.us").await.unwrap_err(),
            SessionError::NotReady
        );

        manager.handle_event(SessionEvent::Ready);
        let chat = manager.get_chat_by_id("1@c.us").await.unwrap().unwrap();
        assert_eq!(chat.name(), Some("Alice"));

        let media = MediaPayload::from_path(std::path::Path::new("/tmp/a.mp4"));
        manager
            .send_message(&chat, &media, &SendOptions::default())
            .await
            .unwrap();
        assert_eq!(backend.sends.load(Ordering::SeqCst), 1);

        manager.mark_crashed("t");
        assert_eq!(
            manager
                .send_message(&chat, &media, &SendOptions::default())
                .await
                .unwrap_err(),
            SessionError::NotReady
        );
        assert_eq!(backend.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_dispatches_changes_once() {
        let backend = Arc::new(FakeBackend::default());
        let (manager, mut supervisor) = SessionManager::new(backend.clone(), settings());

        *backend.remote.lock() = Some(RemoteState {
            state: RemoteStatus::Qr,
            qr: Some("qr-1".to_string()),
            reason: None,
        });
        manager.poll().await;
        assert_eq!(manager.snapshot().qr.as_deref(), Some("qr-1"));

        *backend.remote.lock() = Some(remote(RemoteStatus::Ready));
        manager.poll().await;
        assert!(manager.is_ready());

        *backend.remote.lock() = Some(remote(RemoteStatus::Disconnected));
        manager.poll().await;
        manager.poll().await;
        assert_eq!(manager.state(), SessionState::Disconnected);
        // Repeated identical reports schedule only one reconnect
        assert!(supervisor.reinit_rx.try_recv().is_ok());
        assert!(supervisor.reinit_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_poll_failure_while_ready_disconnects() {
        let backend = Arc::new(FakeBackend::default());
        let (manager, mut supervisor) = SessionManager::new(backend.clone(), settings());
        manager.handle_event(SessionEvent::Ready);

        manager.poll().await;
        assert_eq!(manager.state(), SessionState::Disconnected);
        assert!(supervisor.reinit_rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_runs_scheduled_reinit() {
        let backend = Arc::new(FakeBackend::default());
        let (manager, supervisor) = SessionManager::new(backend.clone(), settings());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(supervisor.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(backend.starts.load(Ordering::SeqCst), 1);

        manager.handle_event(SessionEvent::Disconnected("LOGOUT".to_string()));
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(backend.starts.load(Ordering::SeqCst), 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    fn hung_backend() -> Arc<FakeBackend> {
        Arc::new(FakeBackend {
            hang_state: true,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_poll_times_out_and_disconnects() {
        let (manager, mut supervisor) = SessionManager::new(hung_backend(), settings());
        manager.handle_event(SessionEvent::Ready);

        let start = Instant::now();
        manager.poll().await;

        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < Duration::from_secs(4));
        assert_eq!(manager.state(), SessionState::Disconnected);
        assert!(supervisor.reinit_rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_stops_during_hung_poll() {
        let (_manager, supervisor) = SessionManager::new(hung_backend(), settings());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(supervisor.run(shutdown_rx));
        // The first tick has started a poll that will not answer
        tokio::time::sleep(Duration::from_secs(1)).await;

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("supervisor should stop while a poll is in flight")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_not_stalled_by_hung_poll() {
        let backend = hung_backend();
        let (manager, supervisor) = SessionManager::new(backend.clone(), settings());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(supervisor.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(backend.starts.load(Ordering::SeqCst), 1);

        manager.handle_event(SessionEvent::Disconnected("LOGOUT".to_string()));
        // Reconnect delay plus at most one poll timeout
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(backend.starts.load(Ordering::SeqCst), 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
