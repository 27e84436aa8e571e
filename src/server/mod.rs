use crate::config::Config;
use crate::delivery::DeliveryOrchestrator;
use crate::session::{BridgeClient, LifecycleSettings, MessagingSession, SessionManager};
use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    Router,
};
use mediarelay_av::TranscodingEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod routes;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    /// Process-wide messaging session
    pub session: Arc<SessionManager>,
    pub orchestrator: Arc<DeliveryOrchestrator>,
    /// Upper bound on one delivery request
    pub request_timeout: Duration,
}

impl AppContext {
    /// Wire an orchestrator to `session` using the configured policy.
    pub fn new(
        config: &Config,
        session: Arc<SessionManager>,
        engine: Arc<dyn TranscodingEngine>,
    ) -> Self {
        let messaging: Arc<dyn MessagingSession> = session.clone();
        let orchestrator =
            DeliveryOrchestrator::new(messaging, engine, config.policy.clone(), &config.session);

        Self {
            session,
            orchestrator: Arc::new(orchestrator),
            request_timeout: config.server.request_timeout(),
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    routes::routes()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Start the session supervisor and the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let engine = config
        .tools
        .locate_engine()
        .context("ffmpeg and ffprobe are required")?;

    let bridge = BridgeClient::from_config(&config.session);
    let (session, supervisor) =
        SessionManager::new(Arc::new(bridge), LifecycleSettings::from(&config.session));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let supervisor_handle = tokio::spawn(supervisor.run(shutdown_rx));

    let ctx = AppContext::new(&config, session, Arc::new(engine));
    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);
    tracing::info!("Session sidecar at {}", config.session.bridge_url);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let _ = shutdown_tx.send(true);
    let _ = supervisor_handle.await;

    tracing::info!("Server shutdown complete");
    result.context("Server error")
}

/// Resolves on SIGINT or SIGTERM. In-flight deliveries drain before the
/// session supervisor is told to stop.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        "SIGINT"
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
        "SIGTERM"
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&str>();

    let received = tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    };

    tracing::info!(signal = received, "Draining deliveries before shutdown");
}
