use crate::delivery::MediaJob;
use crate::server::AppContext;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/status", get(status))
        .route("/qr", get(qr))
        .route("/reset", post(reset))
        .route("/send/enhanced", post(send_enhanced))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ready: bool,
    #[serde(rename = "hasQR")]
    pub has_qr: bool,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct QrResponse {
    pub qr: Option<String>,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub file_path: PathBuf,
    pub wa_chat_id: String,
    #[serde(default)]
    pub template_payload: String,
}

async fn status(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    let snapshot = ctx.session.snapshot();
    Json(StatusResponse {
        ready: snapshot.ready,
        has_qr: snapshot.qr.is_some(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn qr(State(ctx): State<AppContext>) -> Json<QrResponse> {
    let snapshot = ctx.session.snapshot();
    let response = match snapshot.qr {
        Some(code) => QrResponse {
            qr: Some(code),
            message: "Scan this QR code with WhatsApp",
        },
        None if snapshot.ready => QrResponse {
            qr: None,
            message: "Already authenticated",
        },
        None => QrResponse {
            qr: None,
            message: "Initializing...",
        },
    };
    Json(response)
}

async fn reset(State(ctx): State<AppContext>) -> Response {
    match ctx.session.reset().await {
        Ok(()) => Json(json!({
            "success": true,
            "message": "Session reset, reinitializing",
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Session reset failed: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Runs the delivery as a detached task. On timeout the response is
/// abandoned but the task keeps going, cleanup included.
async fn send_enhanced(
    State(ctx): State<AppContext>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::warn!("Rejected send request: {}", rejection.body_text());
            return failure(rejection.status(), rejection.body_text());
        }
    };
    let job = MediaJob::new(req.file_path, req.wa_chat_id, req.template_payload);
    let orchestrator = ctx.orchestrator.clone();

    let handle = tokio::spawn(async move { orchestrator.deliver(&job).await });

    match tokio::time::timeout(ctx.request_timeout, handle).await {
        Ok(Ok(outcome)) => Json(outcome).into_response(),
        Ok(Err(e)) => {
            tracing::error!("Delivery task failed: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, format!("delivery task failed: {e}"))
        }
        Err(_) => {
            tracing::warn!(
                "Delivery exceeded {}s, abandoning response",
                ctx.request_timeout.as_secs()
            );
            failure(
                StatusCode::GATEWAY_TIMEOUT,
                format!(
                    "delivery timed out after {}s",
                    ctx.request_timeout.as_secs()
                ),
            )
        }
    }
}

fn failure(status: StatusCode, error: String) -> Response {
    (status, Json(json!({ "success": false, "error": error }))).into_response()
}
