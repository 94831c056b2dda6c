//! HTTP adapter: a JSON inbound-mail webhook in front of the router.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use mail_parser::MessageParser;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::ServerError;
use crate::message::{InboundMessage, join_addresses};
use crate::router::Router as MailRouter;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<MailRouter>,
    pub route_timeout: Duration,
}

/// Webhook body. Envelope fields win over the message headers when given.
#[derive(Debug, Deserialize)]
pub struct InboundPayload {
    pub from: Option<String>,
    pub to: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    /// Base64 of the full RFC 822 message.
    pub raw: String,
}

impl InboundPayload {
    /// Decode the raw message and fill missing envelope fields from its headers.
    pub fn into_message(self) -> Result<InboundMessage, String> {
        let bytes = BASE64
            .decode(self.raw.trim())
            .map_err(|e| format!("raw is not valid base64: {e}"))?;

        let parsed = MessageParser::default().parse(&bytes);
        let from_header = || parsed.as_ref().and_then(|m| join_addresses(m.from()));
        let to_header = || parsed.as_ref().and_then(|m| join_addresses(m.to()));
        let cc_header = || parsed.as_ref().and_then(|m| join_addresses(m.cc()));

        let from = self.from.or_else(from_header).unwrap_or_default();
        let mut message = InboundMessage::new(from, bytes.as_slice());
        message.to = self.to.or_else(to_header);
        message.cc = self.cc.or_else(cc_header);
        message.bcc = self.bcc;
        Ok(message)
    }
}

/// Build the Axum router with the webhook and health routes.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/inbound", post(inbound))
        .with_state(state)
}

/// Bind the webhook listener on all interfaces.
pub async fn bind(port: u16) -> crate::Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
    Ok(listener)
}

/// Serve until the process is stopped.
pub async fn serve(listener: TcpListener, state: AppState) -> crate::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Webhook listening on http://{addr}/inbound");
    }
    axum::serve(listener, routes(state))
        .await
        .map_err(ServerError::from)?;
    Ok(())
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mailroute"
    }))
}

// ── Inbound ─────────────────────────────────────────────────────────────

async fn inbound(
    State(state): State<AppState>,
    payload: Result<Json<InboundPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    let message = match payload.into_message() {
        Ok(m) => m,
        Err(reason) => return bad_request(reason),
    };

    match tokio::time::timeout(state.route_timeout, state.router.route(&message)).await {
        Ok(report) => (StatusCode::ACCEPTED, Json(report)).into_response(),
        Err(_) => {
            warn!(
                from = %message.from,
                timeout_secs = state.route_timeout.as_secs(),
                "Routing timed out"
            );
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(serde_json::json!({"error": "Routing timed out"})),
            )
                .into_response()
        }
    }
}

fn bad_request(reason: String) -> Response {
    warn!(reason = %reason, "Rejected inbound payload");
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": reason})),
    )
        .into_response()
}
