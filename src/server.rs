//! HTTP status server for dashboards and other local clients.
//!
//! Endpoints:
//! - `GET /health`
//! - `GET /api/posture_thresholds`: current thresholds under their external names
//! - `GET /api/health_conditions`: posture-related health information
//! - `GET /api/status`: latest frame report and session statistics
//! - `POST /api/reset`: ask the tick loop to reset the session
//!
//! # Architecture
//!
//! ```text
//! tick loop ──→ report channel ──→ consumer ──→ ServerState ←── GET /api/status
//!     ↑
//!     └──────────── SessionCommand::Reset ←──────────────────── POST /api/reset
//! ```

use crate::core::{FrameReport, Thresholds};
use crate::health::{health_conditions, HealthCondition};
use crate::session::SessionCommand;
use crate::stats::{SessionStats, SharedSessionLog};
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{watch, RwLock};
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

/// State shared between the handlers and the report consumer.
pub struct ServerState {
    latest: RwLock<Option<FrameReport>>,
    thresholds: watch::Receiver<Thresholds>,
    log: SharedSessionLog,
    commands: UnboundedSender<SessionCommand>,
}

impl ServerState {
    /// `thresholds` follows the values the tick loop is currently using.
    pub fn new(
        thresholds: watch::Receiver<Thresholds>,
        log: SharedSessionLog,
        commands: UnboundedSender<SessionCommand>,
    ) -> Arc<Self> {
        Arc::new(Self {
            latest: RwLock::new(None),
            thresholds,
            log,
            commands,
        })
    }

    pub async fn publish_report(&self, report: FrameReport) {
        *self.latest.write().await = Some(report);
    }

    /// Publish from a thread outside the runtime.
    pub fn blocking_publish_report(&self, report: FrameReport) {
        *self.latest.blocking_write() = Some(report);
    }

    pub fn thresholds(&self) -> Thresholds {
        *self.thresholds.borrow()
    }

    pub async fn latest_report(&self) -> Option<FrameReport> {
        self.latest.read().await.clone()
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Status response
#[derive(Serialize)]
pub struct StatusResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_report: Option<FrameReport>,
    pub stats: SessionStats,
    pub thresholds: Thresholds,
}

/// Response from the reset endpoint
#[derive(Serialize)]
pub struct ResetResponse {
    pub status: String,
    pub message: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/posture_thresholds
async fn posture_thresholds(State(state): State<Arc<ServerState>>) -> Json<HashMap<String, f64>> {
    Json(state.thresholds().to_named().into_iter().collect())
}

/// GET /api/health_conditions
async fn conditions() -> Json<BTreeMap<&'static str, HealthCondition>> {
    Json(health_conditions())
}

/// GET /api/status
async fn status(State(state): State<Arc<ServerState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        latest_report: state.latest_report().await,
        stats: state.log.stats(),
        thresholds: state.thresholds(),
    })
}

/// POST /api/reset
async fn reset(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<ResetResponse>, (StatusCode, Json<ErrorResponse>)> {
    state.commands.send(SessionCommand::Reset).map_err(|_| {
        tracing::warn!("Reset requested but the posture loop is not running");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Posture loop is not running".to_string(),
                code: "LOOP_STOPPED".to_string(),
            }),
        )
    })?;

    Ok(Json(ResetResponse {
        status: "ok".to_string(),
        message: "Reset requested".to_string(),
    }))
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    state: Arc<ServerState>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = Router::new()
        .route("/health", get(health))
        .route("/api/posture_thresholds", get(posture_thresholds))
        .route("/api/health_conditions", get(conditions))
        .route("/api/status", get(status))
        .route("/api/reset", post(reset))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Posture agent server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
