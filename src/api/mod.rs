//! HTTP surface: read API, live WebSocket endpoint, optional dashboard.
//!
//! Endpoints:
//! - `GET /api/health`: health check
//! - `GET /api/latest`: newest event, 404 when there is none
//! - `GET /api/recent?limit=N`: newest events first, 20 by default
//! - `GET /ws`: live event stream

use std::path::Path;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::event::Event;
use crate::fanout::{run_session, LiveFanout};

pub mod query;

pub use query::{QueryError, QueryService, DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT};

/// Body returned with 404 from `/api/latest`.
pub const NOT_FOUND_MESSAGE: &str = "No data found.";
/// Body returned with every 500.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
/// Body returned with 400 for an unusable `limit`.
pub const INVALID_LIMIT_MESSAGE: &str = "Invalid limit";

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct ApiState {
    pub query: Arc<QueryService>,
    pub fanout: Arc<LiveFanout>,
    /// Closes live sessions when the process shuts down.
    pub shutdown: CancellationToken,
}

/// Build the axum router (separated for testing).
///
/// With `static_dir`, unmatched paths are served from that directory,
/// `index.html` included at `/`.
pub fn router(state: ApiState, static_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/api/health", get(health))
        .route("/api/latest", get(latest))
        .route("/api/recent", get(recent))
        .route("/ws", get(live));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` is cancelled.
///
/// In-flight requests finish; live sessions close on the same token.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn latest(State(state): State<ApiState>) -> Result<Json<Event>, ApiError> {
    state
        .query
        .get_latest()
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

#[derive(Debug, Deserialize)]
struct RecentParams {
    limit: Option<i64>,
}

async fn recent(
    State(state): State<ApiState>,
    params: Result<Query<RecentParams>, QueryRejection>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let Query(params) = params.map_err(|rejection| {
        debug!(error = %rejection.body_text(), "rejected recent query");
        ApiError::InvalidLimit
    })?;
    let limit = state.query.resolve_limit(params.limit);
    Ok(Json(state.query.get_recent(Some(limit)).await?))
}

async fn live(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state.fanout, state.shutdown))
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

/// Errors surfaced to HTTP callers. Bodies are fixed strings; causes are
/// logged, never returned.
#[derive(Debug)]
pub enum ApiError {
    NotFound,
    InvalidLimit,
    Internal,
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        error!(error = %e, "query failed");
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE),
            ApiError::InvalidLimit => (StatusCode::BAD_REQUEST, INVALID_LIMIT_MESSAGE),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
