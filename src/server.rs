//! HTTP API server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/query` | Answer a question, with sources and session id |
//! | `GET`  | `/api/courses` | Course count, titles and lesson counts |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Every failure is a 500 with a single message field:
//!
//! ```json
//! { "detail": "No course found matching 'X'" }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser frontend
//! served from anywhere can call the API.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use course_rag_core::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::ingest;
use crate::progress::NoProgress;
use crate::rag::{CourseAnalytics, RagSystem};
use crate::sqlite_store::SqliteStore;
use crate::tools::Source;

#[derive(Clone)]
struct AppState {
    rag: Arc<RagSystem>,
}

/// Starts the HTTP server on `[server].bind` with the SQLite store.
///
/// When `[server].ingest_on_start` is set, `[docs].root` is ingested first;
/// ingest failures are logged and do not stop the server.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = Arc::new(SqliteStore::open(config).await?);

    if config.server.ingest_on_start {
        match ingest::ingest_dir(config, store.as_ref(), &config.docs.root, false, &NoProgress)
            .await
        {
            Ok(run) => tracing::info!(
                courses = run.report.courses.len(),
                chunks = run.chunks_written,
                skipped = run.report.skipped.len(),
                "ingested docs on startup"
            ),
            Err(e) => tracing::error!("startup ingest failed: {:#}", e),
        }
    }

    let rag = RagSystem::new(config, store as Arc<dyn Store>)?;
    serve(config, Arc::new(rag)).await
}

/// Serve an already-built [`RagSystem`].
pub async fn serve(config: &Config, rag: Arc<RagSystem>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(rag);

    println!("crag server listening on http://{}", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(rag: Arc<RagSystem>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/query", post(handle_query))
        .route("/api/courses", get(handle_courses))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { rag })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Converts any handler error into `500 {"detail": ...}`.
struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                detail: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    sources: Vec<Source>,
    session_id: String,
}

/// Answers a question. A missing `session_id` starts a new session.
async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(AppError(anyhow::anyhow!("query must not be empty")));
    }

    let session_id = match req.session_id {
        Some(id) if !id.is_empty() => id,
        _ => state.rag.sessions().create_session(),
    };

    let answer = state.rag.query(&req.query, Some(&session_id)).await?;

    Ok(Json(QueryResponse {
        answer: answer.answer,
        sources: answer.sources,
        session_id,
    }))
}

// ============ GET /api/courses ============

async fn handle_courses(
    State(state): State<AppState>,
) -> Result<Json<CourseAnalytics>, AppError> {
    Ok(Json(state.rag.course_analytics().await?))
}
