//! HTTP server: shared state, router, and startup

use crate::model;
use crate::response::ApiError;
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use onnxedit_core::{Error, ServerConfig, SessionKey};
use onnxedit_editor::SessionStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;

pub struct AppState {
    pub config: ServerConfig,
    pub sessions: SessionStore,
    pub started_at: std::time::Instant,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            sessions: SessionStore::new(),
            started_at: std::time::Instant::now(),
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();
    let body_limit = state.config.max_upload_bytes;

    let mut app = Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/python_version", get(version_handler))
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/:key", delete(delete_session))
        .route("/model/open", post(model::open))
        .route("/model/assign_node_ids", post(model::assign_node_ids))
        .route("/model/edit", post(model::edit))
        .route("/model/save", get(model::save).post(model::save))
        .route("/model/cleanup", get(model::cleanup))
        .route("/model/fold_constants", get(model::fold_constants))
        .route("/model/nodes", get(model::nodes))
        .route("/model/inspect", get(model::inspect));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let bind_addr: SocketAddr = format!("{}:{}", config.bind.to_addr(), config.port).parse()?;

    info!("onnxedit v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: http://{}", bind_addr);
    info!("  Default session: {}", config.default_session);
    info!("  Edit failures: {:?}", config.edit_failures);
    match &config.static_dir {
        Some(dir) => info!("  GUI assets: {}", dir.display()),
        None => info!("  GUI assets: none (API only)"),
    }

    let app = build_router(Arc::new(AppState::new(config)));
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.len(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

/// Connectivity check the GUI sends before anything else.
async fn version_handler() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

async fn create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let key = state.sessions.create();
    Json(serde_json::json!({ "session": key }))
}

async fn list_sessions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.sessions.summaries().await)
}

/// Drop a session and the model it holds. The default session comes back
/// empty on its next use.
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let key = SessionKey::new(key);
    state
        .sessions
        .remove(&key)
        .ok_or_else(|| Error::SessionNotFound(key.clone()))?;
    info!("Deleted session: {}", key);
    Ok(Json(serde_json::json!({ "ok": true })))
}
