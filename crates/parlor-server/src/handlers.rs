//! HTTP handlers for the Parlor server.
//!
//! Clients identify themselves with the `User` header and poll for new
//! messages; there is no push channel.

use crate::config::{Config, StoreBackend};
use crate::error::ApiError;
use crate::metrics;
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use parlor_core::{
    parse_limit, MemoryStore, Message, MessageQuery, Participant, Room, SqliteStore, Store,
    Sweeper,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Header carrying the caller's participant name.
pub const USER_HEADER: &str = "user";

/// Shared server state.
pub struct AppState {
    /// The chat room.
    pub room: Room,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state over an already opened store.
    #[must_use]
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        Self {
            room: Room::with_config(store, config.room()),
            config,
        }
    }
}

/// Body of `POST /participants`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinRequest {
    /// Requested participant name.
    pub name: String,
}

/// Body of `POST /messages`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostMessageRequest {
    /// Recipient name, or the broadcast marker.
    pub to: String,
    /// Message text.
    pub text: String,
    /// `message` or `private_message`.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Query of `GET /messages`.
#[derive(Debug, Deserialize)]
pub struct MessagesParams {
    /// Maximum number of messages; parsed leniently.
    pub limit: Option<String>,
}

/// Open the store selected by the configuration.
///
/// # Errors
///
/// Returns an error if the SQLite database cannot be opened.
pub async fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Sqlite => Arc::new(
            SqliteStore::connect(&config.store.database_url)
                .await
                .with_context(|| {
                    format!("Failed to open database: {}", config.store.database_url)
                })?,
        ),
    };
    Ok(store)
}

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let max_body = state.config.limits.max_body_bytes;

    Router::new()
        .route("/participants", get(list_participants).post(join))
        .route("/messages", get(list_messages).post(post_message))
        .route("/status", post(heartbeat))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server and the eviction sweeper until shutdown.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the server fails to
/// start.
pub async fn run_server(config: Config) -> Result<()> {
    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let store = open_store(&config).await?;
    let state = Arc::new(AppState::new(config.clone(), store));

    let token = CancellationToken::new();
    let sweeper = Arc::new(
        Sweeper::new(state.room.clone(), config.sweeper()).with_observer(metrics::record_sweep),
    );
    let sweeper_handle = sweeper.spawn(token.clone());

    let app = build_router(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Parlor server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    token.cancel();
    if let Err(e) = sweeper_handle.await {
        error!(error = %e, "Sweeper task failed");
    }

    info!("Parlor server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

/// The caller's name from the `User` header, if present and valid UTF-8.
fn user(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_HEADER)
        .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// `POST /participants`
async fn join(
    State(state): State<Arc<AppState>>,
    body: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(body) = body?;
    state.room.join(&body.name).await?;
    metrics::record_join();
    Ok(StatusCode::CREATED)
}

/// `GET /participants`
async fn list_participants(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Participant>>, ApiError> {
    Ok(Json(state.room.participants().await?))
}

/// `POST /messages`
async fn post_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<PostMessageRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(body) = body?;
    let sender = user(&headers).unwrap_or_default();
    let message = state
        .room
        .post_message(sender, &body.to, &body.text, &body.kind)
        .await?;
    metrics::record_message(message.kind.as_str());
    Ok(StatusCode::CREATED)
}

/// `GET /messages?limit=N`
async fn list_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<MessagesParams>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let query = MessageQuery {
        viewer: user(&headers).map(str::to_string),
        limit: params.limit.as_deref().and_then(parse_limit),
    };
    Ok(Json(state.room.messages(query).await?))
}

/// `POST /status`
async fn heartbeat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let name = user(&headers).unwrap_or_default();
    state.room.heartbeat(name).await?;
    Ok(StatusCode::CREATED)
}
