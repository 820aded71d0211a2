//! Hafiz HTTP API
//!
//! Thin axum transport over the engine workflow. Routes mirror the
//! service's public contract:
//!
//! - POST /chat - Process a message (optional session for memory)
//! - GET /chat/session/:id/history - Get conversation history
//! - DELETE /chat/session/:id - Clear a session
//! - GET /cache/stats - Cache statistics
//! - POST /cache/invalidate - Invalidate cache entries
//! - POST /cache/cleanup - Evict entries older than a max age
//! - GET /cache/health - Cache health banding
//! - GET / - Service descriptor
//! - GET /health - Liveness check
//!
//! All responses are JSON. CORS is fully permissive.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use hafiz_engine::workflow::Workflow;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Default max entry age for POST /cache/cleanup, in seconds
const DEFAULT_CLEANUP_MAX_AGE_SECS: u64 = 3600;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<Workflow>,
}

/// Chat request body
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
}

/// Cache invalidation request body
#[derive(Debug, Deserialize)]
pub struct CacheInvalidateRequest {
    pub query: Option<String>,
    pub intent: Option<String>,
    #[serde(default)]
    pub clear_all: bool,
}

/// Cache cleanup request body
#[derive(Debug, Deserialize, Default)]
pub struct CacheCleanupRequest {
    pub max_age_secs: Option<u64>,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/session/:session_id/history", get(session_history_handler))
        .route("/chat/session/:session_id", delete(clear_session_handler))
        .route("/cache/stats", get(cache_stats_handler))
        .route("/cache/invalidate", post(cache_invalidate_handler))
        .route("/cache/cleanup", post(cache_cleanup_handler))
        .route("/cache/health", get(cache_health_handler))
        .route("/health", get(health_handler))
        .route("/", get(root_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Chat endpoint with conversation memory. A missing session_id starts
/// a fresh session under a generated id, returned to the caller.
async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    if payload.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Message must not be empty"})),
        )
            .into_response());
    }

    let session_id = payload
        .session_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::info!(%session_id, "chat request received");

    let output = state.workflow.run(&payload.message, &session_id).await;

    Ok(Json(json!({
        "response": output.content,
        "type": output.kind,
        "metadata": output.metadata,
        "session_id": session_id,
    })))
}

/// Conversation history for a session, oldest-first
async fn session_history_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<serde_json::Value> {
    let history = state.workflow.sessions().get_history(&session_id);

    Json(json!({
        "session_id": session_id,
        "message_count": history.len(),
        "messages": history,
    }))
}

/// Clear a session's conversation history
async fn clear_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<serde_json::Value> {
    if state.workflow.sessions().clear(&session_id) {
        Json(json!({
            "message": format!("Session {} cleared", session_id),
            "success": true,
        }))
    } else {
        Json(json!({
            "message": format!("Session {} not found", session_id),
            "success": false,
        }))
    }
}

/// Cache statistics endpoint
async fn cache_stats_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.workflow.cache().stats();

    Json(json!({
        "status": "success",
        "message": format!("Cache hit rate: {}", stats.hit_rate),
        "cache_stats": stats,
    }))
}

/// Invalidate cache entries: the whole cache, or one query across
/// namespaces, or one (query, intent) pair
async fn cache_invalidate_handler(
    State(state): State<AppState>,
    Json(payload): Json<CacheInvalidateRequest>,
) -> Json<serde_json::Value> {
    if payload.clear_all {
        let removed = state.workflow.cache().invalidate_all();
        tracing::info!(removed, "cache cleared");
        return Json(json!({
            "status": "success",
            "message": "All cache entries cleared",
            "action": "clear_all",
        }));
    }

    if let Some(query) = payload.query.as_deref() {
        state
            .workflow
            .cache()
            .invalidate(payload.intent.as_deref(), Some(query));

        let preview: String = query.chars().take(50).collect();
        return Json(json!({
            "status": "success",
            "message": format!("Cache invalidated for query: {}...", preview),
            "action": "invalidate_query",
        }));
    }

    Json(json!({
        "status": "error",
        "message": "Must provide either clear_all=true or query parameter",
    }))
}

/// Evict cache entries older than the requested max age
async fn cache_cleanup_handler(
    State(state): State<AppState>,
    payload: Option<Json<CacheCleanupRequest>>,
) -> Json<serde_json::Value> {
    let max_age_secs = payload
        .and_then(|Json(p)| p.max_age_secs)
        .unwrap_or(DEFAULT_CLEANUP_MAX_AGE_SECS);

    let removed = state
        .workflow
        .cache()
        .cleanup_older_than(chrono_duration(max_age_secs));
    let stats = state.workflow.cache().stats();

    Json(json!({
        "status": "success",
        "message": "Expired entries cleaned up",
        "removed_entries": removed,
        "current_cache_size": stats.cache_size,
    }))
}

fn chrono_duration(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(i64::MAX as u64) as i64)
}

/// Cache health endpoint with a coarse hit-rate banding
async fn cache_health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.workflow.cache().stats();
    let hit_rate = state.workflow.cache().hit_rate_percent();

    let (health, recommendation) = if hit_rate >= 50.0 {
        ("excellent", "Cache is performing optimally")
    } else if hit_rate >= 30.0 {
        ("good", "Cache is working well")
    } else if hit_rate >= 10.0 {
        ("fair", "Consider increasing TTL or reviewing query patterns")
    } else {
        ("poor", "Review caching strategy - many cache misses")
    };

    Json(json!({
        "status": "healthy",
        "cache_health": health,
        "statistics": stats,
        "recommendations": recommendation,
    }))
}

/// Service descriptor
async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Hafiz AI API",
        "version": env!("CARGO_PKG_VERSION"),
        "features": [
            "Conversation Memory",
            "Advanced Prompting",
            "Response Caching",
        ],
        "endpoints": {
            "chat": "/chat",
            "cache_stats": "/cache/stats",
            "cache_invalidate": "/cache/invalidate",
            "cache_health": "/cache/health",
        },
    }))
}

/// Liveness check
async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "api": "running",
        "features": {
            "memory": true,
            "caching": true,
            "advanced_prompting": true,
        },
    }))
}
