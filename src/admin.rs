//! Admin HTTP surface: health, counters, the user list and broadcasts.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures::StreamExt;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::channels::Channel;
use crate::interactions::{InteractionKind, InteractionLog};
use crate::store::UserStore;

/// Header carrying the admin key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Broadcast sends in flight at once.
const BROADCAST_CONCURRENCY: usize = 8;

/// Shared state for admin routes.
#[derive(Clone)]
pub struct AdminState {
    pub store: Arc<UserStore>,
    pub channel: Arc<dyn Channel>,
    pub log: InteractionLog,
    /// Set once the transport is connected.
    pub ready: Arc<AtomicBool>,
    pub started_at: Instant,
    pub api_key: Option<SecretString>,
    pub send_timeout: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCounts {
    pub total: usize,
    pub active: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub users: UserCounts,
    pub timestamp: chrono::DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub name: String,
    pub active: bool,
    pub goal: Option<Decimal>,
    /// Minutes between reminders.
    pub interval: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BroadcastRequest {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastResponse {
    pub sent: usize,
    pub total: usize,
}

/// GET /health
async fn health(State(state): State<AdminState>) -> impl IntoResponse {
    let ready = state.ready.load(Ordering::SeqCst);
    let status = if ready { "healthy" } else { "unhealthy" };
    Json(serde_json::json!({
        "status": status,
        "timestamp": Utc::now(),
    }))
}

/// GET /api/status
async fn status(State(state): State<AdminState>) -> Json<StatusResponse> {
    let ready = state.ready.load(Ordering::SeqCst);
    Json(StatusResponse {
        status: if ready { "online" } else { "offline" }.to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        users: UserCounts {
            total: state.store.count().await,
            active: state.store.active_users().await.len(),
        },
        timestamp: Utc::now(),
    })
}

/// GET /api/users
async fn users(State(state): State<AdminState>) -> Json<Vec<UserSummary>> {
    let users = state
        .store
        .all_users()
        .await
        .into_iter()
        .map(|(_, record)| UserSummary {
            active: record.is_active(),
            goal: record.water_goal,
            interval: record.reminder_interval_minutes(),
            name: record.name,
        })
        .collect();
    Json(users)
}

fn authorized(state: &AdminState, headers: &HeaderMap) -> bool {
    let Some(expected) = &state.api_key else {
        return false;
    };
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|given| given == expected.expose_secret())
}

/// POST /api/broadcast
///
/// The key is checked before the body is parsed.
async fn broadcast(State(state): State<AdminState>, headers: HeaderMap, body: Bytes) -> Response {
    if !authorized(&state, &headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Unauthorized"})),
        )
            .into_response();
    }

    let body: BroadcastRequest = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": format!("Invalid request body: {e}")})),
            )
                .into_response();
        }
    };

    let message = body.message.trim().to_string();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Message is required"})),
        )
            .into_response();
    }

    let recipients = state.store.active_users().await;
    let total = recipients.len();
    let message = message.as_str();
    let state = &state;

    let outcomes: Vec<bool> = futures::stream::iter(recipients)
        .map(|(user_id, _)| async move {
            let result =
                tokio::time::timeout(state.send_timeout, state.channel.send(&user_id, message))
                    .await;
            match result {
                Ok(Ok(())) => {
                    state
                        .log
                        .append(&user_id, InteractionKind::Broadcast, message);
                    true
                }
                Ok(Err(e)) => {
                    tracing::warn!(user_id = %user_id, error = %e, "Broadcast send failed");
                    false
                }
                Err(_) => {
                    tracing::warn!(user_id = %user_id, "Broadcast send timed out");
                    false
                }
            }
        })
        .buffer_unordered(BROADCAST_CONCURRENCY)
        .collect()
        .await;
    let sent = outcomes.into_iter().filter(|ok| *ok).count();

    tracing::info!(sent, total, "Broadcast finished");
    Json(BroadcastResponse { sent, total }).into_response()
}

/// Build the admin routes.
pub fn admin_routes(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/users", get(users))
        .route("/api/broadcast", post(broadcast))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
