//! REST endpoints for monitor status and the subject profile.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{Method, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::error::ProfileError;
use crate::pipeline::monitor::MonitorStats;
use crate::profile::ProfileStore;

/// Shared state for the control routes.
#[derive(Clone)]
pub struct ApiState {
    pub profile: ProfileStore,
    pub stats: Arc<MonitorStats>,
    /// Classifier availability as reported at startup.
    pub classifier: String,
    pub poll_interval: Duration,
}

/// GET /
async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Placement alert monitor is running",
    }))
}

/// GET /api/status
async fn get_status(State(state): State<ApiState>) -> impl IntoResponse {
    let stats = state.stats.snapshot().await;
    Json(serde_json::json!({
        "status": "running",
        "classifier": state.classifier,
        "poll_interval_secs": state.poll_interval.as_secs(),
        "stats": stats,
    }))
}

/// GET /api/profile
async fn get_profile(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.profile.snapshot().await.to_map())
}

/// POST /api/profile
///
/// Accepts a partial map of profile keys. String and numeric values are
/// accepted; anything else is rejected with its key.
async fn update_profile(
    State(state): State<ApiState>,
    Json(body): Json<serde_json::Map<String, serde_json::Value>>,
) -> impl IntoResponse {
    let mut changes = BTreeMap::new();
    let mut malformed = Vec::new();
    for (key, value) in body {
        match value {
            serde_json::Value::String(s) => {
                changes.insert(key, s);
            }
            serde_json::Value::Number(n) => {
                changes.insert(key, n.to_string());
            }
            _ => malformed.push(key),
        }
    }

    match state.profile.update(&changes).await {
        Ok((profile, mut outcome)) => {
            outcome.rejected.extend(malformed);
            Json(serde_json::json!({
                "message": "Profile updated",
                "profile": profile.to_map(),
                "applied": outcome.applied,
                "rejected": outcome.rejected,
            }))
            .into_response()
        }
        Err(ProfileError::NoRecognizedFields { mut rejected }) => {
            rejected.extend(malformed);
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "No recognized profile fields provided",
                    "rejected": rejected,
                })),
            )
                .into_response()
        }
    }
}

/// Build the control routes.
pub fn api_routes(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(root))
        .route("/api/status", get(get_status))
        .route("/api/profile", get(get_profile).post(update_profile))
        .layer(cors)
        .with_state(state)
}
