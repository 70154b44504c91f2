use crate::metrics::{self, RequestMetrics};
use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use pvc_plumber_backends::Backend;
use percent_encoding::percent_decode_str;
use serde_json::json;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{info, warn};

const EXISTS_ROOT: &str = "/exists";
const EXISTS_PREFIX: &str = "/exists/";
const INVALID_PATH: &str = "invalid path format, expected /exists/{namespace}/{pvc}";

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub metrics: Arc<RequestMetrics>,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            metrics: Arc::new(RequestMetrics::new()),
        }
    }
}

/// `/exists/` is a subtree, so it is dispatched from the fallback on the raw path.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(export_metrics))
        .fallback(subtree)
        .with_state(state)
}

/// Splits `/exists/{namespace}/{pvc}`. Everything after the namespace's
/// trailing slash is the pvc.
pub fn parse_exists_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix(EXISTS_PREFIX)?;
    let (namespace, pvc) = rest.split_once('/')?;
    if namespace.is_empty() || pvc.is_empty() {
        return None;
    }
    Some((namespace, pvc))
}

/// Percent-decodes the request path. `%2F` becomes a real separator.
pub fn decode_path(raw: &str) -> Cow<'_, str> {
    percent_decode_str(raw).decode_utf8_lossy()
}

async fn subtree(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    let path = decode_path(uri.path());
    // A bare `/exists` is an existence request missing both segments.
    if path != EXISTS_ROOT && !path.starts_with(EXISTS_PREFIX) {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response();
    }
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    exists(&state, &path).await
}

async fn exists(state: &AppState, path: &str) -> Response {
    state.metrics.record_request();

    let Some((namespace, pvc)) = parse_exists_path(path) else {
        state.metrics.record_error();
        warn!(path = %path, "invalid request path");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "exists": false, "error": INVALID_PATH })),
        )
            .into_response();
    };

    info!(namespace = %namespace, pvc = %pvc, "checking backup");

    let result = state.backend.check_backup_exists(namespace, pvc).await;
    if result.is_error() {
        state.metrics.record_error();
    }

    info!(
        namespace = %namespace,
        pvc = %pvc,
        exists = result.exists,
        backend = %result.backend,
        "backup check complete"
    );

    // Backend failures are still a 200; callers read `error` from the body.
    Json(result).into_response()
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readyz() -> Json<serde_json::Value> {
    healthz().await
}

async fn export_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, metrics::CONTENT_TYPE)],
        state.metrics.render(),
    )
}
