use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use nnpd_core::registry::VerdictRegistry;
use subtle::ConstantTimeEq;

use crate::metrics;

#[derive(Clone)]
pub struct DetectorState {
    pub registry: VerdictRegistry,
    pub ready: Arc<AtomicBool>,
    pub auth_token: Option<String>,
}

/// Build the three-route detector HTTP surface, plus a human greeting at `/`.
pub fn router(state: DetectorState) -> Router {
    let protected = Router::new()
        .route("/v1/health/", post(liveness))
        .route("/v1/nodehealth/", post(nodehealth))
        .route("/v1/metrics/", get(metrics_text))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/", get(greeting))
        .merge(protected)
        .with_state(state)
}

async fn greeting() -> &'static str {
    "nnpd detector\n"
}

async fn liveness(State(state): State<DetectorState>) -> StatusCode {
    if state.ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn nodehealth(State(state): State<DetectorState>) -> impl IntoResponse {
    let snapshot = state.registry.snapshot().await;
    Json(snapshot)
}

async fn metrics_text() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        metrics::gather_metrics(),
    )
}

async fn require_auth(
    State(state): State<DetectorState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = &state.auth_token else {
        return next.run(request).await;
    };

    let expected_header = format!("Basic {}", STANDARD.encode(expected));
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(header) if constant_time_eq(header.as_bytes(), expected_header.as_bytes()) => {
            next.run(request).await
        }
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
