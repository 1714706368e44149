use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::FutureExt;
use prometheus::{Encoder, TextEncoder};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use super::state::ServeState;
use crate::errors::RenewalError;
use crate::metrics;
use crate::renewal::{self, FeeSummary, PaymentRequest, RenewalRequest};

pub fn build_router(state: ServeState) -> Router {
    Router::new()
        .route("/query/price/tennessee", post(quote_handler))
        .route("/complete/tennessee", post(complete_handler))
        .route("/health", get(health_handler))
        .route("/livez", get(live_handler))
        .route("/readyz", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

impl IntoResponse for RenewalError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            Json(json!({
                "detail": self.public_message(),
                "fault": self.fault(),
            })),
        )
            .into_response()
    }
}

async fn quote_handler(
    State(state): State<ServeState>,
    Json(request): Json<RenewalRequest>,
) -> Result<Json<FeeSummary>, RenewalError> {
    let context = state.context.clone();
    let summary = state
        .pool
        .run(move |session| {
            async move { renewal::quote(session, &context, &request).await }.boxed()
        })
        .await?;
    Ok(Json(summary))
}

async fn complete_handler(
    State(state): State<ServeState>,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<FeeSummary>, RenewalError> {
    let context = state.context.clone();
    let summary = state
        .pool
        .run(move |session| {
            async move { renewal::complete(session, &context, &request).await }.boxed()
        })
        .await?;
    Ok(Json(summary))
}

async fn health_handler(State(state): State<ServeState>) -> Json<Value> {
    let snapshot = state.health_snapshot();
    Json(json!({
        "status": "ok",
        "live": snapshot.live,
        "ready": snapshot.ready,
        "uptime_secs": snapshot.uptime_secs,
        "active_sessions": snapshot.active_sessions,
        "session_limit": snapshot.session_limit,
    }))
}

async fn live_handler(State(state): State<ServeState>) -> impl IntoResponse {
    let snapshot = state.health_snapshot();
    let status = if snapshot.live {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "live": snapshot.live })))
}

async fn ready_handler(State(state): State<ServeState>) -> impl IntoResponse {
    let snapshot = state.health_snapshot();
    let status = if snapshot.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "ready": snapshot.ready,
            "active_sessions": snapshot.active_sessions,
            "session_limit": snapshot.session_limit,
        })),
    )
}

async fn metrics_handler() -> Response {
    metrics::register_metrics();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metrics::global_registry().gather(), &mut buffer) {
        error!(?err, "failed to encode prometheus metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response();
    }

    match String::from_utf8(buffer) {
        Ok(body) => match HeaderValue::from_str(encoder.format_type()) {
            Ok(content_type) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
            Err(err) => {
                error!(?err, "failed to build content-type header for metrics");
                (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response()
            }
        },
        Err(err) => {
            error!(?err, "failed to convert prometheus metrics to utf8");
            (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response()
        }
    }
}
