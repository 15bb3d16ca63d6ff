use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use loan_engine::dropdowns::DropdownSource;
use loan_engine::error::AppError;
use loan_engine::{engine_router, LoanEngineService};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

pub(crate) fn with_operational_routes<S>(service: Arc<LoanEngineService<S>>) -> axum::Router
where
    S: DropdownSource,
{
    engine_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/admin/rules/reload",
            axum::routing::post(reload_rules_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({
            "status": "ready",
            "rule_version": state.store.snapshot().version(),
        })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Re-read the configured rule source and swap it in. A rejected table leaves
/// the active one serving.
pub(crate) async fn reload_rules_endpoint(
    Extension(state): Extension<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let version = state.store.reload(state.rules.as_ref()).map_err(|err| {
        warn!(error = %err, source = %state.rules.describe(), "rule reload rejected");
        AppError::from(err)
    })?;
    let snapshot = state.store.snapshot();

    Ok(Json(json!({
        "status": "success",
        "rule_version": version,
        "rules": snapshot.rules().count(),
        "source": snapshot.source(),
        "loaded_at": snapshot.loaded_at(),
    })))
}
