use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use crate::dropdowns::{DropdownResponse, DropdownSource};
use crate::eligibility::EligibilityPayload;
use crate::refinance::{RefinanceError, RefinancePayload};
use crate::rules::{BusinessPath, RuleLookupError};
use crate::service::{LoanEngineService, ServiceError};
use crate::validation::ValidationError;
use crate::wizard::{WizardError, WizardStepState};

/// Router exposing calculation parameters, dropdowns, eligibility, refinance
/// comparison, and wizard validation.
pub fn engine_router<S>(service: Arc<LoanEngineService<S>>) -> Router
where
    S: DropdownSource,
{
    Router::new()
        .route(
            "/api/v1/calculation-parameters",
            get(parameters_handler::<S>),
        )
        .route("/api/v1/eligibility", post(eligibility_handler::<S>))
        .route("/api/v1/refinance/compare", post(refinance_handler::<S>))
        .route(
            "/api/v1/wizard/:business_path/validate",
            post(wizard_handler::<S>),
        )
        .route("/api/dropdowns/cache/stats", get(cache_stats_handler::<S>))
        .route("/api/dropdowns/cache", delete(cache_clear_handler::<S>))
        .route(
            "/api/dropdowns/:screen_location/:language_code",
            get(dropdowns_handler::<S>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ParametersQuery {
    business_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct InvalidateQuery {
    screen_location: Option<String>,
    language_code: Option<String>,
}

pub(crate) async fn parameters_handler<S>(
    State(service): State<Arc<LoanEngineService<S>>>,
    Query(query): Query<ParametersQuery>,
) -> Response
where
    S: DropdownSource,
{
    let business_path = match parse_path(query.business_path.as_deref().unwrap_or("mortgage")) {
        Ok(path) => path,
        Err(err) => return error_response(ServiceError::Validation(err)),
    };

    match service.calculation_parameters(business_path) {
        Ok(parameters) => {
            let payload = json!({
                "status": "success",
                "data": parameters,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn eligibility_handler<S>(
    State(service): State<Arc<LoanEngineService<S>>>,
    payload: Result<Json<EligibilityPayload>, JsonRejection>,
) -> Response
where
    S: DropdownSource,
{
    let payload = match json_body(payload) {
        Ok(payload) => payload,
        Err(err) => return error_response(ServiceError::Validation(err)),
    };
    let request = match payload.into_request() {
        Ok(request) => request,
        Err(err) => return error_response(ServiceError::Validation(err)),
    };

    match service.eligibility(&request) {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn refinance_handler<S>(
    State(service): State<Arc<LoanEngineService<S>>>,
    payload: Result<Json<RefinancePayload>, JsonRejection>,
) -> Response
where
    S: DropdownSource,
{
    let payload = match json_body(payload) {
        Ok(payload) => payload,
        Err(err) => return error_response(ServiceError::Validation(err)),
    };
    let scenario = match payload.into_scenario() {
        Ok(scenario) => scenario,
        Err(RefinanceError::Validation(err)) => {
            return error_response(ServiceError::Validation(err))
        }
        Err(other) => return error_response(other.into()),
    };

    match service.refinance(&scenario) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn wizard_handler<S>(
    State(service): State<Arc<LoanEngineService<S>>>,
    Path(business_path): Path<String>,
    state: Result<Json<WizardStepState>, JsonRejection>,
) -> Response
where
    S: DropdownSource,
{
    let business_path = match parse_path(&business_path) {
        Ok(path) => path,
        Err(err) => return error_response(ServiceError::Validation(err)),
    };
    let state = match json_body(state) {
        Ok(state) => state,
        Err(err) => return error_response(ServiceError::Validation(err)),
    };

    match service.validate_step(business_path, &state) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn dropdowns_handler<S>(
    State(service): State<Arc<LoanEngineService<S>>>,
    Path((screen_location, language_code)): Path<(String, String)>,
) -> Response
where
    S: DropdownSource,
{
    match service.dropdowns(&screen_location, &language_code).await {
        Ok(dataset) => {
            (StatusCode::OK, Json(DropdownResponse::from_dataset(&dataset))).into_response()
        }
        Err(err) => {
            let payload =
                DropdownResponse::unavailable(&screen_location, &language_code, err.to_string());
            (StatusCode::SERVICE_UNAVAILABLE, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn cache_stats_handler<S>(
    State(service): State<Arc<LoanEngineService<S>>>,
) -> Response
where
    S: DropdownSource,
{
    let stats = service.dropdown_stats();
    let payload = json!({
        "status": "success",
        "ttl_seconds": service.dropdown_cache().ttl().as_secs(),
        "stats": stats,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn cache_clear_handler<S>(
    State(service): State<Arc<LoanEngineService<S>>>,
    Query(query): Query<InvalidateQuery>,
) -> Response
where
    S: DropdownSource,
{
    let removed = service.invalidate_dropdowns(
        query.screen_location.as_deref(),
        query.language_code.as_deref(),
    );
    let payload = json!({
        "status": "success",
        "cleared_entries": removed,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

/// Undecodable bodies (bad JSON, unknown enum values, wrong types) are input
/// errors like any other, reported against the `body` field.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ValidationError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        debug!(status = %rejection.status(), "request body rejected");
        ValidationError::single("body", rejection.body_text())
    })
}

fn parse_path(raw: &str) -> Result<BusinessPath, ValidationError> {
    raw.parse::<BusinessPath>()
        .map_err(|err| ValidationError::single("business_path", err.to_string()))
}

fn error_response(err: ServiceError) -> Response {
    let status = match &err {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::Rule(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ServiceError::InsufficientIncome | ServiceError::InvalidScenario(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ServiceError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Wizard(WizardError::UnknownStep { .. }) => StatusCode::NOT_FOUND,
        ServiceError::Wizard(_) => StatusCode::CONFLICT,
    };

    let payload = match &err {
        ServiceError::Validation(validation) => json!({
            "status": "error",
            "error": err.to_string(),
            "fields": validation.issues,
        }),
        ServiceError::Rule(lookup) => {
            error!(error = %lookup, "rule table lookup failed while serving request");
            let message = match lookup {
                RuleLookupError::RuleNotFound { .. } => "eligibility rule not configured",
                RuleLookupError::StandardsNotFound(_) => "lending standards not configured",
            };
            json!({
                "status": "error",
                "error": message,
            })
        }
        _ => json!({
            "status": "error",
            "error": err.to_string(),
        }),
    };

    (status, Json(payload)).into_response()
}
