//! API v0 endpoints.
//!
//! Version 0 signals an unstable API -- breaking changes are expected
//! until the bridge reaches 1.0.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Map, Value};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::server::SharedState;
use super::types::{ErrorResponse, StatusResponse};
use crate::bridge::ValidationReport;
use crate::config::model::MinerConfig;
use crate::error::ConfigError;
use crate::gateway::GatewayError;

/// Build the v0 API routes with OpenAPI metadata.
pub fn routes() -> OpenApiRouter<SharedState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .routes(routes!(get_telemetry))
        .routes(routes!(get_config, patch_config))
        .routes(routes!(validate_config))
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a gateway failure onto a response status.
///
/// Unreachable devices are a bad upstream, not a bad request.
fn gateway_error(err: GatewayError) -> ApiError {
    let status = match &err {
        GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
        GatewayError::Unreachable { .. } | GatewayError::Protocol { .. } => {
            StatusCode::BAD_GATEWAY
        }
    };
    (status, Json(ErrorResponse::new(err.to_string())))
}

fn config_error(err: ConfigError) -> ApiError {
    match err {
        ConfigError::Gateway(err) => gateway_error(err),
        // Constraint violations and a missing extension are client
        // errors: the patch needs fixing, not retrying.
        other => (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(other.to_string()))),
    }
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = OK, description = "Server is running", body = String),
    ),
)]
async fn health() -> &'static str {
    "OK"
}

/// Return one device's normalized telemetry.
#[utoipa::path(
    get,
    path = "/miners/{ip}/telemetry",
    tag = "miners",
    params(
        ("ip" = String, Path, description = "Device IP address"),
    ),
    responses(
        (status = OK, description = "Canonical telemetry record", body = Object),
        (status = NOT_FOUND, description = "No device at this address", body = ErrorResponse),
        (status = BAD_GATEWAY, description = "Device unreachable", body = ErrorResponse),
    ),
)]
async fn get_telemetry(
    State(state): State<SharedState>,
    Path(ip): Path<String>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    state
        .bridge
        .telemetry(&ip)
        .await
        .map(Json)
        .map_err(gateway_error)
}

/// Return one device's configuration in the vendor-neutral model.
#[utoipa::path(
    get,
    path = "/miners/{ip}/config",
    tag = "miners",
    params(
        ("ip" = String, Path, description = "Device IP address"),
    ),
    responses(
        (status = OK, description = "Current configuration", body = MinerConfig),
        (status = NOT_FOUND, description = "No device at this address", body = ErrorResponse),
        (status = BAD_GATEWAY, description = "Device unreachable", body = ErrorResponse),
    ),
)]
async fn get_config(
    State(state): State<SharedState>,
    Path(ip): Path<String>,
) -> Result<Json<MinerConfig>, ApiError> {
    state
        .bridge
        .config(&ip)
        .await
        .map(Json)
        .map_err(gateway_error)
}

/// Apply a partial configuration patch to one device.
///
/// Fields absent from the body are left unchanged on the device; `pools`
/// replaces atomically when present.
#[utoipa::path(
    patch,
    path = "/miners/{ip}/config",
    tag = "miners",
    params(
        ("ip" = String, Path, description = "Device IP address"),
    ),
    request_body = MinerConfig,
    responses(
        (status = OK, description = "Patch applied", body = StatusResponse),
        (status = BAD_REQUEST, description = "Patch rejected by validation", body = ErrorResponse),
        (status = NOT_FOUND, description = "No device at this address", body = ErrorResponse),
        (status = BAD_GATEWAY, description = "Device unreachable", body = ErrorResponse),
    ),
)]
async fn patch_config(
    State(state): State<SharedState>,
    Path(ip): Path<String>,
    Json(patch): Json<MinerConfig>,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .bridge
        .apply_patch(&ip, &patch)
        .await
        .map(|()| Json(StatusResponse::success()))
        .map_err(config_error)
}

/// Validate a configuration patch without applying it.
#[utoipa::path(
    post,
    path = "/miners/{ip}/config/validate",
    tag = "miners",
    params(
        ("ip" = String, Path, description = "Device IP address"),
    ),
    request_body = MinerConfig,
    responses(
        (status = OK, description = "Validation verdict", body = ValidationReport),
        (status = NOT_FOUND, description = "No device at this address", body = ErrorResponse),
        (status = BAD_GATEWAY, description = "Device unreachable", body = ErrorResponse),
    ),
)]
async fn validate_config(
    State(state): State<SharedState>,
    Path(ip): Path<String>,
    Json(patch): Json<MinerConfig>,
) -> Result<Json<ValidationReport>, ApiError> {
    state
        .bridge
        .dry_run_patch(&ip, &patch)
        .await
        .map(Json)
        .map_err(gateway_error)
}
