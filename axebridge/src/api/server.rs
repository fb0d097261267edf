//! API server assembly.

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use super::v0;
use crate::bridge::Bridge;
use crate::gateway::DeviceGateway;

/// State shared by all API handlers.
#[derive(Clone)]
pub struct SharedState {
    pub bridge: Bridge,
}

impl SharedState {
    pub fn new(gateway: Arc<dyn DeviceGateway>) -> Self {
        Self { bridge: Bridge::new(gateway) }
    }
}

#[derive(OpenApi)]
#[openapi(info(
    title = "axebridge",
    description = "Uniform HTTP bridge for a fleet of network-attached ASIC miners",
))]
struct ApiDoc;

/// Build the full application router: versioned API, OpenAPI document,
/// Swagger UI, and request tracing.
pub fn app(state: SharedState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api/v0", v0::routes())
        .split_for_parts();

    router
        .merge(SwaggerUi::new("/docs").url("/api/openapi.json", api))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
