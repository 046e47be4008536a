//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Trigger endpoints are mounted under `/api/v1`; `/health` sits at the
//! root. With the `swagger-ui` feature the OpenAPI document is served at
//! `/api-docs/openapi.json` and browsable at `/swagger-ui`.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document of the relay.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "sales-relay", description = "Marketplace sales and listings relay"),
    paths(
        handlers::feed::activity,
        handlers::feed::listings,
        handlers::webhook::webhook,
        handlers::summary::top_sales,
        handlers::system::health_handler,
    ),
    components(schemas(
        dto::BatchReportResponse,
        dto::SummaryResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    ))
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}
