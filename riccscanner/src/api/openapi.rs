use axum::Json;
use utoipa::OpenApi;

use super::dto;
use super::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "RiccScanner API",
        description = "Photograph a math problem, get the expression and its solution.",
    ),
    paths(handlers::health::health_check, handlers::solve::solve),
    components(schemas(dto::SolveRequest, dto::SolveResponse, dto::HealthResponse)),
    tags(
        (name = "health", description = "Liveness and backend status"),
        (name = "solve", description = "Image to answer"),
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
