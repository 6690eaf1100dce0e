use axum::extract::State;
use axum::Json;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

pub const SERVICE_STATUS: &str = "RiccScanner Online";

/// `GET /`
#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: SERVICE_STATUS.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ocr: state.scanner.ocr().backend_name().to_string(),
    })
}
