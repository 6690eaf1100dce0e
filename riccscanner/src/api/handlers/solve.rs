use axum::extract::State;
use axum::Json;

use crate::api::dto::{SolveRequest, SolveResponse};
use crate::api::extractors::AppJson;
use crate::api::state::AppState;
use crate::error::Result;

/// `POST /solve`
///
/// Runs the whole pipeline on the uploaded photo. Expressions the solver
/// cannot handle still answer 200 with the parse error in `result`; only
/// bad input and OCR failures produce error statuses.
#[utoipa::path(
    post,
    path = "/solve",
    tag = "solve",
    request_body = SolveRequest,
    responses(
        (status = 200, description = "Detected expression and its solution", body = SolveResponse),
        (status = 400, description = "Missing or undecodable image", body = SolveResponse),
        (status = 502, description = "OCR backend failed", body = SolveResponse),
        (status = 503, description = "No OCR backend available", body = SolveResponse),
    )
)]
pub async fn solve(
    State(state): State<AppState>,
    AppJson(request): AppJson<SolveRequest>,
) -> Result<Json<SolveResponse>> {
    let result = state.scanner.scan(&request.image).await?;
    Ok(Json(SolveResponse { result }))
}
