//! Wire types for the public endpoints.

use serde::{Deserialize, Serialize};

/// `POST /solve` body.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SolveRequest {
    /// Base64 image, optionally as a `data:image/...;base64,` URL.
    pub image: String,
}

/// Every `/solve` answer, success or failure, is a single `result` string.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SolveResponse {
    pub result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Active OCR backend: `tesseract`, a vision vendor name, or `unavailable`.
    pub ocr: String,
}
