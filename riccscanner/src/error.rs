use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    #[error("{0}")]
    Image(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ScanError {
    pub fn status(&self) -> StatusCode {
        match self {
            ScanError::Validation(_) | ScanError::InvalidImage(_) | ScanError::Image(_) => {
                StatusCode::BAD_REQUEST
            }
            ScanError::OcrUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ScanError::Ocr(_) | ScanError::Http(_) => StatusCode::BAD_GATEWAY,
            ScanError::Json(_) | ScanError::Io(_) | ScanError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text placed in the `result` field. Client mistakes read `Error: ...`,
    /// everything on our side reads `Server Error: ...`.
    pub fn result_message(&self) -> String {
        if self.status().is_client_error() {
            format!("Error: {self}")
        } else {
            format!("Server Error: {self}")
        }
    }
}

impl IntoResponse for ScanError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = Json(json!({
            "result": self.result_message(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
