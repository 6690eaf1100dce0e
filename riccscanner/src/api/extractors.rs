use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;

use crate::error::ScanError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ScanError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for ScanError {
    fn from(rejection: JsonRejection) -> Self {
        map_json_rejection(rejection)
    }
}

fn map_json_rejection(rejection: JsonRejection) -> ScanError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            let message = err.body_text();
            match extract_missing_field(&message) {
                Some("image") => ScanError::Validation("No image data provided".to_string()),
                Some(field) => ScanError::Validation(format!("Missing required field: {field}")),
                None => ScanError::Validation(format!("Invalid JSON: {message}")),
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            ScanError::Validation(format!("JSON syntax error: {}", err.body_text()))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ScanError::Validation("Missing `Content-Type: application/json` header".to_string())
        }
        JsonRejection::BytesRejection(err) => {
            ScanError::Validation(format!("Failed to read request body: {}", err.body_text()))
        }
        _ => ScanError::Validation(rejection.body_text()),
    }
}

fn extract_missing_field(message: &str) -> Option<&str> {
    let prefix = "missing field `";
    let start = message.find(prefix)? + prefix.len();
    let remaining = message.get(start..)?;
    let end = remaining.find('`')?;
    remaining.get(..end)
}
