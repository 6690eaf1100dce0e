use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::{OcrConfig, SolverConfig};
use crate::error::{Result, ScanError};
use crate::math::{clean_text, normalize_math, solve_expression};
use crate::ocr::{preprocess_image, validate_image, OcrProvider};

const NO_EXPRESSION_MESSAGE: &str = "No math expression detected.\n\n\
Tips:\n\
- Write clearly with dark ink\n\
- Ensure good lighting\n\
- Keep math centered in frame\n\
- Avoid cluttered background";

/// Photo in, answer out: decode, OCR, normalize, solve.
#[derive(Clone)]
pub struct ScanService {
    ocr: OcrProvider,
    solver: SolverConfig,
}

impl ScanService {
    pub fn new(ocr: OcrProvider, solver: SolverConfig) -> Self {
        Self { ocr, solver }
    }

    pub fn ocr(&self) -> &OcrProvider {
        &self.ocr
    }

    pub async fn scan(&self, payload: &str) -> Result<String> {
        let bytes = decode_payload(payload)?;
        let ocr_config: &OcrConfig = self.ocr.config();

        let image = if ocr_config.preprocess {
            preprocess_image(&bytes, ocr_config)?
        } else {
            validate_image(&bytes, ocr_config)?;
            bytes
        };

        let raw = self.ocr.ocr(&image).await?;
        tracing::info!(raw_text = %raw, backend = self.ocr.backend_name(), "OCR complete");

        let normalized = normalize_math(&clean_text(&raw));
        if normalized.is_empty() {
            return Ok(NO_EXPRESSION_MESSAGE.to_string());
        }

        let solution = self.solve(normalized.clone()).await?;
        tracing::debug!(expression = %normalized, "Expression solved");

        Ok(format!("Detected: {normalized}\n\n{solution}"))
    }

    /// Run the solver on the blocking pool, bounded by the solver timeout.
    async fn solve(&self, expression: String) -> Result<String> {
        let config = self.solver.clone();
        let budget = Duration::from_secs(config.timeout_secs);
        let text = expression.clone();
        let task = tokio::task::spawn_blocking(move || solve_expression(&text, &config));

        match tokio::time::timeout(budget, task).await {
            Ok(joined) => {
                joined.map_err(|e| ScanError::Internal(format!("Solver task failed: {e}")))
            }
            Err(_) => {
                tracing::warn!(expression = %expression, timeout_secs = budget.as_secs(), "Solver timed out");
                Ok(format!(
                    "Error parsing: {expression}\nDetails: solver gave up after {}s",
                    budget.as_secs()
                ))
            }
        }
    }
}

/// Base64 image data, with or without a `data:image/...;base64,` header.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    let encoded = match payload.split_once(',') {
        Some((header, data)) if header.starts_with("data:") => data,
        _ => payload,
    };
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(ScanError::Validation("No image data provided".to_string()));
    }

    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ScanError::InvalidImage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use pretty_assertions::assert_eq;

    fn service() -> ScanService {
        ScanService::new(
            OcrProvider::unavailable(&OcrConfig::default(), "OCR disabled in tests"),
            SolverConfig::default(),
        )
    }

    fn png_base64(width: u32, height: u32) -> String {
        let img = ImageBuffer::from_fn(width, height, |_, _| Rgb([255u8, 255, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        STANDARD.encode(bytes)
    }

    #[test]
    fn decode_plain_base64() {
        assert_eq!(decode_payload("aGVsbG8=").unwrap(), b"hello".to_vec());
    }

    #[test]
    fn decode_strips_data_url_header() {
        assert_eq!(
            decode_payload("data:image/png;base64,aGVsbG8=").unwrap(),
            b"hello".to_vec()
        );
    }

    #[test]
    fn decode_tolerates_line_breaks() {
        assert_eq!(decode_payload("aGVs\nbG8=").unwrap(), b"hello".to_vec());
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode_payload("not base64!!").unwrap_err();
        assert!(matches!(err, ScanError::InvalidImage(_)));
    }

    #[test]
    fn decode_rejects_empty_payload() {
        let err = decode_payload("   ").unwrap_err();
        assert_eq!(err.result_message(), "Error: No image data provided");
    }

    #[tokio::test]
    async fn solve_runs_on_blocking_pool() {
        let report = service().solve("2+3*4".to_string()).await.unwrap();
        assert_eq!(report, "Expression: 2+3*4\nSimplified: 14\nResult: 14.0");
    }

    #[tokio::test]
    async fn solve_keeps_worker_free_for_hard_equations() {
        let started = std::time::Instant::now();
        let report = service()
            .solve("963761198400*y**4+y+963761198400=0".to_string())
            .await
            .unwrap();
        assert!(report.ends_with("Solution: []"), "{report}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn scan_rejects_non_image_bytes() {
        let err = service().scan("aGVsbG8=").await.unwrap_err();
        assert!(matches!(err, ScanError::Image(_)), "{err}");
    }

    #[tokio::test]
    async fn scan_rejects_tiny_images() {
        let err = service().scan(&png_base64(10, 10)).await.unwrap_err();
        assert!(err.to_string().contains("Image too small"), "{err}");
    }

    #[tokio::test]
    async fn scan_reports_unavailable_ocr() {
        let err = service().scan(&png_base64(120, 80)).await.unwrap_err();
        assert!(matches!(err, ScanError::OcrUnavailable(_)), "{err}");
    }
}
