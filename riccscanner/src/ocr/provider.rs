use std::sync::Arc;
use std::time::Duration;

use leptess::{LepTess, Variable};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::{parse_ocr_provider_model, OcrConfig};
use crate::error::{Result, ScanError};

use super::api::{VisionClient, VisionVendor};

enum OcrBackend {
    Local { tesseract: Arc<Mutex<LepTess>> },
    Api { client: VisionClient },
    Unavailable { reason: String },
}

pub struct OcrProvider {
    backend: OcrBackend,
    config: OcrConfig,
}

fn create_tesseract(config: &OcrConfig) -> std::result::Result<LepTess, String> {
    let mut lt = LepTess::new(None, &config.languages).map_err(|e| e.to_string())?;
    lt.set_variable(
        Variable::TesseditPagesegMode,
        &config.page_seg_mode.to_string(),
    )
    .map_err(|e| e.to_string())?;
    if !config.char_whitelist.is_empty() {
        lt.set_variable(Variable::TesseditCharWhitelist, &config.char_whitelist)
            .map_err(|e| e.to_string())?;
    }
    Ok(lt)
}

impl OcrProvider {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let (provider_prefix, _) = parse_ocr_provider_model(&config.model);

        let backend = match VisionVendor::from_prefix(provider_prefix) {
            Some(vendor) => match VisionClient::new(vendor, config) {
                Ok(client) => {
                    info!(
                        vendor = vendor.name(),
                        model = client.model(),
                        "Vision OCR API backend initialized"
                    );
                    OcrBackend::Api { client }
                }
                Err(e) => {
                    let reason = format!("{} OCR backend unavailable: {e}", vendor.name());
                    warn!("{}", reason);
                    OcrBackend::Unavailable { reason }
                }
            },
            None => match create_tesseract(config) {
                Ok(lt) => {
                    info!(
                        languages = %config.languages,
                        psm = config.page_seg_mode,
                        "Tesseract OCR initialized"
                    );
                    OcrBackend::Local {
                        tesseract: Arc::new(Mutex::new(lt)),
                    }
                }
                Err(e) => {
                    let reason = format!("Tesseract not available: {e}");
                    warn!("{}", reason);
                    OcrBackend::Unavailable { reason }
                }
            },
        };

        Ok(Self {
            backend,
            config: config.clone(),
        })
    }

    /// Provider that always refuses, used when OCR is disabled outright.
    pub fn unavailable(config: &OcrConfig, reason: impl Into<String>) -> Self {
        Self {
            backend: OcrBackend::Unavailable {
                reason: reason.into(),
            },
            config: config.clone(),
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, OcrBackend::Unavailable { .. })
    }

    pub fn backend_name(&self) -> &'static str {
        match &self.backend {
            OcrBackend::Local { .. } => "tesseract",
            OcrBackend::Api { client } => client.vendor().name(),
            OcrBackend::Unavailable { .. } => "unavailable",
        }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    pub async fn ocr(&self, image_bytes: &[u8]) -> Result<String> {
        let timeout_duration = Duration::from_secs(self.config.timeout_secs);

        let result = tokio::time::timeout(timeout_duration, self.ocr_internal(image_bytes)).await;

        match result {
            Ok(inner_result) => inner_result,
            Err(_) => Err(ScanError::Ocr(format!(
                "OCR operation timed out after {} seconds",
                self.config.timeout_secs
            ))),
        }
    }

    async fn ocr_internal(&self, image_bytes: &[u8]) -> Result<String> {
        match &self.backend {
            OcrBackend::Local { tesseract } => {
                let bytes = image_bytes.to_vec();
                let tesseract = Arc::clone(tesseract);

                let text = tokio::task::spawn_blocking(move || {
                    let mut lt = tesseract.blocking_lock();
                    lt.set_image_from_mem(&bytes)
                        .map_err(|e| ScanError::Ocr(format!("Failed to set image: {e}")))?;
                    lt.get_utf8_text()
                        .map_err(|e| ScanError::Ocr(format!("Failed to extract text: {e}")))
                })
                .await
                .map_err(|e| ScanError::Internal(format!("OCR task panicked: {e}")))??;

                Ok(text.trim().to_string())
            }
            OcrBackend::Api { client } => client.ocr(image_bytes).await,
            OcrBackend::Unavailable { reason } => Err(ScanError::OcrUnavailable(reason.clone())),
        }
    }
}

impl Clone for OcrProvider {
    fn clone(&self) -> Self {
        let backend = match &self.backend {
            OcrBackend::Local { tesseract } => OcrBackend::Local {
                tesseract: Arc::clone(tesseract),
            },
            OcrBackend::Api { client } => OcrBackend::Api {
                client: client.clone(),
            },
            OcrBackend::Unavailable { reason } => OcrBackend::Unavailable {
                reason: reason.clone(),
            },
        };

        Self {
            backend,
            config: self.config.clone(),
        }
    }
}
