//! OCR (Optical Character Recognition) Module
//!
//! Turns a photo of a math problem into raw text. Two kinds of backend are
//! supported:
//! - `local/...` runs Tesseract through leptess with a math character whitelist
//! - `openai/...`, `mistral/...`, `deepseek/...` call an OpenAI-compatible
//!   vision model with a prompt that asks for the bare expression
//!
//! Backends that cannot start (missing traineddata, missing API key) degrade
//! to an unavailable provider instead of failing startup.
//!
//! # Configuration
//!
//! See `OcrConfig` in `config.rs`:
//! - `model`: provider/model selection
//! - `api_key` / `base_url`: credentials and endpoint for vision providers
//! - `languages`, `char_whitelist`, `page_seg_mode`: Tesseract tuning
//! - `target_width`, `min/max_image_dimension`: preprocessing limits
//!
//! # Usage
//!
//! ```rust,ignore
//! let ocr = OcrProvider::new(&config.ocr)?;
//! let png = preprocess_image(&bytes, &config.ocr)?;
//! let text = ocr.ocr(&png).await?;
//! ```

mod api;
mod preprocessing;
mod provider;

pub use api::VisionVendor;
pub use preprocessing::{decode_image, preprocess_image, validate_image};
pub use provider::OcrProvider;
