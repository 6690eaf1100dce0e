use serde::Deserialize;
use std::env;

/// Default Tesseract whitelist: digits, operators and the letters needed for
/// `x` (multiplication) and `sqrt`.
pub const DEFAULT_CHAR_WHITELIST: &str = "0123456789+-*/=().xX^sqrtSQRT ";

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub solver: SolverConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub languages: String,
    pub timeout_secs: u64,
    pub max_image_dimension: u32,
    pub min_image_dimension: u32,
    /// Narrow images are upscaled to at least this width before thresholding.
    pub target_width: u32,
    pub char_whitelist: String,
    pub page_seg_mode: u8,
    pub preprocess: bool,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolverConfig {
    pub max_expression_len: usize,
    /// Wall-clock budget for one solve before the request gives up on it.
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model: "local/tesseract".to_string(),
            api_key: None,
            base_url: None,
            languages: "eng".to_string(),
            timeout_secs: 60,
            max_image_dimension: 4096,
            min_image_dimension: 50,
            target_width: 1000,
            char_whitelist: DEFAULT_CHAR_WHITELIST.to_string(),
            page_seg_mode: 6,
            preprocess: true,
            max_retries: 3,
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_expression_len: 256,
            timeout_secs: 10,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let ocr_defaults = OcrConfig::default();

        let solver_defaults = SolverConfig::default();

        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("PORT", 5000),
                max_body_bytes: parse_env_or("MAX_BODY_BYTES", 20 * 1024 * 1024),
            },
            ocr: OcrConfig {
                model: env::var("OCR_MODEL").unwrap_or(ocr_defaults.model),
                api_key: env::var("OCR_API_KEY").ok().filter(|k| !k.is_empty()),
                base_url: env::var("OCR_BASE_URL").ok().filter(|u| !u.is_empty()),
                languages: env::var("OCR_LANGUAGES").unwrap_or(ocr_defaults.languages),
                timeout_secs: parse_env_or("OCR_TIMEOUT", ocr_defaults.timeout_secs),
                max_image_dimension: parse_env_or(
                    "OCR_MAX_DIMENSION",
                    ocr_defaults.max_image_dimension,
                ),
                min_image_dimension: parse_env_or(
                    "OCR_MIN_DIMENSION",
                    ocr_defaults.min_image_dimension,
                ),
                target_width: parse_env_or("OCR_TARGET_WIDTH", ocr_defaults.target_width),
                char_whitelist: env::var("OCR_WHITELIST").unwrap_or(ocr_defaults.char_whitelist),
                page_seg_mode: parse_env_or("OCR_PAGE_SEG_MODE", ocr_defaults.page_seg_mode),
                preprocess: parse_env_or("OCR_PREPROCESS", ocr_defaults.preprocess),
                max_retries: parse_env_or("OCR_MAX_RETRIES", ocr_defaults.max_retries),
            },
            solver: SolverConfig {
                max_expression_len: parse_env_or(
                    "SOLVER_MAX_EXPRESSION_LEN",
                    solver_defaults.max_expression_len,
                ),
                timeout_secs: parse_env_or("SOLVER_TIMEOUT", solver_defaults.timeout_secs),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// Known OCR providers. Anything else is treated as local Tesseract.
pub const KNOWN_OCR_PROVIDERS: &[&str] = &["openai", "mistral", "deepseek", "local"];

/// Parse an OCR model name into a (provider, model) tuple.
pub fn parse_ocr_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_OCR_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    ("local", model)
}
