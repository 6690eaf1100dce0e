use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{parse_ocr_provider_model, OcrConfig};
use crate::error::{Result, ScanError};

const MATH_PROMPT: &str = "Read the math problem in this image. Return only the expression or equation on a single line using ASCII operators (+ - * / ^ = and parentheses). Write square roots as sqrt(...). No explanations, no LaTeX, no code fences.";

/// Vision providers reachable through an OpenAI-compatible chat completions API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisionVendor {
    OpenAi,
    Mistral,
    DeepSeek,
}

impl VisionVendor {
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "mistral" => Some(Self::Mistral),
            "deepseek" => Some(Self::DeepSeek),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Mistral => "mistral",
            Self::DeepSeek => "deepseek",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Mistral => "https://api.mistral.ai/v1",
            Self::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Mistral => "pixtral-12b-2409",
            Self::DeepSeek => "deepseek-vl",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI Vision",
            Self::Mistral => "Mistral",
            Self::DeepSeek => "DeepSeek",
        }
    }
}

#[derive(Clone, Debug)]
pub struct VisionClient {
    client: Client,
    vendor: VisionVendor,
    api_key: String,
    base_url: String,
    model: String,
    max_retries: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

impl VisionClient {
    pub fn new(vendor: VisionVendor, config: &OcrConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ScanError::Ocr(format!("API key required for {} OCR", vendor.label()))
        })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| vendor.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();

        let (_, model) = parse_ocr_provider_model(&config.model);
        let model = if model.is_empty() || model == config.model {
            vendor.default_model().to_string()
        } else {
            model.to_string()
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScanError::Ocr(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            vendor,
            api_key,
            base_url,
            model,
            max_retries: config.max_retries.max(1),
        })
    }

    pub fn vendor(&self) -> VisionVendor {
        self.vendor
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn ocr(&self, image_bytes: &[u8]) -> Result<String> {
        let data_url = image_data_url(image_bytes);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: MATH_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            max_tokens: 512,
            temperature: 0.0,
        };

        self.make_request(&request).await
    }

    async fn make_request(&self, request: &ChatRequest) -> Result<String> {
        let mut retries = 0;

        loop {
            let response = self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(request)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    if resp.status().is_success() {
                        let chat_response: ChatResponse = resp.json().await.map_err(|e| {
                            ScanError::Ocr(format!("Failed to parse response: {e}"))
                        })?;

                        return chat_response
                            .choices
                            .into_iter()
                            .next()
                            .map(|c| c.message.content.unwrap_or_default().trim().to_string())
                            .ok_or_else(|| ScanError::Ocr("No response from API".to_string()));
                    } else if resp.status().as_u16() == 429 || resp.status().is_server_error() {
                        retries += 1;
                        if retries >= self.max_retries {
                            return Err(ScanError::Ocr(format!(
                                "API request failed after {} retries: {}",
                                self.max_retries,
                                resp.status()
                            )));
                        }
                        tracing::debug!(status = %resp.status(), retries, "Vision API busy, retrying");
                        let delay = Duration::from_millis(100 * (2_u64.pow(retries)));
                        tokio::time::sleep(delay).await;
                        continue;
                    } else {
                        let status = resp.status();
                        let body = resp.text().await.unwrap_or_default();
                        return Err(ScanError::Ocr(format!(
                            "API request failed: {status} - {body}"
                        )));
                    }
                }
                Err(e) => {
                    retries += 1;
                    if retries >= self.max_retries {
                        return Err(ScanError::Ocr(format!(
                            "API request failed after {} retries: {e}",
                            self.max_retries
                        )));
                    }
                    let delay = Duration::from_millis(100 * (2_u64.pow(retries)));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Data URL with the MIME type sniffed from the bytes, PNG when unknown.
fn image_data_url(image_bytes: &[u8]) -> String {
    let mime = image::guess_format(image_bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("image/png");
    format!("data:{mime};base64,{}", STANDARD.encode(image_bytes))
}
