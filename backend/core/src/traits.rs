use anyhow::Result;
use async_trait::async_trait;

use crate::types::{FetchedContent, FileInfo, OcrPage, SupportedMedia, UploadedFile};

/// Trait for LLM providers used by the verification and generation services.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "mistral", "gemini").
    fn name(&self) -> &str;

    /// Send a completion request and return the response text.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;
}

/// Remote file store with OCR capability.
///
/// Files are uploaded once, then addressed by id. Signed URLs are short-lived
/// and are what the OCR endpoint and browser views consume.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Upload a file for OCR and return its backend id.
    async fn upload(&self, file: &UploadedFile) -> Result<String>;

    async fn signed_url(&self, file_id: &str) -> Result<String>;

    async fn retrieve(&self, file_id: &str) -> Result<FileInfo>;

    /// Run OCR over the document behind `url`.
    async fn ocr(&self, url: &str, media: SupportedMedia) -> Result<Vec<OcrPage>>;

    /// Download raw bytes from a signed URL.
    async fn fetch(&self, url: &str) -> Result<FetchedContent>;
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the provider to constrain output to a JSON object when it supports it.
    pub json_mode: bool,
}

impl LlmRequest {
    /// A single-turn user prompt with provider defaults for everything else.
    pub fn prompt(model: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: String::new(),
            user_prompt: user_prompt.into(),
            max_tokens: 8192,
            temperature: 0.2,
            json_mode: false,
        }
    }

    pub fn with_json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}
