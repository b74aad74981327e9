use std::time::Instant;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, multipart, Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use ocr_agents_core::{
    CreatedAt, DocumentBackend, FetchedContent, FileInfo, LlmProvider, LlmRequest, LlmResponse,
    OcrPage, SupportedMedia, UploadedFile,
};
use ocr_agents_logging::{redact_secrets, redact_sensitive_data};

pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";
pub const OCR_MODEL: &str = "mistral-ocr-latest";
/// Lifetime of signed URLs, in hours.
const SIGNED_URL_EXPIRY_HOURS: u32 = 24;

/// Mistral platform client: file storage, OCR, and chat completions.
pub struct MistralClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl MistralClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Turn a non-2xx response into an error carrying the upstream body with secrets removed.
pub(crate) async fn ensure_success(response: Response, provider: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(
        provider,
        status = %status,
        body = %redact_sensitive_data(&body),
        "Upstream request rejected"
    );
    bail!("{} returned {}: {}", provider, status, redact_secrets(&body))
}

#[derive(Deserialize)]
struct UploadedFileResponse {
    id: String,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    url: String,
}

#[derive(Deserialize)]
struct FileObject {
    id: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    purpose: String,
    created_at: CreatedAt,
    #[serde(default = "default_object")]
    object: String,
    #[serde(default)]
    status_details: Option<String>,
    #[serde(default)]
    bytes: Option<u64>,
}

fn default_object() -> String {
    "file".to_string()
}

#[derive(Deserialize)]
struct OcrResponse {
    pages: Vec<OcrPage>,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}

#[async_trait]
impl DocumentBackend for MistralClient {
    fn name(&self) -> &str {
        "mistral"
    }

    async fn upload(&self, file: &UploadedFile) -> Result<String> {
        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str(&file.content_type)?;
        let form = multipart::Form::new()
            .text("purpose", "ocr")
            .part("file", part);

        debug!(filename = %file.filename, size = file.bytes.len(), "Uploading file to Mistral");

        let response = self
            .client
            .post(self.url("/v1/files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Mistral upload request failed")?;

        let uploaded: UploadedFileResponse = ensure_success(response, "Mistral")
            .await?
            .json()
            .await
            .context("Failed to parse Mistral upload response")?;
        Ok(uploaded.id)
    }

    async fn signed_url(&self, file_id: &str) -> Result<String> {
        let response = self
            .client
            .get(self.url(&format!("/v1/files/{file_id}/url")))
            .query(&[("expiry", SIGNED_URL_EXPIRY_HOURS)])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Mistral signed URL request failed")?;

        let signed: SignedUrlResponse = ensure_success(response, "Mistral")
            .await?
            .json()
            .await
            .context("Failed to parse Mistral signed URL response")?;
        Ok(signed.url)
    }

    async fn retrieve(&self, file_id: &str) -> Result<FileInfo> {
        let response = self
            .client
            .get(self.url(&format!("/v1/files/{file_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Mistral file retrieve request failed")?;

        let file: FileObject = ensure_success(response, "Mistral")
            .await?
            .json()
            .await
            .context("Failed to parse Mistral file metadata")?;

        Ok(FileInfo {
            file_id: file.id,
            filename: file.filename,
            purpose: file.purpose,
            created_at: file.created_at.to_iso(),
            object: file.object,
            status_details: file.status_details,
            size_bytes: file.bytes,
        })
    }

    async fn ocr(&self, url: &str, media: SupportedMedia) -> Result<Vec<OcrPage>> {
        let kind = media.document_kind();
        let mut document = serde_json::Map::new();
        document.insert("type".to_string(), json!(kind));
        document.insert(kind.to_string(), json!(url));
        let body = json!({
            "model": OCR_MODEL,
            "document": document,
            "include_image_base64": false,
        });

        let start = Instant::now();
        let response = self
            .client
            .post(self.url("/v1/ocr"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Mistral OCR request failed")?;

        let ocr: OcrResponse = ensure_success(response, "Mistral")
            .await?
            .json()
            .await
            .context("Failed to parse Mistral OCR response")?;

        debug!(
            pages = ocr.pages.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "OCR completed"
        );
        Ok(ocr.pages)
    }

    async fn fetch(&self, url: &str) -> Result<FetchedContent> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Signed URL request failed")?;
        let response = ensure_success(response, "File store").await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(FetchedContent::DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await.context("Failed to read file body")?;

        Ok(FetchedContent {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

#[async_trait]
impl LlmProvider for MistralClient {
    fn name(&self) -> &str {
        "mistral"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let start = Instant::now();

        let mut messages = Vec::new();
        if !request.system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: request.system_prompt.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.user_prompt.clone(),
        });

        let body = ChatRequest {
            model: request.model.clone(),
            messages,
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
            response_format: request
                .json_mode
                .then(|| json!({ "type": "json_object" })),
        };

        debug!(model = %request.model, json_mode = request.json_mode, "Sending request to Mistral");

        let response = self
            .client
            .post(self.url("/v1/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Mistral HTTP request failed")?;

        let chat_response: ChatResponse = ensure_success(response, "Mistral")
            .await?
            .json()
            .await
            .context("Failed to parse Mistral response")?;

        let content = chat_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        let tokens_used = chat_response
            .usage
            .and_then(|u| u.total_tokens)
            .unwrap_or(0);

        Ok(LlmResponse {
            content,
            provider: "mistral".to_string(),
            model: request.model.clone(),
            tokens_used,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> MistralClient {
        MistralClient::new("test-key").with_base_url(server.base_url())
    }

    #[tokio::test]
    async fn test_upload_returns_file_id() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(POST)
                .path("/v1/files")
                .header("authorization", "Bearer test-key");
            then.status(200).json_body(serde_json::json!({
                "id": "file-abc123",
                "object": "file",
                "purpose": "ocr"
            }));
        }).await;

        let file = UploadedFile::new("id.pdf", "application/pdf", b"%PDF-1.4".to_vec());
        let id = client_for(&server).upload(&file).await.unwrap();

        mock.assert_async().await;
        assert_eq!(id, "file-abc123");
    }

    #[tokio::test]
    async fn test_signed_url_passes_expiry() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(GET)
                .path("/v1/files/file-abc123/url")
                .query_param("expiry", "24");
            then.status(200)
                .json_body(serde_json::json!({ "url": "https://signed.example/abc" }));
        }).await;

        let url = client_for(&server).signed_url("file-abc123").await.unwrap();
        assert_eq!(url, "https://signed.example/abc");
    }

    #[tokio::test]
    async fn test_retrieve_converts_epoch_created_at() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(GET).path("/v1/files/file-abc123");
            then.status(200).json_body(serde_json::json!({
                "id": "file-abc123",
                "filename": "document.pdf",
                "purpose": "ocr",
                "created_at": 1696509045,
                "object": "file",
                "bytes": 45678
            }));
        }).await;

        let info = client_for(&server).retrieve("file-abc123").await.unwrap();
        assert_eq!(info.created_at, "2023-10-05T12:30:45Z");
        assert_eq!(info.size_bytes, Some(45678));
        assert_eq!(info.status_details, None);
    }

    #[tokio::test]
    async fn test_ocr_uses_image_url_for_images() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(POST).path("/v1/ocr").json_body(serde_json::json!({
                "model": "mistral-ocr-latest",
                "document": {
                    "type": "image_url",
                    "image_url": "https://signed.example/img"
                },
                "include_image_base64": false
            }));
            then.status(200).json_body(serde_json::json!({
                "pages": [
                    { "index": 0, "markdown": "# Page one" },
                    { "index": 1, "markdown": "Page two" }
                ]
            }));
        }).await;

        let pages = client_for(&server)
            .ocr("https://signed.example/img", SupportedMedia::Png)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].markdown, "# Page one");
    }

    #[tokio::test]
    async fn test_chat_json_mode_sets_response_format() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .json_body_partial(r#"{"response_format": {"type": "json_object"}}"#);
            then.status(200).json_body(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "{\"verified\": true}" } }],
                "usage": { "total_tokens": 42 }
            }));
        }).await;

        let request = LlmRequest::prompt("mistral-large-latest", "verify").with_json_mode();
        let response = client_for(&server).complete(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, "{\"verified\": true}");
        assert_eq!(response.tokens_used, 42);
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(GET).path("/v1/files/missing");
            then.status(404).body("{\"detail\":\"not found\"}");
        }).await;

        let err = client_for(&server).retrieve("missing").await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_error_detail_keeps_numbers() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(GET).path("/v1/files/big");
            then.status(413)
                .body("{\"message\":\"file of 5368709120 bytes exceeds limit, retry after 1696509045\"}");
        }).await;

        let message = client_for(&server).retrieve("big").await.unwrap_err().to_string();
        assert!(message.contains("413"));
        assert!(message.contains("5368709120 bytes"));
        assert!(message.contains("1696509045"));
        assert!(!message.contains("[REDACTED_PHONE]"));
    }
}
