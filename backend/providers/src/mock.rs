use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use ocr_agents_core::{
    DocumentBackend, FetchedContent, FileInfo, LlmProvider, LlmRequest, LlmResponse, OcrPage,
    SupportedMedia, UploadedFile,
};

/// A mock LLM provider that returns canned responses.
pub struct MockProvider {
    name: String,
    fixed_response: Option<String>,
    fail_with: Option<String>,
    prompts: Mutex<Vec<LlmRequest>>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixed_response: None,
            fail_with: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.fixed_response = Some(response.into());
        self
    }

    /// Make every call fail with the given message.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, req: &LlmRequest) -> Result<LlmResponse> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(req.clone());
        }
        if let Some(message) = &self.fail_with {
            bail!("{}", message);
        }
        Ok(LlmResponse {
            content: self.fixed_response.clone().unwrap_or_else(|| "Mock response".to_string()),
            provider: self.name.clone(),
            model: req.model.clone(),
            tokens_used: 0,
            latency_ms: 0,
        })
    }
}

struct StoredEntry {
    file: UploadedFile,
    created_at: i64,
}

/// In-memory document backend. OCR returns one page per `\f`-separated chunk of the file body.
pub struct MockDocumentBackend {
    files: Mutex<HashMap<String, StoredEntry>>,
    fail_ocr: bool,
}

impl MockDocumentBackend {
    const URL_PREFIX: &'static str = "https://files.mock/";

    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            fail_ocr: false,
        }
    }

    pub fn with_failing_ocr(mut self) -> Self {
        self.fail_ocr = true;
        self
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().map(|f| f.len()).unwrap_or(0)
    }

    fn id_from_url<'a>(&self, url: &'a str) -> Result<&'a str> {
        url.strip_prefix(Self::URL_PREFIX)
            .ok_or_else(|| anyhow!("unknown signed URL: {url}"))
    }

    fn with_entry<T>(&self, file_id: &str, f: impl FnOnce(&StoredEntry) -> T) -> Result<T> {
        let files = self.files.lock().map_err(|_| anyhow!("mock store poisoned"))?;
        files
            .get(file_id)
            .map(f)
            .ok_or_else(|| anyhow!("No file with id {file_id}"))
    }
}

impl Default for MockDocumentBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentBackend for MockDocumentBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload(&self, file: &UploadedFile) -> Result<String> {
        let id = format!("file-{}", Uuid::new_v4().simple());
        let mut files = self.files.lock().map_err(|_| anyhow!("mock store poisoned"))?;
        files.insert(
            id.clone(),
            StoredEntry {
                file: file.clone(),
                created_at: Utc::now().timestamp(),
            },
        );
        Ok(id)
    }

    async fn signed_url(&self, file_id: &str) -> Result<String> {
        self.with_entry(file_id, |_| format!("{}{}", Self::URL_PREFIX, file_id))
    }

    async fn retrieve(&self, file_id: &str) -> Result<FileInfo> {
        self.with_entry(file_id, |entry| FileInfo {
            file_id: file_id.to_string(),
            filename: entry.file.filename.clone(),
            purpose: "ocr".to_string(),
            created_at: ocr_agents_core::CreatedAt::Epoch(entry.created_at).to_iso(),
            object: "file".to_string(),
            status_details: None,
            size_bytes: Some(entry.file.bytes.len() as u64),
        })
    }

    async fn ocr(&self, url: &str, media: SupportedMedia) -> Result<Vec<OcrPage>> {
        if self.fail_ocr {
            bail!("OCR service unavailable");
        }
        let id = self.id_from_url(url)?;
        let text = self.with_entry(id, |entry| {
            String::from_utf8_lossy(&entry.file.bytes).into_owned()
        })?;
        if media.mime() != self.with_entry(id, |e| e.file.content_type.clone())? {
            bail!("media type mismatch for {id}");
        }
        Ok(text
            .split('\u{c}')
            .enumerate()
            .map(|(index, chunk)| OcrPage {
                index: index as u32,
                markdown: chunk.trim().to_string(),
            })
            .collect())
    }

    async fn fetch(&self, url: &str) -> Result<FetchedContent> {
        let id = self.id_from_url(url)?;
        self.with_entry(id, |entry| FetchedContent {
            bytes: entry.file.bytes.clone(),
            content_type: entry.file.content_type.clone(),
        })
    }
}
