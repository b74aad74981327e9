use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use ocr_agents_core::{
    estimate_pages, DocumentBackend, FetchedContent, FileInfo, OcrAgentsError, Result,
    StoredFile, SupportedMedia, UploadedFile,
};

/// Joined OCR output for one uploaded file.
#[derive(Debug, Clone, Serialize)]
pub struct OcrOutcome {
    pub markdown: String,
    pub file_id: String,
    pub file_url: String,
    #[serde(skip)]
    pub media: SupportedMedia,
}

impl OcrOutcome {
    pub fn pages(&self) -> usize {
        estimate_pages(&self.markdown)
    }

    pub fn view_url(&self) -> String {
        ocr_agents_core::view_url(&self.file_id)
    }
}

/// Upload → signed URL → OCR, plus the read-side file operations.
pub struct OcrPipeline {
    backend: Arc<dyn DocumentBackend>,
}

impl OcrPipeline {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self { backend }
    }

    /// Store `file` and return its id with a signed URL.
    pub async fn store(&self, file: &UploadedFile) -> Result<StoredFile> {
        file.media()?;
        let id = self.backend.upload(file).await?;
        let url = self.backend.signed_url(&id).await?;
        info!(file_id = %id, filename = %file.filename, "File stored");
        Ok(StoredFile { id, url })
    }

    /// Store `file`, OCR it, and join page markdown with blank lines.
    pub async fn process(&self, file: &UploadedFile) -> Result<OcrOutcome> {
        let media = file.media()?;
        let outcome = self.run(file, media).await.map_err(|e| {
            warn!(filename = %file.filename, error = %e, "OCR failed");
            OcrAgentsError::upstream(
                self.backend.name(),
                format!("OCR processing failed: {e}"),
            )
        })?;
        info!(
            file_id = %outcome.file_id,
            pages = outcome.pages(),
            chars = outcome.markdown.len(),
            "OCR completed"
        );
        Ok(outcome)
    }

    async fn run(&self, file: &UploadedFile, media: SupportedMedia) -> anyhow::Result<OcrOutcome> {
        let file_id = self.backend.upload(file).await?;
        let file_url = self.backend.signed_url(&file_id).await?;
        let pages = self.backend.ocr(&file_url, media).await?;

        let markdown = pages
            .into_iter()
            .map(|p| p.markdown)
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(OcrOutcome {
            markdown,
            file_id,
            file_url,
            media,
        })
    }

    pub async fn signed_url(&self, file_id: &str) -> Result<String> {
        Ok(self.backend.signed_url(file_id).await?)
    }

    pub async fn info(&self, file_id: &str) -> Result<FileInfo> {
        Ok(self.backend.retrieve(file_id).await?)
    }

    /// Resolve a signed URL for `file_id` and download the content behind it.
    pub async fn download(&self, file_id: &str) -> Result<FetchedContent> {
        let url = self.backend.signed_url(file_id).await?;
        Ok(self.backend.fetch(&url).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocr_agents_providers::MockDocumentBackend;

    fn pipeline() -> (Arc<MockDocumentBackend>, OcrPipeline) {
        let backend = Arc::new(MockDocumentBackend::new());
        (backend.clone(), OcrPipeline::new(backend))
    }

    #[tokio::test]
    async fn test_process_joins_pages() {
        let (_, pipeline) = pipeline();
        let file = UploadedFile::new(
            "statement.pdf",
            "application/pdf",
            "# Page 1\u{c}Page 2\u{c}Page 3".as_bytes().to_vec(),
        );

        let outcome = pipeline.process(&file).await.unwrap();
        assert_eq!(outcome.markdown, "# Page 1\n\nPage 2\n\nPage 3");
        assert_eq!(outcome.pages(), 3);
        assert!(outcome.file_url.ends_with(&outcome.file_id));
        assert_eq!(outcome.view_url(), format!("/file-view/{}", outcome.file_id));
    }

    #[tokio::test]
    async fn test_process_rejects_unsupported_media_before_upload() {
        let (backend, pipeline) = pipeline();
        let file = UploadedFile::new("a.gif", "image/gif", vec![1, 2, 3]);

        let err = pipeline.process(&file).await.unwrap_err();
        assert!(matches!(err, OcrAgentsError::UnsupportedMediaType(_)));
        assert_eq!(backend.file_count(), 0);
    }

    #[tokio::test]
    async fn test_ocr_failure_is_wrapped() {
        let backend = Arc::new(MockDocumentBackend::new().with_failing_ocr());
        let pipeline = OcrPipeline::new(backend);
        let file = UploadedFile::new("id.png", "image/png", b"scan".to_vec());

        let err = pipeline.process(&file).await.unwrap_err();
        assert!(err.to_string().contains("OCR processing failed: OCR service unavailable"));
    }

    #[tokio::test]
    async fn test_store_and_download() {
        let (_, pipeline) = pipeline();
        let file = UploadedFile::new("photo.jpg", "image/jpeg", b"jpegbytes".to_vec());

        let stored = pipeline.store(&file).await.unwrap();
        let fetched = pipeline.download(&stored.id).await.unwrap();
        assert_eq!(fetched.bytes, b"jpegbytes");
        assert_eq!(fetched.content_type, "image/jpeg");

        let info = pipeline.info(&stored.id).await.unwrap();
        assert_eq!(info.filename, "photo.jpg");
        assert_eq!(info.size_bytes, Some(9));
    }

    #[tokio::test]
    async fn test_download_unknown_file() {
        let (_, pipeline) = pipeline();
        assert!(pipeline.download("file-missing").await.is_err());
    }
}
