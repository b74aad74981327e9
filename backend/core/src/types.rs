use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OcrAgentsError;

/// Onboarding document categories a client can declare for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentCategory {
    #[serde(rename = "Proof of Identity")]
    ProofOfIdentity,
    #[serde(rename = "Proof of Residence")]
    ProofOfResidence,
    #[serde(rename = "Proof of Income")]
    ProofOfIncome,
    #[serde(rename = "Employment Letter")]
    EmploymentLetter,
    #[serde(rename = "Application Form")]
    ApplicationForm,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 5] = [
        Self::ProofOfIdentity,
        Self::ProofOfResidence,
        Self::ProofOfIncome,
        Self::EmploymentLetter,
        Self::ApplicationForm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProofOfIdentity => "Proof of Identity",
            Self::ProofOfResidence => "Proof of Residence",
            Self::ProofOfIncome => "Proof of Income",
            Self::EmploymentLetter => "Employment Letter",
            Self::ApplicationForm => "Application Form",
        }
    }

    /// Comma-separated display list, used in prompts and error details.
    pub fn valid_list() -> String {
        Self::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentCategory {
    type Err = OcrAgentsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| OcrAgentsError::InvalidCategory(Self::valid_list()))
    }
}

/// Academic modules accepted by the assignment assessment endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcademicModule {
    MachineLearning,
    DataStructuresAndAlgorithms,
    DatabaseSystems,
    OperatingSystems,
    ComputerNetworks,
    SoftwareEngineering,
    ArtificialIntelligence,
    CloudComputing,
    WebDevelopment,
    CybersecurityFundamentals,
}

impl AcademicModule {
    pub const ALL: [AcademicModule; 10] = [
        Self::MachineLearning,
        Self::DataStructuresAndAlgorithms,
        Self::DatabaseSystems,
        Self::OperatingSystems,
        Self::ComputerNetworks,
        Self::SoftwareEngineering,
        Self::ArtificialIntelligence,
        Self::CloudComputing,
        Self::WebDevelopment,
        Self::CybersecurityFundamentals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MachineLearning => "Machine Learning",
            Self::DataStructuresAndAlgorithms => "Data Structures and Algorithms",
            Self::DatabaseSystems => "Database Systems",
            Self::OperatingSystems => "Operating Systems",
            Self::ComputerNetworks => "Computer Networks",
            Self::SoftwareEngineering => "Software Engineering",
            Self::ArtificialIntelligence => "Artificial Intelligence",
            Self::CloudComputing => "Cloud Computing",
            Self::WebDevelopment => "Web Development",
            Self::CybersecurityFundamentals => "Cybersecurity Fundamentals",
        }
    }

    pub fn valid_list() -> String {
        Self::ALL.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for AcademicModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcademicModule {
    type Err = OcrAgentsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| OcrAgentsError::InvalidModule(Self::valid_list()))
    }
}

/// Media types the OCR backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedMedia {
    Pdf,
    Jpeg,
    Png,
}

impl SupportedMedia {
    pub const ALL: [SupportedMedia; 3] = [Self::Pdf, Self::Jpeg, Self::Png];

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.mime() == mime)
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, Self::Pdf)
    }

    /// `"document"` for PDFs, `"image"` for everything else.
    pub fn ocr_type(&self) -> &'static str {
        if self.is_image() {
            "image"
        } else {
            "document"
        }
    }

    /// Document chunk kind expected by the OCR endpoint.
    pub fn document_kind(&self) -> &'static str {
        if self.is_image() {
            "image_url"
        } else {
            "document_url"
        }
    }

    pub fn valid_list() -> String {
        Self::ALL.iter().map(|m| m.mime()).collect::<Vec<_>>().join(", ")
    }
}

/// A file received from a client, held in memory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Resolve the declared content type, rejecting anything unsupported.
    pub fn media(&self) -> Result<SupportedMedia, OcrAgentsError> {
        SupportedMedia::from_mime(&self.content_type)
            .ok_or_else(|| OcrAgentsError::UnsupportedMediaType(SupportedMedia::valid_list()))
    }
}

/// A file stored in the document backend together with a signed access URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub id: String,
    pub url: String,
}

impl StoredFile {
    /// Relative browser view path returned alongside stored files.
    pub fn view_url(&self) -> String {
        view_url(&self.id)
    }
}

pub fn view_url(file_id: &str) -> String {
    format!("/file-view/{file_id}")
}

/// `created_at` as reported by the backend: either epoch seconds or a timestamp string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CreatedAt {
    Epoch(i64),
    Text(String),
}

impl CreatedAt {
    /// ISO-8601 rendering. Epoch seconds become UTC with a trailing `Z`.
    pub fn to_iso(&self) -> String {
        match self {
            Self::Epoch(secs) => DateTime::<Utc>::from_timestamp(*secs, 0)
                .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
                .unwrap_or_else(|| secs.to_string()),
            Self::Text(s) => s.clone(),
        }
    }
}

/// File metadata exposed by the document info endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub file_id: String,
    pub filename: String,
    pub purpose: String,
    pub created_at: String,
    pub object: String,
    pub status_details: Option<String>,
    pub size_bytes: Option<u64>,
}

/// Raw content fetched through a signed URL.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl FetchedContent {
    pub const DEFAULT_CONTENT_TYPE: &'static str = "application/octet-stream";
}

/// One page of OCR output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OcrPage {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub markdown: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_exact_match_only() {
        assert_eq!(
            "Proof of Income".parse::<DocumentCategory>().unwrap(),
            DocumentCategory::ProofOfIncome
        );
        let err = "proof of income".parse::<DocumentCategory>().unwrap_err();
        assert!(err.to_string().starts_with("Invalid category. Valid categories: Proof of Identity"));
    }

    #[test]
    fn test_category_serializes_as_display_name() {
        let json = serde_json::to_string(&DocumentCategory::EmploymentLetter).unwrap();
        assert_eq!(json, "\"Employment Letter\"");
    }

    #[test]
    fn test_module_parse() {
        assert_eq!(
            "Web Development".parse::<AcademicModule>().unwrap(),
            AcademicModule::WebDevelopment
        );
        assert!(matches!(
            "Basket Weaving".parse::<AcademicModule>(),
            Err(OcrAgentsError::InvalidModule(_))
        ));
    }

    #[test]
    fn test_media_kinds() {
        let pdf = SupportedMedia::from_mime("application/pdf").unwrap();
        assert_eq!(pdf.ocr_type(), "document");
        assert_eq!(pdf.document_kind(), "document_url");

        let png = SupportedMedia::from_mime("image/png").unwrap();
        assert_eq!(png.ocr_type(), "image");
        assert_eq!(png.document_kind(), "image_url");

        assert!(SupportedMedia::from_mime("image/gif").is_none());
    }

    #[test]
    fn test_uploaded_file_rejects_unsupported_media() {
        let file = UploadedFile::new("notes.txt", "text/plain", b"hi".to_vec());
        let err = file.media().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported file type. Supported types: application/pdf, image/jpeg, image/png"
        );
    }

    #[test]
    fn test_created_at_epoch_is_utc_iso() {
        assert_eq!(CreatedAt::Epoch(1_696_509_045).to_iso(), "2023-10-05T12:30:45Z");
        assert_eq!(
            CreatedAt::Text("2023-10-05T12:30:45Z".into()).to_iso(),
            "2023-10-05T12:30:45Z"
        );
    }

    #[test]
    fn test_view_url() {
        let stored = StoredFile {
            id: "file-abc123".into(),
            url: "https://signed.example/abc".into(),
        };
        assert_eq!(stored.view_url(), "/file-view/file-abc123");
    }
}
