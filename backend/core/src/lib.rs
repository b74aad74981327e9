pub mod error;
pub mod json;
pub mod traits;
pub mod types;

pub use error::{OcrAgentsError, Result};
pub use json::{estimate_pages, extract_json_array, extract_json_object, require_keys, truncate_chars};
pub use traits::{DocumentBackend, LlmProvider, LlmRequest, LlmResponse};
pub use types::{
    view_url, AcademicModule, CreatedAt, DocumentCategory, FetchedContent, FileInfo, OcrPage,
    StoredFile, SupportedMedia, UploadedFile,
};
