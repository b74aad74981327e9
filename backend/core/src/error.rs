use thiserror::Error;

/// Top-level error type for the ocr-agents service.
#[derive(Debug, Error)]
pub enum OcrAgentsError {
    #[error("Invalid category. Valid categories: {0}")]
    InvalidCategory(String),

    #[error("Invalid module. Valid modules: {0}")]
    InvalidModule(String),

    #[error("Unsupported file type. Supported types: {0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{provider} request failed: {message}")]
    Upstream { provider: String, message: String },

    #[error("No JSON found in model response")]
    NoJsonFound,

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OcrAgentsError {
    pub fn upstream(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// True for errors caused by the caller's input rather than a dependency.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCategory(_)
                | Self::InvalidModule(_)
                | Self::UnsupportedMediaType(_)
                | Self::InvalidInput(_)
        )
    }
}

pub type Result<T, E = OcrAgentsError> = std::result::Result<T, E>;
