use std::path::PathBuf;

use ocr_agents_core::OcrAgentsError;
use ocr_agents_providers::{gemini, mistral};

/// ocr-agents service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address
    pub bind_address: String,
    /// HTTP server port
    pub port: u16,
    pub mistral_api_key: Option<String>,
    pub mistral_base_url: String,
    pub google_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    /// Request body limit for multipart uploads, in megabytes
    pub max_upload_mb: usize,
    /// Directory for the rolling NDJSON log file
    pub log_dir: Option<PathBuf>,
    /// Log level
    pub log_level: String,
    /// JSON console output; plain text when false
    pub json_logs: bool,

    // Tunnel
    pub enable_ngrok: bool,
    pub ngrok_bin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            mistral_api_key: None,
            mistral_base_url: mistral::DEFAULT_BASE_URL.to_string(),
            google_api_key: None,
            gemini_base_url: gemini::DEFAULT_BASE_URL.to_string(),
            gemini_model: gemini::DEFAULT_MODEL.to_string(),
            max_upload_mb: 25,
            log_dir: None,
            log_level: "info".to_string(),
            json_logs: true,
            enable_ngrok: false,
            ngrok_bin: "ngrok".to_string(),
        }
    }
}

fn flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind_address: var("OCR_AGENTS_BIND").unwrap_or(defaults.bind_address),
            port: var("OCR_AGENTS_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            mistral_api_key: var("MISTRAL_API_KEY").filter(|k| !k.trim().is_empty()),
            mistral_base_url: var("MISTRAL_BASE_URL").unwrap_or(defaults.mistral_base_url),
            google_api_key: var("GOOGLE_API_KEY").filter(|k| !k.trim().is_empty()),
            gemini_base_url: var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            gemini_model: var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            max_upload_mb: var("OCR_AGENTS_MAX_UPLOAD_MB")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_upload_mb),
            log_dir: var("OCR_AGENTS_LOG_DIR").map(PathBuf::from),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            json_logs: var("OCR_AGENTS_LOG_JSON")
                .map(|v| flag(&v))
                .unwrap_or(defaults.json_logs),
            enable_ngrok: var("OCR_AGENTS_ENABLE_NGROK")
                .map(|v| flag(&v))
                .unwrap_or(defaults.enable_ngrok),
            ngrok_bin: var("NGROK_BIN").unwrap_or(defaults.ngrok_bin),
        }
    }

    /// Both provider keys are needed before the server can start.
    pub fn validate(&self) -> Result<(), OcrAgentsError> {
        if self.mistral_api_key.is_none() {
            return Err(OcrAgentsError::Config(
                "MISTRAL_API_KEY environment variable not set".into(),
            ));
        }
        if self.google_api_key.is_none() {
            return Err(OcrAgentsError::Config(
                "GOOGLE_API_KEY environment variable not set".into(),
            ));
        }
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_upload_bytes(), 25 * 1024 * 1024);
        assert!(!config.enable_ngrok);
        assert!(config.json_logs);
    }

    #[test]
    fn test_from_vars() {
        let vars: std::collections::HashMap<&str, &str> = [
            ("OCR_AGENTS_PORT", "9100"),
            ("OCR_AGENTS_LOG_JSON", "false"),
            ("OCR_AGENTS_ENABLE_NGROK", "yes"),
            ("MISTRAL_API_KEY", "  "),
        ]
        .into_iter()
        .collect();
        let config = Config::from_vars(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.port, 9100);
        assert!(!config.json_logs);
        assert!(config.enable_ngrok);
        assert!(config.mistral_api_key.is_none());
        assert_eq!(config.ngrok_bin, "ngrok");

        let config = Config::from_vars(|_| None);
        assert!(config.json_logs);
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_validate_requires_both_keys() {
        let mut config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("MISTRAL_API_KEY"));

        config.mistral_api_key = Some("m-key".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));

        config.google_api_key = Some("g-key".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flag_values() {
        assert!(flag("1"));
        assert!(flag("TRUE"));
        assert!(!flag("0"));
        assert!(!flag(""));
    }
}
