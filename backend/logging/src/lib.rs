//! Telemetry and structured logging components for ocr-agents.
//!
//! Handles subscriber setup, NDJSON file rotation, and redaction of secrets
//! that may appear in upstream error bodies.

pub mod logger;
pub mod redact;

pub use logger::init_logger;
pub use redact::{redact_secrets, redact_sensitive_data};
