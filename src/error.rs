use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrTranslatorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited by provider: {0}")]
    RateLimit(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Coarse classification of a failure, carried by a failed `TranslationResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Auth,
    RateLimit,
    Provider,
    Config,
    Ocr,
    Capture,
    InvalidRequest,
    Io,
}

impl OcrTranslatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Auth(_) => ErrorKind::Auth,
            Self::RateLimit(_) => ErrorKind::RateLimit,
            Self::Provider(_) | Self::Json(_) => ErrorKind::Provider,
            Self::Config(_) | Self::Toml(_) => ErrorKind::Config,
            Self::Ocr(_) => ErrorKind::Ocr,
            Self::Capture(_) => ErrorKind::Capture,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Network => "NetworkError",
            Self::Auth => "AuthError",
            Self::RateLimit => "RateLimitError",
            Self::Provider => "ProviderError",
            Self::Config => "ConfigError",
            Self::Ocr => "OcrError",
            Self::Capture => "CaptureError",
            Self::InvalidRequest => "InvalidRequest",
            Self::Io => "IoError",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, OcrTranslatorError>;
