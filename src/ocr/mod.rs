// OCR engine adapters
//
// - Tesseract: external tesseract binary, the default two-step engine
// - Vision: the selected provider's vision model transcribes the image

pub mod tesseract;
pub mod vision;

use async_trait::async_trait;
use std::sync::Arc;

use crate::capture::CaptureImage;
use crate::config::{OcrEngineKind, Settings};
use crate::error::Result;
use crate::http::HttpTransport;

/// Main trait for OCR operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Extract raw text; `language` uses tesseract codes such as "jpn+eng".
    /// An image without text yields an empty string.
    async fn extract_text(&self, image: &CaptureImage, language: &str, settings: &Settings) -> Result<String>;

    /// Check that the engine can run with the current settings
    async fn check_availability(&self, settings: &Settings) -> Result<()>;
}

/// Factory for creating OCR engines
pub struct OcrFactory;

impl OcrFactory {
    pub fn create_engine(kind: OcrEngineKind, transport: Arc<dyn HttpTransport>) -> Arc<dyn OcrEngine> {
        match kind {
            OcrEngineKind::Tesseract => Arc::new(tesseract::TesseractOcr::new()),
            OcrEngineKind::Vision => Arc::new(vision::VisionOcr::new(transport)),
        }
    }
}
