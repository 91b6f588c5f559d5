use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::capture::CaptureImage;
use crate::config::{OcrEngineKind, ProviderKind, Settings, TranslationMode};
use crate::error::{OcrTranslatorError, Result};
use crate::http::HttpTransport;
use crate::manager::TranslationManager;
use crate::ocr::{OcrEngine, OcrFactory};
use crate::translate::{TranslationRequest, TranslationResult};

/// Capture -> (OCR) -> translation pipeline
pub struct Workflow {
    manager: TranslationManager,
    tesseract: Arc<dyn OcrEngine>,
    vision: Arc<dyn OcrEngine>,
}

impl Workflow {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            manager: TranslationManager::new(transport.clone()),
            tesseract: OcrFactory::create_engine(OcrEngineKind::Tesseract, transport.clone()),
            vision: OcrFactory::create_engine(OcrEngineKind::Vision, transport),
        }
    }

    /// Build with explicit OCR engines
    pub fn with_engines(
        manager: TranslationManager,
        tesseract: Arc<dyn OcrEngine>,
        vision: Arc<dyn OcrEngine>,
    ) -> Self {
        Self { manager, tesseract, vision }
    }

    pub fn manager(&self) -> &TranslationManager {
        &self.manager
    }

    fn ocr_engine(&self, settings: &Settings) -> &dyn OcrEngine {
        match settings.ocr.engine {
            OcrEngineKind::Tesseract => self.tesseract.as_ref(),
            OcrEngineKind::Vision => self.vision.as_ref(),
        }
    }

    /// Translate a captured region according to the configured mode
    pub async fn process_capture(&self, request_id: Uuid, image: CaptureImage, settings: &Settings) -> TranslationResult {
        let target = settings.language.target_language.clone();

        match settings.translation.mode {
            TranslationMode::CombinedVision => {
                info!("Processing capture {} in combined vision mode", request_id);
                let request = TranslationRequest::image(image, target, settings.translation.include_original_text)
                    .with_id(request_id);
                self.manager.translate(&request, settings).await
            }
            TranslationMode::TwoStep => {
                info!("Processing capture {} in two-step mode", request_id);
                let text = match self.extract_text(&image, &settings.ocr_language(), settings).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("OCR failed for capture {}: {}", request_id, e);
                        return TranslationResult::failure(request_id, None, String::new(), &e);
                    }
                };

                let request = TranslationRequest::text(text, target).with_id(request_id);
                self.manager.translate(&request, settings).await
            }
        }
    }

    /// Run the configured OCR engine; no text is an OCR error
    pub async fn extract_text(&self, image: &CaptureImage, language: &str, settings: &Settings) -> Result<String> {
        let engine = self.ocr_engine(settings);
        info!("Extracting text with {} ({})", engine.name(), language);

        let text = engine.extract_text(image, language, settings).await?;
        if text.trim().is_empty() {
            return Err(OcrTranslatorError::Ocr("No text found in the captured image".to_string()));
        }
        Ok(text)
    }

    pub async fn translate_text(&self, request_id: Uuid, text: &str, settings: &Settings) -> TranslationResult {
        let request = TranslationRequest::text(text, settings.language.target_language.clone()).with_id(request_id);
        self.manager.translate(&request, settings).await
    }

    pub async fn verify_api_key(&self, provider: ProviderKind, settings: &Settings) -> Result<()> {
        self.manager.verify_api_key(provider, settings).await
    }

    /// Check the configured OCR engine (only matters for two-step mode)
    pub async fn check_ocr_availability(&self, settings: &Settings) -> Result<()> {
        self.ocr_engine(settings).check_availability(settings).await
    }
}
