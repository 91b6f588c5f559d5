use tracing::info;

use crate::capture::CaptureImage;
use crate::config::ProviderConfig;
use crate::error::{OcrTranslatorError, Result};
use super::{TranslationService, common::{image_translation_prompt, ocr_prompt, parse_vision_reply}};

/// Combined vision mode: recognition and translation in one multimodal call.
/// Also provides vision OCR for the two-step flow.
pub struct CombinedVisionTranslator<'a, S: TranslationService + ?Sized> {
    service: &'a S,
}

impl<'a, S: TranslationService + ?Sized> CombinedVisionTranslator<'a, S> {
    pub fn new(service: &'a S) -> Self {
        Self { service }
    }

    /// Returns (original, translation); original is empty unless requested
    /// and supplied by the provider
    pub async fn translate_image(
        &self,
        image: &CaptureImage,
        target_language: &str,
        include_original: bool,
        config: &ProviderConfig,
    ) -> Result<(String, String)> {
        self.ensure_vision(config)?;

        info!(
            "Combined vision translation of {}x{} image via {} ({}) into {}",
            image.width(),
            image.height(),
            self.service.provider(),
            config.model,
            target_language
        );

        let prompt = image_translation_prompt(image, target_language, include_original);
        let reply = self.service.complete(&prompt, config).await?;
        let (original, translation) = parse_vision_reply(&reply, include_original);

        if translation.is_empty() {
            return Err(OcrTranslatorError::Provider("Empty translation received".to_string()));
        }

        info!("Combined vision translation completed ({} chars)", translation.chars().count());
        Ok((original, translation))
    }

    /// OCR through the provider's vision model
    pub async fn extract_text(
        &self,
        image: &CaptureImage,
        language_hint: Option<&str>,
        config: &ProviderConfig,
    ) -> Result<String> {
        self.ensure_vision(config)?;

        let prompt = ocr_prompt(image, language_hint);
        let text = self.service.complete(&prompt, config).await?;

        info!("Vision OCR completed ({} chars)", text.chars().count());
        Ok(text.trim().to_string())
    }

    fn ensure_vision(&self, config: &ProviderConfig) -> Result<()> {
        if self.service.capabilities(config).translate_image {
            Ok(())
        } else {
            Err(OcrTranslatorError::Config(format!(
                "Model '{}' does not accept image input; choose a vision-capable model or the two-step mode",
                config.model
            )))
        }
    }
}
