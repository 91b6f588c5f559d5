// Modular translation architecture
//
// Each provider backend turns a provider-neutral `Prompt` into its own HTTP
// payload and parses the reply. Everything above that (prompt building,
// request dispatch, combined vision handling) is shared:
// - OpenAI: chat completions, or the Responses API for gpt-5 models
// - Gemini: generateContent
// - Vision: combined OCR + translation and vision OCR on top of either backend

pub mod common;
pub mod gemini;
pub mod openai;
pub mod vision;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub use common::*;
use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{OcrTranslatorError, Result};
use crate::http::HttpTransport;
use crate::language::detect_language;
use vision::CombinedVisionTranslator;

/// What a backend can do with the given model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub translate_text: bool,
    pub translate_image: bool,
}

/// Main trait for translation backends
#[async_trait]
pub trait TranslationService: Send + Sync {
    fn provider(&self) -> ProviderKind;

    fn capabilities(&self, config: &ProviderConfig) -> Capabilities;

    /// Issue one completion call and return the first candidate's text
    async fn complete(&self, prompt: &Prompt<'_>, config: &ProviderConfig) -> Result<String>;

    /// Cheap authenticated call used to check the configured key
    async fn verify_api_key(&self, config: &ProviderConfig) -> Result<()>;

    /// Translate a text or image request with exactly one network call
    async fn translate(&self, request: &TranslationRequest, config: &ProviderConfig) -> Result<TranslationResult> {
        if config.provider != self.provider() {
            return Err(OcrTranslatorError::Config(format!(
                "{} backend cannot use {} credentials",
                self.provider(),
                config.provider
            )));
        }

        let capabilities = self.capabilities(config);
        let target = request.target_language().trim();
        if target.is_empty() {
            return Err(OcrTranslatorError::InvalidRequest("No target language given".to_string()));
        }

        match request.input() {
            TranslationInput::Text(text) => {
                if !capabilities.translate_text {
                    return Err(OcrTranslatorError::Config(format!(
                        "Model '{}' cannot translate text",
                        config.model
                    )));
                }
                if text.trim().is_empty() {
                    warn!("No text to translate");
                    return Err(OcrTranslatorError::InvalidRequest("No text to translate".to_string()));
                }

                info!("Translating {} chars via {} ({}) into {}", text.chars().count(), self.provider(), config.model, target);
                let prompt = text_translation_prompt(text, target);
                let translated = self.complete(&prompt, config).await?;

                Ok(TranslationResult::success(
                    request.id(),
                    self.provider(),
                    text.clone(),
                    translated,
                    detect_language(text).map(str::to_string),
                ))
            }
            TranslationInput::Image { image, include_original } => {
                let (original, translated) = CombinedVisionTranslator::<Self>::new(self)
                    .translate_image(image, target, *include_original, config)
                    .await?;
                let source_language = detect_language(&original).map(str::to_string);

                Ok(TranslationResult::success(
                    request.id(),
                    self.provider(),
                    original,
                    translated,
                    source_language,
                ))
            }
        }
    }
}

/// Factory for creating translation backends
pub struct TranslatorFactory;

impl TranslatorFactory {
    /// Create the backend for a provider
    pub fn create_translator(provider: ProviderKind, transport: Arc<dyn HttpTransport>) -> Box<dyn TranslationService> {
        match provider {
            ProviderKind::OpenAI => Box::new(openai::OpenAiTranslator::new(transport)),
            ProviderKind::Gemini => Box::new(gemini::GeminiTranslator::new(transport)),
        }
    }
}
