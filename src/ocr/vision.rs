use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::capture::CaptureImage;
use crate::config::Settings;
use crate::error::Result;
use crate::http::HttpTransport;
use crate::language::tesseract_code_to_name;
use crate::translate::{TranslatorFactory, vision::CombinedVisionTranslator};
use super::OcrEngine;

/// OCR through the selected provider's vision model
pub struct VisionOcr {
    transport: Arc<dyn HttpTransport>,
}

impl VisionOcr {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    fn name(&self) -> &'static str {
        "vision"
    }

    async fn extract_text(&self, image: &CaptureImage, language: &str, settings: &Settings) -> Result<String> {
        let config = settings.active_provider()?;
        let service = TranslatorFactory::create_translator(config.provider, self.transport.clone());
        info!("Running vision OCR via {} ({})", config.provider, config.model);

        let hint = language
            .split('+')
            .map(tesseract_code_to_name)
            .collect::<Vec<_>>()
            .join(" or ");

        CombinedVisionTranslator::new(service.as_ref())
            .extract_text(image, Some(&hint), &config)
            .await
    }

    async fn check_availability(&self, settings: &Settings) -> Result<()> {
        settings.active_provider().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tests::sample_png;
    use crate::error::OcrTranslatorError;
    use crate::http::{HttpRequest, HttpResponse, MockHttpTransport};

    #[tokio::test]
    async fn test_vision_ocr_prompt_and_result() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .withf(|req: &HttpRequest| {
                let text = req.body.as_ref().unwrap()["contents"][0]["parts"][0]["text"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                text.contains("OCR only") && text.contains("Japanese or English")
            })
            .times(1)
            .returning(|_| Ok(HttpResponse {
                status: 200,
                body: r#"{"candidates":[{"content":{"parts":[{"text":"はじめる\nつづける\n"}]}}]}"#.to_string(),
            }));

        let mut settings = Settings::default();
        settings.api.selected_api = crate::config::ProviderKind::Gemini;
        settings.gemini.api_key = "gm-key".to_string();

        let engine = VisionOcr::new(Arc::new(transport));
        let image = CaptureImage::from_bytes(sample_png(8, 8)).unwrap();
        let text = engine.extract_text(&image, "jpn+eng", &settings).await.unwrap();
        assert_eq!(text, "はじめる\nつづける");
    }

    #[tokio::test]
    async fn test_vision_ocr_requires_key() {
        let mut transport = MockHttpTransport::new();
        transport.expect_send().never();

        let engine = VisionOcr::new(Arc::new(transport));
        let image = CaptureImage::from_bytes(sample_png(8, 8)).unwrap();
        let err = engine.extract_text(&image, "eng", &Settings::default()).await.unwrap_err();
        assert!(matches!(err, OcrTranslatorError::Config(_)));
        assert!(engine.check_availability(&Settings::default()).await.is_err());
    }
}
