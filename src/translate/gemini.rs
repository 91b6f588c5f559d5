// Gemini backend (generateContent)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{OcrTranslatorError, Result};
use crate::http::{check_status, HttpRequest, HttpTransport};
use super::{Capabilities, Prompt, TranslationService};

const TEMPERATURE: f32 = 0.3;
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Gemini implementation. Every current Gemini model accepts images.
pub struct GeminiTranslator {
    transport: Arc<dyn HttpTransport>,
}

impl GeminiTranslator {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn build_request(&self, prompt: &Prompt<'_>, config: &ProviderConfig) -> Result<HttpRequest> {
        let mut parts = vec![Part::Text { text: &prompt.user }];
        if let Some(image) = prompt.image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type(),
                    data: image.to_base64(),
                },
            });
        }

        let body = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text { text: &prompt.system }],
            },
            contents: vec![Content { role: Some("user"), parts }],
            generation_config: GenerationConfig { temperature: TEMPERATURE },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            config.base_url,
            model_id(&config.model)
        );
        Ok(HttpRequest::post(url, serde_json::to_value(&body)?, config.timeout)
            .header("x-goog-api-key", config.api_key.as_str()))
    }
}

/// Accept both "gemini-flash-latest" and "models/gemini-flash-latest"
fn model_id(model: &str) -> &str {
    model.trim().strip_prefix("models/").unwrap_or(model.trim())
}

/// Text of the first candidate, all parts joined
fn parse_response(body: &str) -> Result<String> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| OcrTranslatorError::Provider(format!("Failed to parse Gemini response: {}", e)))?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|r| format!(" (blocked: {})", r))
            .unwrap_or_default();
        return Err(OcrTranslatorError::Provider(format!("Gemini returned no candidates{}", reason)));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    let trimmed = text.trim();
    if trimmed.is_empty() {
        let reason = candidate
            .finish_reason
            .map(|r| format!(" (finish reason: {})", r))
            .unwrap_or_default();
        return Err(OcrTranslatorError::Provider(format!("Empty translation received{}", reason)));
    }

    Ok(trimmed.to_string())
}

#[async_trait]
impl TranslationService for GeminiTranslator {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn capabilities(&self, _config: &ProviderConfig) -> Capabilities {
        Capabilities {
            translate_text: true,
            translate_image: true,
        }
    }

    async fn complete(&self, prompt: &Prompt<'_>, config: &ProviderConfig) -> Result<String> {
        let request = self.build_request(prompt, config)?;
        debug!("Gemini request for model {}", model_id(&config.model));

        let response = self.transport.send(request).await?;
        check_status("Gemini", &response)?;

        let text = parse_response(&response.body)?;
        info!("Gemini returned {} chars", text.chars().count());
        Ok(text)
    }

    async fn verify_api_key(&self, config: &ProviderConfig) -> Result<()> {
        let url = format!("{}/v1beta/models", config.base_url);
        let request = HttpRequest::get(url, VERIFY_TIMEOUT.min(config.timeout))
            .header("x-goog-api-key", config.api_key.as_str());

        let response = self.transport.send(request).await?;
        check_status("Gemini", &response)?;
        info!("Gemini API key verified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureImage, tests::sample_png};
    use crate::config::Settings;
    use crate::http::{HttpResponse, MockHttpTransport};
    use crate::translate::TranslationRequest;

    fn config(model: &str) -> ProviderConfig {
        let mut settings = Settings::default();
        settings.gemini.api_key = "gm-test".to_string();
        settings.gemini.model = model.to_string();
        settings.provider_config(ProviderKind::Gemini).unwrap()
    }

    fn reply(status: u16, body: &str) -> HttpResponse {
        HttpResponse { status, body: body.to_string() }
    }

    #[tokio::test]
    async fn test_text_translation() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .withf(|req: &HttpRequest| {
                let body = req.body.as_ref().unwrap();
                req.url == "https://generativelanguage.googleapis.com/v1beta/models/gemini-flash-latest:generateContent"
                    && !req.url.contains("gm-test")
                    && req.header_value("x-goog-api-key") == Some("gm-test")
                    && body["contents"][0]["parts"][0]["text"] == "Bonjour"
                    && body["systemInstruction"]["parts"][0]["text"].as_str().unwrap().contains("Japanese")
            })
            .times(1)
            .returning(|_| {
                Ok(reply(
                    200,
                    r#"{"candidates":[{"content":{"parts":[{"text":"こんにちは"}],"role":"model"},"finishReason":"STOP"}]}"#,
                ))
            });

        let translator = GeminiTranslator::new(Arc::new(transport));
        let request = TranslationRequest::text("Bonjour", "ja");
        let result = translator.translate(&request, &config("models/gemini-flash-latest")).await.unwrap();
        assert_eq!(result.translated_text(), "こんにちは");
        assert_eq!(result.provider(), Some(ProviderKind::Gemini));
    }

    #[tokio::test]
    async fn test_combined_vision_with_original() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .withf(|req: &HttpRequest| {
                let part = &req.body.as_ref().unwrap()["contents"][0]["parts"][1];
                part["inline_data"]["mime_type"] == "image/png" && part["inline_data"]["data"].is_string()
            })
            .times(1)
            .returning(|_| {
                Ok(reply(
                    200,
                    r#"{"candidates":[{"content":{"parts":[{"text":"{\"original\":\"つづける\","},{"text":"\"translation\":\"Continue\"}"}]}}]}"#,
                ))
            });

        let translator = GeminiTranslator::new(Arc::new(transport));
        let image = CaptureImage::from_bytes(sample_png(16, 16)).unwrap();
        let request = TranslationRequest::image(image, "en", true);
        let result = translator.translate(&request, &config("gemini-flash-latest")).await.unwrap();
        assert_eq!(result.original_text(), "つづける");
        assert_eq!(result.translated_text(), "Continue");
        assert_eq!(result.source_language(), Some("ja"));
    }

    #[test]
    fn test_no_candidates_is_provider_error() {
        let err = parse_response(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap_err();
        assert!(matches!(err, OcrTranslatorError::Provider(_)));
        assert!(err.to_string().contains("SAFETY"));

        let err = parse_response(r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#).unwrap_err();
        assert!(matches!(err, OcrTranslatorError::Provider(_)));
    }

    #[tokio::test]
    async fn test_invalid_key_is_auth_error() {
        let mut transport = MockHttpTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Ok(reply(
                400,
                r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#,
            ))
        });

        let translator = GeminiTranslator::new(Arc::new(transport));
        let err = translator.verify_api_key(&config("gemini-flash-latest")).await.unwrap_err();
        assert!(matches!(err, OcrTranslatorError::Auth(_)));
    }
}
