// OpenAI backend
//
// gpt-5 family models go through the Responses API (/v1/responses) with
// reasoning, verbosity and max_output_tokens from the settings. Every other
// model goes through chat completions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{OcrTranslatorError, Result};
use crate::http::{check_status, HttpRequest, HttpTransport};
use super::{Capabilities, Prompt, TranslationService};

const RESPONSES_MODEL_PREFIX: &str = "gpt-5";
const VISION_MODEL_PREFIXES: &[&str] = &["gpt-5", "gpt-4o", "gpt-4.1", "gpt-4-turbo", "chatgpt-4o", "o3", "o4"];
const CHAT_TEMPERATURE: f32 = 0.3;
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether a model must use the Responses endpoint
pub fn uses_responses_api(model: &str) -> bool {
    model.trim().to_lowercase().starts_with(RESPONSES_MODEL_PREFIX)
}

pub fn supports_image_input(model: &str) -> bool {
    let lowered = model.trim().to_lowercase();
    VISION_MODEL_PREFIXES.iter().any(|prefix| lowered.starts_with(prefix))
}

// Chat completions payload

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: ChatContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent<'a> {
    Text(&'a str),
    Parts(Vec<ChatPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

// Responses API payload

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: Vec<ResponsesTurn<'a>>,
    text: TextConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<ReasoningConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ResponsesTurn<'a> {
    role: &'a str,
    content: Vec<InputPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputPart<'a> {
    InputText { text: &'a str },
    InputImage { image_url: String, detail: &'static str },
}

#[derive(Debug, Serialize)]
struct TextConfig {
    format: TextFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    verbosity: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct TextFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ReasoningConfig {
    effort: &'static str,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
    incomplete_details: Option<IncompleteDetails>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IncompleteDetails {
    reason: Option<String>,
}

/// OpenAI implementation
pub struct OpenAiTranslator {
    transport: Arc<dyn HttpTransport>,
}

impl OpenAiTranslator {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn chat_request(&self, prompt: &Prompt<'_>, config: &ProviderConfig) -> Result<HttpRequest> {
        let user_content = match prompt.image {
            None => ChatContent::Text(&prompt.user),
            Some(image) => ChatContent::Parts(vec![
                ChatPart::Text { text: &prompt.user },
                ChatPart::ImageUrl {
                    image_url: ImageUrl { url: image.to_data_url(), detail: "high" },
                },
            ]),
        };

        let body = ChatRequest {
            model: &config.model,
            messages: vec![
                ChatMessage { role: "system", content: ChatContent::Text(&prompt.system) },
                ChatMessage { role: "user", content: user_content },
            ],
            temperature: CHAT_TEMPERATURE,
            max_tokens: prompt.max_tokens,
        };

        let url = format!("{}/v1/chat/completions", config.base_url);
        Ok(HttpRequest::post(url, serde_json::to_value(&body)?, config.timeout)
            .header("Authorization", format!("Bearer {}", config.api_key)))
    }

    fn responses_request(&self, prompt: &Prompt<'_>, config: &ProviderConfig) -> Result<HttpRequest> {
        let mut content = vec![InputPart::InputText { text: &prompt.user }];
        if let Some(image) = prompt.image {
            content.push(InputPart::InputImage { image_url: image.to_data_url(), detail: "high" });
        }

        let body = ResponsesRequest {
            model: &config.model,
            instructions: &prompt.system,
            input: vec![ResponsesTurn { role: "user", content }],
            text: TextConfig {
                format: TextFormat { kind: "text" },
                verbosity: config.verbosity.map(|v| v.as_str()),
            },
            reasoning: config.reasoning_effort.map(|e| ReasoningConfig { effort: e.as_str() }),
            max_output_tokens: config.max_output_tokens,
        };

        let url = format!("{}/v1/responses", config.base_url);
        Ok(HttpRequest::post(url, serde_json::to_value(&body)?, config.timeout)
            .header("Authorization", format!("Bearer {}", config.api_key)))
    }
}

/// First choice's message content
fn parse_chat_response(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| OcrTranslatorError::Provider(format!("Failed to parse OpenAI response: {}", e)))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| OcrTranslatorError::Provider("OpenAI returned no choices".to_string()))?;

    non_empty(choice.message.content.unwrap_or_default())
}

/// `output_text` when present, otherwise the first output_text part of the
/// first message item (reasoning items come before it)
fn parse_responses_response(body: &str) -> Result<String> {
    let response: ResponsesResponse = serde_json::from_str(body)
        .map_err(|e| OcrTranslatorError::Provider(format!("Failed to parse OpenAI response: {}", e)))?;

    if let Some(text) = response.output_text.filter(|t| !t.trim().is_empty()) {
        return Ok(text.trim().to_string());
    }

    let text = response
        .output
        .iter()
        .filter(|item| item.kind == "message")
        .flat_map(|item| item.content.iter())
        .find(|part| part.kind == "output_text" || part.kind == "text")
        .and_then(|part| part.text.clone());

    match text {
        Some(text) => non_empty(text),
        None => {
            let reason = response
                .incomplete_details
                .and_then(|d| d.reason)
                .map(|r| format!(" (incomplete: {})", r))
                .unwrap_or_default();
            Err(OcrTranslatorError::Provider(format!("OpenAI returned no output text{}", reason)))
        }
    }
}

fn non_empty(text: String) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(OcrTranslatorError::Provider("Empty translation received".to_string()))
    } else {
        Ok(trimmed.to_string())
    }
}

#[async_trait]
impl TranslationService for OpenAiTranslator {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }

    fn capabilities(&self, config: &ProviderConfig) -> Capabilities {
        Capabilities {
            translate_text: true,
            translate_image: supports_image_input(&config.model),
        }
    }

    async fn complete(&self, prompt: &Prompt<'_>, config: &ProviderConfig) -> Result<String> {
        let responses = uses_responses_api(&config.model);
        let request = if responses {
            self.responses_request(prompt, config)?
        } else {
            self.chat_request(prompt, config)?
        };

        debug!("OpenAI request via {} endpoint", if responses { "responses" } else { "chat" });
        let response = self.transport.send(request).await?;
        check_status("OpenAI", &response)?;

        let text = if responses {
            parse_responses_response(&response.body)?
        } else {
            parse_chat_response(&response.body)?
        };

        info!("OpenAI returned {} chars", text.chars().count());
        Ok(text)
    }

    async fn verify_api_key(&self, config: &ProviderConfig) -> Result<()> {
        let url = format!("{}/v1/models", config.base_url);
        let request = HttpRequest::get(url, VERIFY_TIMEOUT.min(config.timeout))
            .header("Authorization", format!("Bearer {}", config.api_key));

        let response = self.transport.send(request).await?;
        check_status("OpenAI", &response)?;
        info!("OpenAI API key verified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureImage, tests::sample_png};
    use crate::config::{ReasoningEffort, Settings, Verbosity};
    use crate::http::{HttpMethod, HttpResponse, MockHttpTransport};
    use crate::translate::{TranslationRequest, text_translation_prompt};
    use mockall::predicate::always;

    fn config(model: &str) -> ProviderConfig {
        let mut settings = Settings::default();
        settings.openai.api_key = "sk-test".to_string();
        settings.openai.model = model.to_string();
        settings.openai.reasoning_effort = Some(ReasoningEffort::Minimal);
        settings.openai.verbosity = Some(Verbosity::Low);
        settings.openai.max_output_tokens = Some(800);
        settings.active_provider().unwrap()
    }

    fn reply(status: u16, body: &str) -> HttpResponse {
        HttpResponse { status, body: body.to_string() }
    }

    #[test]
    fn test_model_routing() {
        assert!(uses_responses_api("gpt-5"));
        assert!(uses_responses_api("GPT-5-mini"));
        assert!(!uses_responses_api("gpt-4o-mini"));
        assert!(supports_image_input("gpt-4o-mini"));
        assert!(!supports_image_input("gpt-3.5-turbo"));
    }

    #[tokio::test]
    async fn test_chat_translation_scenario() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .withf(|req: &HttpRequest| {
                let body = req.body.as_ref().unwrap();
                req.method == HttpMethod::Post
                    && req.url == "https://api.openai.com/v1/chat/completions"
                    && req.header_value("Authorization") == Some("Bearer sk-test")
                    && body["model"] == "gpt-4o-mini"
                    && body["messages"][1]["content"] == "こんにちは"
                    && body["max_tokens"] == 1024
                    && body.get("reasoning").is_none()
            })
            .times(1)
            .returning(|_| Ok(reply(200, r#"{"choices":[{"message":{"content":"Hello"}}]}"#)));

        let translator = OpenAiTranslator::new(Arc::new(transport));
        let request = TranslationRequest::text("こんにちは", "en");
        let result = translator.translate(&request, &config("gpt-4o-mini")).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.translated_text(), "Hello");
        assert_eq!(result.original_text(), "こんにちは");
        assert_eq!(result.source_language(), Some("ja"));
    }

    #[tokio::test]
    async fn test_gpt5_uses_responses_endpoint_with_parameters() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .withf(|req: &HttpRequest| {
                let body = req.body.as_ref().unwrap();
                req.url == "https://api.openai.com/v1/responses"
                    && body["reasoning"]["effort"] == "minimal"
                    && body["text"]["verbosity"] == "low"
                    && body["text"]["format"]["type"] == "text"
                    && body["max_output_tokens"] == 800
                    && body.get("temperature").is_none()
                    && body["input"][0]["content"][0]["type"] == "input_text"
            })
            .times(1)
            .returning(|_| {
                Ok(reply(
                    200,
                    r#"{"output":[
                        {"type":"reasoning","summary":[]},
                        {"type":"message","role":"assistant","content":[{"type":"output_text","text":" Hello "}]}
                    ]}"#,
                ))
            });

        let translator = OpenAiTranslator::new(Arc::new(transport));
        let prompt = text_translation_prompt("こんにちは", "en");
        let text = translator.complete(&prompt, &config("gpt-5-mini")).await.unwrap();
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn test_image_payloads() {
        let image = CaptureImage::from_bytes(sample_png(8, 8)).unwrap();

        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .withf(|req: &HttpRequest| {
                let part = &req.body.as_ref().unwrap()["input"][0]["content"][1];
                part["type"] == "input_image"
                    && part["detail"] == "high"
                    && part["image_url"].as_str().unwrap().starts_with("data:image/png;base64,")
            })
            .times(1)
            .returning(|_| Ok(reply(200, r#"{"output_text":"Start"}"#)));
        transport
            .expect_send()
            .withf(|req: &HttpRequest| {
                let body = req.body.as_ref().unwrap();
                body["messages"][1]["content"][1]["type"] == "image_url" && body["max_tokens"] == 4096
            })
            .times(1)
            .returning(|_| Ok(reply(200, r#"{"choices":[{"message":{"content":"Start"}}]}"#)));

        let translator = OpenAiTranslator::new(Arc::new(transport));
        for model in ["gpt-5", "gpt-4o"] {
            let request = TranslationRequest::image(image.clone(), "en", false);
            let result = translator.translate(&request, &config(model)).await.unwrap();
            assert_eq!(result.translated_text(), "Start");
            assert_eq!(result.original_text(), "");
        }
    }

    #[tokio::test]
    async fn test_image_rejected_for_text_only_model() {
        let mut transport = MockHttpTransport::new();
        transport.expect_send().never();

        let translator = OpenAiTranslator::new(Arc::new(transport));
        let image = CaptureImage::from_bytes(sample_png(4, 4)).unwrap();
        let request = TranslationRequest::image(image, "en", false);
        let err = translator.translate(&request, &config("gpt-3.5-turbo")).await.unwrap_err();
        assert!(matches!(err, OcrTranslatorError::Config(_)));
    }

    #[tokio::test]
    async fn test_error_classification() {
        let cases = [
            (401, OcrTranslatorError::Auth(String::new())),
            (429, OcrTranslatorError::RateLimit(String::new())),
            (500, OcrTranslatorError::Provider(String::new())),
        ];

        for (status, expected) in cases {
            let mut transport = MockHttpTransport::new();
            transport
                .expect_send()
                .with(always())
                .returning(move |_| Ok(reply(status, r#"{"error":{"message":"nope"}}"#)));

            let translator = OpenAiTranslator::new(Arc::new(transport));
            let request = TranslationRequest::text("hi", "ja");
            let err = translator.translate(&request, &config("gpt-4o-mini")).await.unwrap_err();
            assert_eq!(err.kind(), expected.kind(), "status {}", status);
        }
    }

    #[tokio::test]
    async fn test_network_error_passes_through() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .returning(|_| Err(OcrTranslatorError::Network("Request timed out".to_string())));

        let translator = OpenAiTranslator::new(Arc::new(transport));
        let err = translator
            .complete(&text_translation_prompt("hi", "ja"), &config("gpt-4o-mini"))
            .await
            .unwrap_err();
        assert!(matches!(err, OcrTranslatorError::Network(_)));
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(parse_chat_response(r#"{"choices":[]}"#), Err(OcrTranslatorError::Provider(_))));
        assert!(matches!(
            parse_chat_response(r#"{"choices":[{"message":{"content":"   "}}]}"#),
            Err(OcrTranslatorError::Provider(_))
        ));
        assert!(matches!(parse_chat_response("not json"), Err(OcrTranslatorError::Provider(_))));

        let err = parse_responses_response(
            r#"{"output":[{"type":"reasoning"}],"incomplete_details":{"reason":"max_output_tokens"}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_output_tokens"));
    }

    #[tokio::test]
    async fn test_rejects_foreign_credentials() {
        let mut transport = MockHttpTransport::new();
        transport.expect_send().never();

        let mut settings = Settings::default();
        settings.gemini.api_key = "gm-key".to_string();
        let gemini_config = settings.provider_config(ProviderKind::Gemini).unwrap();

        let translator = OpenAiTranslator::new(Arc::new(transport));
        let err = translator
            .translate(&TranslationRequest::text("hi", "ja"), &gemini_config)
            .await
            .unwrap_err();
        assert!(matches!(err, OcrTranslatorError::Config(_)));
    }
}
