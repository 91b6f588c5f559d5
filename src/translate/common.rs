use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capture::CaptureImage;
use crate::config::ProviderKind;
use crate::error::{ErrorKind, OcrTranslatorError};
use crate::language::language_code_to_name;

/// Output budget for plain text translation
pub const TEXT_MAX_TOKENS: u32 = 1024;
/// Output budget when an image is attached
pub const IMAGE_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, PartialEq)]
pub enum TranslationInput {
    Text(String),
    Image {
        image: CaptureImage,
        /// Ask the provider to also return the recognized source text
        include_original: bool,
    },
}

/// A single translation request. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRequest {
    id: Uuid,
    input: TranslationInput,
    target_language: String,
}

impl TranslationRequest {
    pub fn text(text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            input: TranslationInput::Text(text.into()),
            target_language: target_language.into(),
        }
    }

    pub fn image(image: CaptureImage, target_language: impl Into<String>, include_original: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            input: TranslationInput::Image { image, include_original },
            target_language: target_language.into(),
        }
    }

    /// Reuse an id assigned earlier, e.g. by a session before OCR ran
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn input(&self) -> &TranslationInput {
        &self.input
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    pub fn is_image(&self) -> bool {
        matches!(self.input, TranslationInput::Image { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TranslationStatus {
    Success,
    Failure { kind: ErrorKind, message: String },
}

/// Outcome of one request, handed to the UI. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationResult {
    request_id: Uuid,
    provider: Option<ProviderKind>,
    original_text: String,
    translated_text: String,
    source_language: Option<String>,
    #[serde(flatten)]
    status: TranslationStatus,
}

impl TranslationResult {
    pub fn success(
        request_id: Uuid,
        provider: ProviderKind,
        original_text: impl Into<String>,
        translated_text: impl Into<String>,
        source_language: Option<String>,
    ) -> Self {
        Self {
            request_id,
            provider: Some(provider),
            original_text: original_text.into(),
            translated_text: translated_text.into(),
            source_language,
            status: TranslationStatus::Success,
        }
    }

    /// `provider` is None when the failure happened before one was selected
    pub fn failure(
        request_id: Uuid,
        provider: Option<ProviderKind>,
        original_text: impl Into<String>,
        error: &OcrTranslatorError,
    ) -> Self {
        Self {
            request_id,
            provider,
            original_text: original_text.into(),
            translated_text: String::new(),
            source_language: None,
            status: TranslationStatus::Failure {
                kind: error.kind(),
                message: error.to_string(),
            },
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn provider(&self) -> Option<ProviderKind> {
        self.provider
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn translated_text(&self) -> &str {
        &self.translated_text
    }

    pub fn source_language(&self) -> Option<&str> {
        self.source_language.as_deref()
    }

    pub fn status(&self) -> &TranslationStatus {
        &self.status
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, TranslationStatus::Success)
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.status {
            TranslationStatus::Success => None,
            TranslationStatus::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            TranslationStatus::Success => None,
            TranslationStatus::Failure { message, .. } => Some(message),
        }
    }
}

/// Provider-neutral prompt; each backend maps it to its own payload shape
#[derive(Debug, Clone)]
pub struct Prompt<'a> {
    pub system: String,
    pub user: String,
    pub image: Option<&'a CaptureImage>,
    pub max_tokens: u32,
}

pub fn text_translation_prompt<'a>(text: &str, target_language: &str) -> Prompt<'a> {
    let language_name = language_code_to_name(target_language);
    Prompt {
        system: format!(
            "You are a translation assistant. Translate the text given by the user into {} \
             (language code: {}). Output only the translation, without explanations, notes \
             or alternatives. Keep the original line breaks.",
            language_name, target_language
        ),
        user: text.to_string(),
        image: None,
        max_tokens: TEXT_MAX_TOKENS,
    }
}

pub fn image_translation_prompt<'a>(
    image: &'a CaptureImage,
    target_language: &str,
    include_original: bool,
) -> Prompt<'a> {
    let language_name = language_code_to_name(target_language);
    let user = if include_original {
        format!(
            "Extract the text shown in this image and translate it into {}.\n\
             Return ONLY a JSON object of the form \
             {{\"original\":\"text exactly as it appears in the image\",\"translation\":\"your {} translation\"}}.\n\
             Keep line breaks inside both values.",
            language_name, language_name
        )
    } else {
        format!(
            "Extract the text shown in this image and translate it into {}.\n\
             Output only the translated text, keeping the line breaks. No explanations.",
            language_name
        )
    };

    Prompt {
        system: format!(
            "You are a translation assistant that reads text from images and translates it into {} \
             (language code: {}).",
            language_name, target_language
        ),
        user,
        image: Some(image),
        max_tokens: IMAGE_MAX_TOKENS,
    }
}

pub fn ocr_prompt<'a>(image: &'a CaptureImage, language_hint: Option<&str>) -> Prompt<'a> {
    let mut user = "Extract the text in this image, keeping the line breaks. \
                    Perform OCR only: do not translate, summarize or explain."
        .to_string();
    if let Some(hint) = language_hint.filter(|h| !h.trim().is_empty()) {
        user.push_str(&format!(" The text is in {}.", hint));
    }

    Prompt {
        system: "You are an OCR engine. Reply with the recognized text only.".to_string(),
        user,
        image: Some(image),
        max_tokens: IMAGE_MAX_TOKENS,
    }
}

#[derive(Debug, Deserialize)]
struct VisionReply {
    #[serde(default)]
    original: String,
    translation: String,
}

/// Split a combined-vision reply into (original, translation).
///
/// Falls back to treating the whole reply as the translation when the model
/// ignored the JSON instruction.
pub fn parse_vision_reply(reply: &str, include_original: bool) -> (String, String) {
    let trimmed = reply.trim();
    if include_original {
        let unfenced = strip_code_fence(trimmed);
        if let Ok(parsed) = serde_json::from_str::<VisionReply>(unfenced) {
            if !parsed.translation.trim().is_empty() {
                return (parsed.original.trim().to_string(), parsed.translation.trim().to_string());
            }
        }
    }
    (String::new(), trimmed.to_string())
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_prompt_names_language() {
        let prompt = text_translation_prompt("こんにちは", "en");
        assert!(prompt.system.contains("English"));
        assert_eq!(prompt.user, "こんにちは");
        assert!(prompt.image.is_none());
        assert_eq!(prompt.max_tokens, TEXT_MAX_TOKENS);
    }

    #[test]
    fn test_parse_vision_reply_json() {
        let reply = "```json\n{\"original\":\"はい\",\"translation\":\"Yes\"}\n```";
        assert_eq!(parse_vision_reply(reply, true), ("はい".to_string(), "Yes".to_string()));
    }

    #[test]
    fn test_parse_vision_reply_plain_fallback() {
        assert_eq!(parse_vision_reply("  Yes\nNo  ", true), (String::new(), "Yes\nNo".to_string()));
        // JSON is not interpreted unless it was asked for
        let reply = "{\"original\":\"a\",\"translation\":\"b\"}";
        assert_eq!(parse_vision_reply(reply, false), (String::new(), reply.to_string()));
    }

    #[test]
    fn test_failure_result_carries_kind() {
        let err = OcrTranslatorError::Auth("invalid key".into());
        let result = TranslationResult::failure(Uuid::new_v4(), Some(ProviderKind::OpenAI), "", &err);
        assert!(!result.is_success());
        assert_eq!(result.error_kind(), Some(ErrorKind::Auth));
        assert!(result.translated_text().is_empty());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["kind"], "Auth");
    }
}
