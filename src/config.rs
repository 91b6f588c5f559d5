use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{OcrTranslatorError, Result};

/// File name of the per-user settings document
pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub openai: OpenAiSettings,
    pub gemini: GeminiSettings,
    pub language: LanguageSettings,
    pub ocr: OcrSettings,
    pub translation: TranslationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Provider used for OCR and translation: openai or gemini
    pub selected_api: ProviderKind,
    /// API timeout in seconds
    pub timeout: u64,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Only sent to gpt-5 family models
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Only sent to gpt-5 family models
    pub verbosity: Option<Verbosity>,
    /// Only sent to gpt-5 family models
    pub max_output_tokens: Option<u32>,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageSettings {
    /// Translation target language code
    pub target_language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// OCR engine used by the two-step flow
    pub engine: OcrEngineKind,
    /// Path to the tesseract binary
    pub binary_path: String,
    /// Tesseract language packs, joined with '+' on the command line
    pub languages: Vec<String>,
    /// Tesseract page segmentation mode (6 = single uniform block of text)
    pub page_segmentation_mode: u8,
    /// Seconds a tesseract run may take before it is killed
    pub timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    pub mode: TranslationMode,
    /// Ask the vision model to return the recognized source text as well
    pub include_original_text: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Gemini,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranslationMode {
    /// CombinedVision: one multimodal call recognizes and translates the image
    CombinedVision,
    /// TwoStep: run OCR first, then translate the extracted text
    TwoStep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineKind {
    Tesseract,
    Vision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Low,
    Medium,
    High,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            selected_api: ProviderKind::OpenAI,
            timeout: 60,
        }
    }
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-5-mini".to_string(),
            base_url: "https://api.openai.com".to_string(),
            reasoning_effort: None,
            verbosity: None,
            max_output_tokens: None,
        }
    }
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-flash-latest".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

impl Default for LanguageSettings {
    fn default() -> Self {
        Self {
            target_language: "ja".to_string(),
        }
    }
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            engine: OcrEngineKind::Tesseract,
            binary_path: "tesseract".to_string(),
            languages: vec!["jpn".to_string(), "eng".to_string()],
            page_segmentation_mode: 6,
            timeout: 30,
        }
    }
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            mode: TranslationMode::CombinedVision,
            include_original_text: false,
        }
    }
}

// API keys stay out of Debug output so they never reach the logs
impl fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("reasoning_effort", &self.reasoning_effort)
            .field("verbosity", &self.verbosity)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

impl fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn redact(key: &str) -> &'static str {
    if key.is_empty() { "<unset>" } else { "<redacted>" }
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = OcrTranslatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" => Ok(Self::Gemini),
            _ => Err(OcrTranslatorError::Config(format!(
                "Invalid provider '{}'. Valid providers: openai, gemini",
                s
            ))),
        }
    }
}

impl FromStr for TranslationMode {
    type Err = OcrTranslatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "combined" | "combined-vision" | "vision" => Ok(Self::CombinedVision),
            "two-step" | "twostep" | "ocr" => Ok(Self::TwoStep),
            _ => Err(OcrTranslatorError::Config(format!(
                "Invalid translation mode '{}'. Valid modes: combined, two-step",
                s
            ))),
        }
    }
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl Verbosity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Credentials and parameters for one provider, resolved from `Settings`
/// right before a request and never mutated while it runs.
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub verbosity: Option<Verbosity>,
    pub max_output_tokens: Option<u32>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("reasoning_effort", &self.reasoning_effort)
            .field("verbosity", &self.verbosity)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| OcrTranslatorError::Config(format!("Failed to read settings file: {}", e)))?;

        if is_toml(path) {
            toml::from_str(&content)
                .map_err(|e| OcrTranslatorError::Config(format!("Failed to parse settings file: {}", e)))
        } else {
            serde_json::from_str(&content)
                .map_err(|e| OcrTranslatorError::Config(format!("Failed to parse settings file: {}", e)))
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string_pretty(self)
                .map_err(|e| OcrTranslatorError::Config(format!("Failed to serialize settings: {}", e)))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| OcrTranslatorError::Config(format!("Failed to serialize settings: {}", e)))?
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content)
            .map_err(|e| OcrTranslatorError::Config(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }

    /// Fill empty API keys from OPENAI_API_KEY / GEMINI_API_KEY
    pub fn apply_env_overrides(&mut self) {
        if self.openai.api_key.trim().is_empty() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                debug!("Using OpenAI API key from environment");
                self.openai.api_key = key;
            }
        }
        if self.gemini.api_key.trim().is_empty() {
            if let Ok(key) = std::env::var("GEMINI_API_KEY") {
                debug!("Using Gemini API key from environment");
                self.gemini.api_key = key;
            }
        }
    }

    /// Config of the provider selected by `api.selected_api`
    pub fn active_provider(&self) -> Result<ProviderConfig> {
        self.provider_config(self.api.selected_api)
    }

    pub fn provider_config(&self, provider: ProviderKind) -> Result<ProviderConfig> {
        if self.api.timeout == 0 {
            return Err(OcrTranslatorError::Config("api.timeout must be at least 1 second".to_string()));
        }

        let (api_key, model, base_url) = match provider {
            ProviderKind::OpenAI => (&self.openai.api_key, &self.openai.model, &self.openai.base_url),
            ProviderKind::Gemini => (&self.gemini.api_key, &self.gemini.model, &self.gemini.base_url),
        };

        if api_key.trim().is_empty() {
            return Err(OcrTranslatorError::Config(format!(
                "No API key configured for {}. Set {}.api_key in the settings",
                provider, provider
            )));
        }
        if model.trim().is_empty() {
            return Err(OcrTranslatorError::Config(format!("No model configured for {}", provider)));
        }

        let (reasoning_effort, verbosity, max_output_tokens) = match provider {
            ProviderKind::OpenAI => (
                self.openai.reasoning_effort,
                self.openai.verbosity,
                self.openai.max_output_tokens,
            ),
            ProviderKind::Gemini => (None, None, None),
        };

        Ok(ProviderConfig {
            provider,
            api_key: api_key.trim().to_string(),
            model: model.trim().to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(self.api.timeout),
            reasoning_effort,
            verbosity,
            max_output_tokens,
        })
    }

    /// Copy with API keys masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.openai.api_key = redact(&self.openai.api_key).to_string();
        copy.gemini.api_key = redact(&self.gemini.api_key).to_string();
        copy
    }

    /// Tesseract language argument, e.g. "jpn+eng"
    pub fn ocr_language(&self) -> String {
        self.ocr.languages.join("+")
    }

    /// Read a setting by dotted key, e.g. "api.selected_api"
    pub fn get_value(&self, key: &str) -> Result<String> {
        let root = serde_json::to_value(self)?;
        let value = lookup(&root, key)?;
        Ok(match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect::<Vec<_>>()
                .join("+"),
            other => other.to_string(),
        })
    }

    /// Update a setting by dotted key. The value is coerced to the type of the
    /// existing field and the whole document is re-validated.
    pub fn set_value(&mut self, key: &str, raw: &str) -> Result<()> {
        let mut root = serde_json::to_value(&*self)?;
        let (section, field) = key
            .split_once('.')
            .ok_or_else(|| OcrTranslatorError::Config(format!("Unknown setting '{}'", key)))?;

        let slot = root
            .get_mut(section)
            .and_then(|s| s.get_mut(field))
            .ok_or_else(|| OcrTranslatorError::Config(format!("Unknown setting '{}'", key)))?;

        *slot = coerce(slot, raw, key)?;

        *self = serde_json::from_value(root)
            .map_err(|e| OcrTranslatorError::Config(format!("Invalid value for {}: {}", key, e)))?;
        Ok(())
    }
}

fn lookup<'a>(root: &'a Value, key: &str) -> Result<&'a Value> {
    let (section, field) = key
        .split_once('.')
        .ok_or_else(|| OcrTranslatorError::Config(format!("Unknown setting '{}'", key)))?;
    root.get(section)
        .and_then(|s| s.get(field))
        .ok_or_else(|| OcrTranslatorError::Config(format!("Unknown setting '{}'", key)))
}

fn coerce(current: &Value, raw: &str, key: &str) -> Result<Value> {
    let raw = raw.trim();
    let invalid = || OcrTranslatorError::Config(format!("Invalid value '{}' for {}", raw, key));

    Ok(match current {
        Value::Bool(_) => Value::Bool(raw.parse().map_err(|_| invalid())?),
        Value::Number(_) => Value::Number(raw.parse::<u64>().map_err(|_| invalid())?.into()),
        Value::Array(_) => Value::Array(
            raw.split(['+', ','])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        ),
        // Unset optional fields: empty clears, numbers stay numbers
        Value::Null => {
            if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
                Value::Null
            } else if let Ok(n) = raw.parse::<u64>() {
                Value::Number(n.into())
            } else {
                Value::String(enum_case(raw, key))
            }
        }
        Value::String(_) if raw.is_empty() && is_optional_enum(key) => Value::Null,
        Value::String(_) => Value::String(enum_case(raw, key)),
        Value::Object(_) => return Err(invalid()),
    })
}

fn is_optional_enum(key: &str) -> bool {
    matches!(key, "openai.reasoning_effort" | "openai.verbosity")
}

/// Enum names are stored lowercase; free-form strings keep their case
fn enum_case(raw: &str, key: &str) -> String {
    let is_enum = is_optional_enum(key) || matches!(key, "api.selected_api" | "translation.mode" | "ocr.engine");
    if is_enum {
        raw.to_lowercase()
    } else {
        raw.to_string()
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().map(|ext| ext == "toml").unwrap_or(false)
}

/// Location of the per-user settings document
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/ocr_translator/settings.json`
    pub fn default_location() -> Result<Self> {
        let dirs = project_dirs()?;
        Ok(Self::new(dirs.config_dir().join(SETTINGS_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, falling back to defaults when the file does not exist yet
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            debug!("Settings file {} not found, using defaults", self.path.display());
            return Ok(Settings::default());
        }
        Settings::from_file(&self.path)
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        settings.save_to_file(&self.path)?;
        info!("Settings saved to {}", self.path.display());
        Ok(())
    }
}

/// Per-user data directory, used for logs
pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "ocr_translator")
        .ok_or_else(|| OcrTranslatorError::Config("Cannot determine the user home directory".to_string()))
}
