#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use ocr_translator::capture::CaptureImage;
use ocr_translator::config::Settings;
use ocr_translator::error::Result;
use ocr_translator::http::{HttpRequest, HttpResponse, HttpTransport};
use ocr_translator::ocr::OcrEngine;

/// Shared call log so tests can check ordering across fakes
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Replays canned responses in order and records every request
pub struct RecordingTransport {
    requests: Mutex<Vec<HttpRequest>>,
    replies: Mutex<VecDeque<Result<HttpResponse>>>,
    log: CallLog,
}

impl RecordingTransport {
    pub fn new(log: CallLog) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::new()),
            log,
        }
    }

    pub fn reply(self, status: u16, body: impl Into<String>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(HttpResponse { status, body: body.into() }));
        self
    }

    pub fn fail(self, error: ocr_translator::error::OcrTranslatorError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.log.lock().unwrap().push(format!("http {}", request.url));
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected HTTP request")
    }
}

/// OCR stand-in returning fixed text
pub struct FakeOcr {
    text: String,
    log: CallLog,
}

impl FakeOcr {
    pub fn new(text: &str, log: CallLog) -> Self {
        Self { text: text.to_string(), log }
    }
}

#[async_trait]
impl OcrEngine for FakeOcr {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn extract_text(&self, _image: &CaptureImage, language: &str, _settings: &Settings) -> Result<String> {
        self.log.lock().unwrap().push(format!("ocr {}", language));
        Ok(self.text.clone())
    }

    async fn check_availability(&self, _settings: &Settings) -> Result<()> {
        Ok(())
    }
}

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn capture(width: u32, height: u32) -> CaptureImage {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    CaptureImage::from_bytes(bytes).unwrap()
}

pub fn capture_bmp(width: u32, height: u32) -> CaptureImage {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([0, 0, 0]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Bmp)
        .unwrap();
    CaptureImage::from_bytes(bytes).unwrap()
}

pub fn chat_reply(content: &str) -> String {
    serde_json::json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string()
}

pub fn gemini_reply(text: &str) -> String {
    serde_json::json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}, "finishReason": "STOP"}]})
        .to_string()
}

/// Both providers configured, OpenAI selected with a chat-completions model
pub fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.openai.api_key = "sk-openai-test".to_string();
    settings.openai.model = "gpt-4o-mini".to_string();
    settings.gemini.api_key = "gm-gemini-test".to_string();
    settings.language.target_language = "en".to_string();
    settings
}
