//! ocr-translator - screen-region OCR and translation
//!
//! A captured image is either sent to a vision-capable model that reads and
//! translates it in one call, or run through OCR first (tesseract or a vision
//! model) with the recognized text translated by OpenAI or Gemini.

pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod language;
pub mod manager;
pub mod ocr;
pub mod session;
pub mod translate;
pub mod workflow;
