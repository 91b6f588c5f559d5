use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::capture::CaptureImage;
use crate::config::Settings;
use crate::error::{OcrTranslatorError, Result};
use super::OcrEngine;

/// Tesseract command-line implementation
pub struct TesseractOcr;

impl TesseractOcr {
    pub fn new() -> Self {
        Self
    }

    fn build_command(binary: &str, image_path: &Path, language: &str, psm: u8) -> Command {
        let mut cmd = Command::new(binary);
        cmd.arg(image_path)
            .arg("stdout")
            .arg("-l").arg(language)
            .arg("--psm").arg(psm.to_string())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, mut cmd: Command, binary: &str, timeout: Duration) -> Result<std::process::Output> {
        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| OcrTranslatorError::Ocr(format!("tesseract did not finish within {:?}", timeout)))?;

        output.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OcrTranslatorError::Ocr(format!(
                    "tesseract not found at '{}'. Install tesseract or set ocr.binary_path",
                    binary
                ))
            } else {
                OcrTranslatorError::Ocr(format!("Failed to execute tesseract: {}", e))
            }
        })
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn extract_text(&self, image: &CaptureImage, language: &str, settings: &Settings) -> Result<String> {
        let binary = settings.ocr.binary_path.as_str();
        info!("Running tesseract OCR ({}) on {}x{} image", language, image.width(), image.height());

        // tesseract reads from a file; the temp dir is removed on drop
        let temp_dir = tempfile::tempdir()
            .map_err(|e| OcrTranslatorError::Ocr(format!("Failed to create temp directory: {}", e)))?;
        let image_path = temp_dir.path().join(format!("capture.{}", image.extension()));
        tokio::fs::write(&image_path, image.bytes()).await?;

        let cmd = Self::build_command(binary, &image_path, language, settings.ocr.page_segmentation_mode);
        let output = self.run(cmd, binary, Duration::from_secs(settings.ocr.timeout.max(1))).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrTranslatorError::Ocr(format!("tesseract failed: {}", stderr.trim())));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("tesseract output: {:?}", text);
        info!("Tesseract OCR completed ({} chars)", text.chars().count());
        Ok(text)
    }

    async fn check_availability(&self, settings: &Settings) -> Result<()> {
        let binary = settings.ocr.binary_path.as_str();
        let mut cmd = Command::new(binary);
        cmd.arg("--version");

        let output = self.run(cmd, binary, Duration::from_secs(10)).await?;
        if output.status.success() {
            let version = String::from_utf8_lossy(&output.stdout);
            info!("Tesseract is available: {}", version.lines().next().unwrap_or("unknown version"));
            Ok(())
        } else {
            Err(OcrTranslatorError::Ocr("tesseract version check failed".to_string()))
        }
    }
}
