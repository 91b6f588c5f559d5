use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

use crate::error::{OcrTranslatorError, Result};

/// A captured screen region: encoded image bytes plus pixel dimensions.
///
/// Bytes are always PNG or JPEG, the formats every consumer (tesseract, the
/// OpenAI and Gemini vision inputs) accepts. BMP input is re-encoded as PNG.
#[derive(Clone, PartialEq, Eq)]
pub struct CaptureImage {
    bytes: Vec<u8>,
    format: ImageFormat,
    width: u32,
    height: u32,
}

impl CaptureImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(OcrTranslatorError::Capture("Captured image is empty".to_string()));
        }

        let format = image::guess_format(&bytes)
            .map_err(|e| OcrTranslatorError::Capture(format!("Unrecognized image format: {}", e)))?;
        if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Bmp) {
            return Err(OcrTranslatorError::Capture(format!(
                "Unsupported image format: {:?}",
                format
            )));
        }

        // Full decode so truncated or corrupt data is rejected here
        let decoded = image::load_from_memory_with_format(&bytes, format)
            .map_err(|e| OcrTranslatorError::Capture(format!("Failed to decode image: {}", e)))?;
        let (width, height) = (decoded.width(), decoded.height());

        if width == 0 || height == 0 {
            return Err(OcrTranslatorError::Capture("Captured region has no pixels".to_string()));
        }

        let (bytes, format) = match format {
            ImageFormat::Png | ImageFormat::Jpeg => (bytes, format),
            _ => {
                let mut out = Cursor::new(Vec::new());
                decoded
                    .write_to(&mut out, ImageFormat::Png)
                    .map_err(|e| OcrTranslatorError::Capture(format!("Failed to encode PNG: {}", e)))?;
                debug!("Re-encoded {:?} capture as PNG", format);
                (out.into_inner(), ImageFormat::Png)
            }
        };

        debug!("Loaded {:?} capture {}x{} ({} bytes)", format, width, height, bytes.len());
        Ok(Self { bytes, format, width, height })
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            OcrTranslatorError::Capture(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_bytes(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// File extension matching the encoded format
    pub fn extension(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "jpg",
            _ => "png",
        }
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:<mime>;base64,<payload>` form used by OpenAI image inputs
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.to_base64())
    }
}

impl std::fmt::Debug for CaptureImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureImage")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}
