//! Screenshot capture for the model's visual context.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat, RgbImage};

use super::device::AdbDevice;

const PNG_MAGIC: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

const FALLBACK_WIDTH: u32 = 1080;
const FALLBACK_HEIGHT: u32 = 2400;

/// A captured screenshot, base64 encoded for the model request.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub base64_data: String,
    pub width: u32,
    pub height: u32,
    /// Set when the device refused the capture (payment pages and similar).
    pub is_sensitive: bool,
}

impl Screenshot {
    /// Decode raw `screencap -p` output.
    pub fn from_png(png_data: &[u8]) -> Option<Self> {
        if png_data.len() < PNG_MAGIC.len() || &png_data[..PNG_MAGIC.len()] != PNG_MAGIC {
            tracing::error!("Invalid PNG header in screenshot ({} bytes)", png_data.len());
            return None;
        }

        match image::load_from_memory_with_format(png_data, ImageFormat::Png) {
            Ok(img) => Some(Self {
                base64_data: STANDARD.encode(png_data),
                width: img.width(),
                height: img.height(),
                is_sensitive: false,
            }),
            Err(e) => {
                tracing::error!("Failed to parse screenshot image: {}", e);
                None
            }
        }
    }

    /// A black frame used whenever a real capture is unavailable.
    pub fn fallback(is_sensitive: bool) -> Self {
        let black = DynamicImage::ImageRgb8(RgbImage::new(FALLBACK_WIDTH, FALLBACK_HEIGHT));
        let mut buffer = Cursor::new(Vec::new());
        if let Err(e) = black.write_to(&mut buffer, ImageFormat::Png) {
            tracing::error!("Failed to encode fallback screenshot: {}", e);
        }

        Self {
            base64_data: STANDARD.encode(buffer.into_inner()),
            width: FALLBACK_WIDTH,
            height: FALLBACK_HEIGHT,
            is_sensitive,
        }
    }
}

impl AdbDevice {
    /// Capture the screen with `adb exec-out screencap -p`.
    ///
    /// Never fails: sensitive screens and capture errors produce a black
    /// fallback frame so the agent can still ask the model what to do.
    pub async fn screenshot(&self) -> Screenshot {
        let output = match self
            .command()
            .args(["exec-out", "screencap", "-p"])
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                tracing::error!("Screenshot command failed: {}", e);
                return Screenshot::fallback(false);
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("Status: -1") || stderr.contains("Failed") {
            tracing::warn!("Screenshot refused (sensitive screen): {}", stderr.trim());
            return Screenshot::fallback(true);
        }

        Screenshot::from_png(&output.stdout).unwrap_or_else(|| Screenshot::fallback(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_screenshot() {
        let screenshot = Screenshot::fallback(true);
        assert_eq!(screenshot.width, 1080);
        assert_eq!(screenshot.height, 2400);
        assert!(screenshot.is_sensitive);
        assert!(!screenshot.base64_data.is_empty());
    }

    #[test]
    fn test_from_png_reads_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 7));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();

        let screenshot = Screenshot::from_png(&buffer.into_inner()).unwrap();
        assert_eq!((screenshot.width, screenshot.height), (4, 7));
        assert!(!screenshot.is_sensitive);
    }

    #[test]
    fn test_from_png_rejects_garbage() {
        assert!(Screenshot::from_png(b"error: no devices").is_none());
        assert!(Screenshot::from_png(b"").is_none());
    }
}
