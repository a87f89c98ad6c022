//! Frame acquisition
//!
//! A captured camera frame as raw RGBA pixels. For a CLI process the
//! "camera" is an image file on disk; the in-memory representation is the
//! same either way.

use anyhow::{Context, Result};
use image::DynamicImage;
use std::path::Path;
use std::time::Instant;

/// A captured frame ready for recognition
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Timestamp when the frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a frame from raw RGBA data
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// Load a frame from an image file
    pub fn from_path(path: &Path) -> Result<Self> {
        let img = image::open(path)
            .with_context(|| format!("failed to load image: {}", path.display()))?;
        Ok(Self::from_image(&img))
    }

    /// Convert a decoded image into a frame
    pub fn from_image(img: &DynamicImage) -> Self {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(rgba.into_raw(), width, height)
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_frame_from_image() {
        let mut img = RgbaImage::new(4, 2);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));

        let frame = CapturedFrame::from_image(&DynamicImage::ImageRgba8(img));

        assert_eq!(frame.dimensions(), (4, 2));
        assert_eq!(frame.data.len(), 4 * 2 * 4);
        assert_eq!(&frame.data[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_frame_from_missing_path_fails() {
        let result = CapturedFrame::from_path(Path::new("/nonexistent/frame.png"));
        assert!(result.is_err());
    }
}
