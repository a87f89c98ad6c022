//! OCR engine boundary
//!
//! The recognizer is consumed through a small initialize/recognize
//! contract: an engine is constructed from the resolved asset triple and
//! turns captured frames into text lines. The PaddleOCR implementation
//! runs the detector and recognizer networks via ONNX Runtime.

pub mod dict;
pub mod engine;
mod preprocess;

pub use dict::CtcDecoder;
pub use engine::PaddleOcrEngine;

use anyhow::Result;

use crate::capture::CapturedFrame;

/// Common interface for OCR engines.
pub trait TextRecognizer {
    fn recognize(&mut self, frame: &CapturedFrame) -> Result<OcrOutput>;
}

/// One recognized line of text
#[derive(Debug, Clone)]
pub struct TextLine {
    /// Recognized text
    pub text: String,
    /// Mean recognition confidence (0.0 - 1.0)
    pub confidence: f32,
}

/// Full recognition result for one frame
#[derive(Debug, Clone, Default)]
pub struct OcrOutput {
    pub lines: Vec<TextLine>,
}

impl OcrOutput {
    /// All recognized lines joined with newlines
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Mean confidence across lines, 0.0 when nothing was recognized
    pub fn average_confidence(&self) -> f32 {
        if self.lines.is_empty() {
            return 0.0;
        }
        self.lines.iter().map(|line| line.confidence).sum::<f32>() / self.lines.len() as f32
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Engine tuning options
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Decode the model's space class between characters
    pub space: bool,
    /// Detection probability threshold (0.0 - 1.0)
    pub det_threshold: f32,
    /// Maximum detection input dimension
    pub det_target_size: u32,
    /// Recognition input height
    pub rec_height: u32,
    /// Maximum recognition input width
    pub rec_max_width: u32,
    /// Intra-op thread count for the ONNX runtime
    pub intra_threads: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            space: false,
            det_threshold: 0.3,
            det_target_size: 960,
            rec_height: 48,
            rec_max_width: 640,
            intra_threads: 4,
        }
    }
}
