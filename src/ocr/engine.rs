//! PaddleOCR engine over ONNX Runtime
//!
//! Constructed all-or-nothing from the resolved asset triple; any failure
//! leaves no engine instance behind. Recognition runs the detector over
//! the full frame, crops each detected text band, and greedy-CTC-decodes
//! the recognizer output with the character dictionary.

use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use tracing::{debug, info};

use crate::assets::LoadedAssets;
use crate::capture::CapturedFrame;

use super::dict::CtcDecoder;
use super::preprocess::{
    crop_region, detection_tensor, frame_to_rgb, recognition_tensor, InputTensor,
};
use super::{EngineOptions, OcrOutput, TextLine, TextRecognizer};

/// PaddleOCR text recognition engine.
pub struct PaddleOcrEngine {
    det: Session,
    rec: Session,
    det_io: SessionIo,
    rec_io: SessionIo,
    decoder: CtcDecoder,
    options: EngineOptions,
}

struct SessionIo {
    input: String,
    output: String,
}

impl PaddleOcrEngine {
    /// Build the engine from in-memory model bytes and dictionary text.
    pub fn from_assets(assets: &LoadedAssets, options: EngineOptions) -> Result<Self> {
        let det = build_session(&assets.det, options.intra_threads)
            .context("failed to load detection model")?;
        let rec = build_session(&assets.rec, options.intra_threads)
            .context("failed to load recognition model")?;

        let det_io = session_io(&det).context("detection model has no inputs or outputs")?;
        let rec_io = session_io(&rec).context("recognition model has no inputs or outputs")?;

        let decoder = CtcDecoder::from_dict(&assets.dict, options.space);

        info!(
            det_bytes = assets.det.len(),
            rec_bytes = assets.rec.len(),
            dictionary_classes = decoder.class_count(),
            "OCR engine initialized"
        );

        Ok(Self {
            det,
            rec,
            det_io,
            rec_io,
            decoder,
            options,
        })
    }

    /// Run the detector and return its probability map with dimensions.
    fn detect(&mut self, tensor: InputTensor) -> Result<(Vec<f32>, usize, usize)> {
        let input = Tensor::from_array((tensor.shape, tensor.data))?;
        let outputs = self
            .det
            .run(ort::inputs![self.det_io.input.as_str() => input])?;
        let (shape, data) = outputs[self.det_io.output.as_str()].try_extract_tensor::<f32>()?;

        // Probability map comes back as (1, 1, H, W).
        let dims: Vec<usize> = shape.iter().map(|d| *d as usize).collect();
        anyhow::ensure!(dims.len() == 4, "unexpected detection output rank");
        Ok((data.to_vec(), dims[3], dims[2]))
    }

    /// Run the recognizer on one crop and decode the result.
    fn recognize_band(&mut self, tensor: InputTensor) -> Result<(String, f32)> {
        let input = Tensor::from_array((tensor.shape, tensor.data))?;
        let outputs = self
            .rec
            .run(ort::inputs![self.rec_io.input.as_str() => input])?;
        let (shape, data) = outputs[self.rec_io.output.as_str()].try_extract_tensor::<f32>()?;

        // Recognition output is (1, seq_len, classes).
        let dims: Vec<usize> = shape.iter().map(|d| *d as usize).collect();
        anyhow::ensure!(dims.len() == 3, "unexpected recognition output rank");
        Ok(self.decoder.decode(data, dims[2]))
    }
}

impl TextRecognizer for PaddleOcrEngine {
    fn recognize(&mut self, frame: &CapturedFrame) -> Result<OcrOutput> {
        let rgb = frame_to_rgb(frame);
        let (det_input, scale) = detection_tensor(&rgb, self.options.det_target_size);
        let (prob_map, map_w, map_h) = self.detect(det_input)?;

        let bands = find_text_bands(&prob_map, map_w, map_h, self.options.det_threshold);
        debug!(bands = bands.len(), "text bands detected");

        let mut lines = Vec::with_capacity(bands.len());
        for band in bands {
            let crop = crop_region(
                &rgb,
                unscale(band.left, scale),
                unscale(band.top, scale),
                unscale(band.right + 1, scale),
                unscale(band.bottom + 1, scale),
            );
            let rec_input =
                recognition_tensor(&crop, self.options.rec_height, self.options.rec_max_width);
            let (text, confidence) = self.recognize_band(rec_input)?;
            if !text.is_empty() {
                lines.push(TextLine { text, confidence });
            }
        }

        Ok(OcrOutput { lines })
    }
}

fn build_session(model: &[u8], intra_threads: usize) -> Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(ort::Error::<()>::from)?
        .with_intra_threads(intra_threads)
        .map_err(ort::Error::<()>::from)?
        .commit_from_memory(model)?;
    Ok(session)
}

fn session_io(session: &Session) -> Option<SessionIo> {
    Some(SessionIo {
        input: session.inputs().first()?.name().to_string(),
        output: session.outputs().first()?.name().to_string(),
    })
}

fn unscale(value: usize, scale: f32) -> usize {
    (value as f32 / scale) as usize
}

/// A horizontal text region in probability-map coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Band {
    top: usize,
    bottom: usize,
    left: usize,
    right: usize,
}

/// Rows whose probability exceeds the threshold are grouped into
/// contiguous bands; each band's column extent is the span of its
/// above-threshold pixels. Bands shorter than two rows are noise.
fn find_text_bands(map: &[f32], width: usize, height: usize, threshold: f32) -> Vec<Band> {
    let mut bands = Vec::new();
    let mut current: Option<Band> = None;

    for y in 0..height {
        let row = &map[y * width..(y + 1) * width];
        let mut left = None;
        let mut right = 0usize;
        for (x, &p) in row.iter().enumerate() {
            if p > threshold {
                left.get_or_insert(x);
                right = x;
            }
        }

        if let Some(l) = left {
            if let Some(band) = current.as_mut() {
                band.bottom = y;
                band.left = band.left.min(l);
                band.right = band.right.max(right);
            } else {
                current = Some(Band {
                    top: y,
                    bottom: y,
                    left: l,
                    right,
                });
            }
        } else if let Some(band) = current.take() {
            if band.bottom > band.top {
                bands.push(band);
            }
        }
    }

    if let Some(band) = current {
        if band.bottom > band.top {
            bands.push(band);
        }
    }

    bands
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_from_rows(rows: &[&[f32]]) -> (Vec<f32>, usize, usize) {
        let width = rows[0].len();
        let height = rows.len();
        let mut map = Vec::with_capacity(width * height);
        for row in rows {
            map.extend_from_slice(row);
        }
        (map, width, height)
    }

    #[test]
    fn test_no_bands_in_empty_map() {
        let map = vec![0.0f32; 8 * 8];
        assert!(find_text_bands(&map, 8, 8, 0.3).is_empty());
    }

    #[test]
    fn test_single_band_extent() {
        let (map, w, h) = map_from_rows(&[
            &[0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.9, 0.9, 0.0],
            &[0.0, 0.9, 0.9, 0.9],
            &[0.0, 0.0, 0.0, 0.0],
        ]);

        let bands = find_text_bands(&map, w, h, 0.3);
        assert_eq!(bands.len(), 1);
        assert_eq!(
            bands[0],
            Band {
                top: 1,
                bottom: 2,
                left: 1,
                right: 3
            }
        );
    }

    #[test]
    fn test_two_separated_bands() {
        let (map, w, h) = map_from_rows(&[
            &[0.9, 0.9, 0.0],
            &[0.9, 0.9, 0.0],
            &[0.0, 0.0, 0.0],
            &[0.0, 0.9, 0.9],
            &[0.0, 0.9, 0.9],
        ]);

        let bands = find_text_bands(&map, w, h, 0.3);
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].top, 0);
        assert_eq!(bands[1].left, 1);
    }

    #[test]
    fn test_single_row_band_is_noise() {
        let (map, w, h) = map_from_rows(&[
            &[0.0, 0.0, 0.0],
            &[0.0, 0.9, 0.0],
            &[0.0, 0.0, 0.0],
        ]);

        assert!(find_text_bands(&map, w, h, 0.3).is_empty());
    }

    #[test]
    fn test_band_touching_bottom_edge() {
        let (map, w, h) = map_from_rows(&[
            &[0.0, 0.0],
            &[0.9, 0.9],
            &[0.9, 0.9],
        ]);

        let bands = find_text_bands(&map, w, h, 0.3);
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].bottom, 2);
    }
}
