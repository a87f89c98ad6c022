//! Tensor preparation for the PaddleOCR networks
//!
//! Converts RGBA frames into the normalized NCHW float tensors the
//! detector and recognizer expect. PaddleOCR normalization maps
//! [0, 255] to [-1, 1].

use ndarray::Array3;

use crate::capture::CapturedFrame;

/// An NCHW tensor as flat data plus its shape, ready for the runtime.
pub struct InputTensor {
    pub data: Vec<f32>,
    pub shape: [usize; 4],
}

/// Convert a frame to an HWC RGB array with 0-1 channel values.
pub fn frame_to_rgb(frame: &CapturedFrame) -> Array3<f32> {
    let (w, h) = (frame.width as usize, frame.height as usize);
    let mut rgb = Array3::<f32>::zeros((h, w, 3));

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) * 4;
            for c in 0..3 {
                rgb[[y, x, c]] = frame.data[idx + c] as f32 / 255.0;
            }
        }
    }

    rgb
}

/// Build the detection input: scaled to fit `target_size`, padded so both
/// dimensions are multiples of 32. Returns the tensor and the scale that
/// maps original coordinates into it.
pub fn detection_tensor(rgb: &Array3<f32>, target_size: u32) -> (InputTensor, f32) {
    let (h, w, _) = rgb.dim();
    let scale = target_size as f32 / (h.max(w) as f32);
    // Extreme aspect ratios can round the short side down to zero.
    let new_h = (((h as f32) * scale) as usize).max(1);
    let new_w = (((w as f32) * scale) as usize).max(1);

    let padded_h = new_h.div_ceil(32) * 32;
    let padded_w = new_w.div_ceil(32) * 32;

    let resized = resize_bilinear(rgb, new_h, new_w, padded_h, padded_w);
    (pack_normalized(&resized), scale)
}

/// Build a recognition input: fixed height, width scaled to match and
/// capped at `max_width`.
pub fn recognition_tensor(crop: &Array3<f32>, height: u32, max_width: u32) -> InputTensor {
    let (h, w, _) = crop.dim();
    let scale = height as f32 / h as f32;
    let new_h = height as usize;
    let new_w = (((w as f32) * scale) as usize).clamp(1, max_width as usize);

    let resized = resize_bilinear(crop, new_h, new_w, new_h, new_w);
    pack_normalized(&resized)
}

/// Extract a rectangular region, clamped to the image bounds.
pub fn crop_region(
    rgb: &Array3<f32>,
    left: usize,
    top: usize,
    right: usize,
    bottom: usize,
) -> Array3<f32> {
    let (h, w, c) = rgb.dim();
    let x1 = left.min(w.saturating_sub(1));
    let y1 = top.min(h.saturating_sub(1));
    let x2 = right.clamp(x1 + 1, w);
    let y2 = bottom.clamp(y1 + 1, h);

    let mut cropped = Array3::<f32>::zeros((y2 - y1, x2 - x1, c));
    for y in 0..(y2 - y1) {
        for x in 0..(x2 - x1) {
            for ch in 0..c {
                cropped[[y, x, ch]] = rgb[[y1 + y, x1 + x, ch]];
            }
        }
    }
    cropped
}

/// Bilinear resize into a zero-padded canvas of `(canvas_h, canvas_w)`.
fn resize_bilinear(
    src: &Array3<f32>,
    new_h: usize,
    new_w: usize,
    canvas_h: usize,
    canvas_w: usize,
) -> Array3<f32> {
    let (h, w, c) = src.dim();
    let mut out = Array3::<f32>::zeros((canvas_h, canvas_w, c));

    let scale_y = h as f32 / new_h as f32;
    let scale_x = w as f32 / new_w as f32;

    for y in 0..new_h {
        for x in 0..new_w {
            let src_y = (y as f32 * scale_y).min(h as f32 - 1.0);
            let src_x = (x as f32 * scale_x).min(w as f32 - 1.0);

            let y0 = src_y.floor() as usize;
            let y1 = (y0 + 1).min(h - 1);
            let x0 = src_x.floor() as usize;
            let x1 = (x0 + 1).min(w - 1);

            let fy = src_y - y0 as f32;
            let fx = src_x - x0 as f32;

            for ch in 0..c {
                let top = src[[y0, x0, ch]] * (1.0 - fx) + src[[y0, x1, ch]] * fx;
                let bottom = src[[y1, x0, ch]] * (1.0 - fx) + src[[y1, x1, ch]] * fx;
                out[[y, x, ch]] = top * (1.0 - fy) + bottom * fy;
            }
        }
    }

    out
}

/// Pack an HWC 0-1 image into a normalized NCHW tensor.
fn pack_normalized(img: &Array3<f32>) -> InputTensor {
    let (h, w, c) = img.dim();
    let mut data = vec![0.0f32; c * h * w];

    for ch in 0..c {
        for y in 0..h {
            for x in 0..w {
                // (value - 0.5) / 0.5, i.e. [0, 1] -> [-1, 1]
                data[ch * h * w + y * w + x] = (img[[y, x, ch]] - 0.5) * 2.0;
            }
        }
    }

    InputTensor {
        data,
        shape: [1, c, h, w],
    }
}
