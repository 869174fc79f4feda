// ============================================================
// Layer 4 — Image Loader
// ============================================================
// Turns an image file into the normalised tensor the encoder
// expects: shape [1, 3, size, size], channels first, each channel
// standardised with the ImageNet statistics the VGG weights were
// trained with.

use anyhow::{Context, Result};
use burn::{prelude::*, tensor::TensorData};
use image::{imageops::FilterType, RgbImage};
use std::path::Path;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD:  [f32; 3] = [0.229, 0.224, 0.225];

/// Decode, resize (exact, aspect ratio not preserved) and normalise.
pub fn load_image<B: Backend>(path: &Path, size: usize, device: &B::Device) -> Result<Tensor<B, 4>> {
    let img = image::open(path)
        .with_context(|| format!("Cannot decode image '{}'", path.display()))?;
    let rgb = img
        .resize_exact(size as u32, size as u32, FilterType::Triangle)
        .to_rgb8();

    let values = to_chw_normalised(&rgb);
    Ok(Tensor::from_data(TensorData::new(values, [1, 3, size, size]), device))
}

/// Pixels in CHW order, scaled to [0, 1] then standardised per channel.
pub fn to_chw_normalised(rgb: &RgbImage) -> Vec<f32> {
    let (w, h) = rgb.dimensions();
    let plane  = (w * h) as usize;
    let mut out = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let offset = (y * w + x) as usize;
        for c in 0..3 {
            let v = pixel.0[c] as f32 / 255.0;
            out[c * plane + offset] = (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    out
}
