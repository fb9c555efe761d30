// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns an uploaded image into the tensor layout the model was
// trained on:
//
//   1. Decode any supported format (PNG, JPEG, BMP, WebP)
//   2. Convert to RGB (grayscale is replicated, alpha dropped)
//   3. Resize to size×size with a triangle (bilinear) filter
//   4. Scale to [0, 1] and normalise per channel with the
//      ImageNet mean / std
//   5. Lay out channel-first: [1, 3, H, W]
//
// The result is kept as plain f32 data so the same preprocessed
// image can be moved onto both the inference backend and the
// autodiff backend used for explanations.

use anyhow::{Context, Result};
use burn::prelude::*;
use image::{imageops::FilterType, DynamicImage, RgbImage};

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD:  [f32; 3] = [0.229, 0.224, 0.225];

/// Square input resolution of the deployed model.
pub const DEFAULT_IMAGE_SIZE: usize = 224;

/// Filter for every resize to the model resolution, so the model
/// input, the echoed upload and the heatmap base share pixels.
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// A single normalised image in [1, 3, H, W] layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data:   Vec<f32>,
    height: usize,
    width:  usize,
}

impl ImageTensor {
    pub fn shape(&self) -> [usize; 4] {
        [1, 3, self.height, self.width]
    }

    /// Copy onto a backend device as a [1, 3, H, W] tensor.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 4> {
        Tensor::from_data(TensorData::new(self.data.clone(), self.shape()), device)
    }
}

#[cfg(test)]
impl ImageTensor {
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Value at (channel, y, x).
    pub fn at(&self, c: usize, y: usize, x: usize) -> f32 {
        self.data[(c * self.height + y) * self.width + x]
    }
}

pub struct Preprocessor {
    size: usize,
    mean: [f32; 3],
    std:  [f32; 3],
}

impl Preprocessor {
    pub fn new(size: usize) -> Self {
        Self { size, mean: IMAGENET_MEAN, std: IMAGENET_STD }
    }

    /// Decode raw upload bytes, sniffing the format from the content.
    pub fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes)
            .context("Cannot decode image data")
    }

    /// RGB copy of the image at the model resolution.
    pub fn resized_rgb(&self, image: &DynamicImage) -> RgbImage {
        let side = self.size as u32;
        image.resize_exact(side, side, RESIZE_FILTER).to_rgb8()
    }

    /// Resize + normalise into channel-first layout.
    pub fn preprocess(&self, image: &DynamicImage) -> ImageTensor {
        let rgb   = self.resized_rgb(image);
        let plane = self.size * self.size;
        let mut data = vec![0.0f32; 3 * plane];

        for (x, y, pixel) in rgb.enumerate_pixels() {
            let offset = y as usize * self.size + x as usize;
            for c in 0..3 {
                let v = pixel.0[c] as f32 / 255.0;
                data[c * plane + offset] = (v - self.mean[c]) / self.std[c];
            }
        }

        ImageTensor { data, height: self.size, width: self.size }
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_SIZE)
    }
}
