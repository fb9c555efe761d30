// ============================================================
// Layer 4 — Heatmap Visualisation
// ============================================================
// Renders a saliency map the way clinicians are used to seeing
// Grad-CAM output:
//
//   1. Resize the original image to the map's resolution with
//      the same filter the preprocessor uses
//   2. Force 3 channels (gray → RGB, RGBA → RGB)
//   3. Quantise saliency to 8 bits and colour it with the JET
//      ramp: dark blue (0) → cyan → yellow → dark red (255)
//   4. Blend: out = alpha * colour + (1 - alpha) * original
//   5. Encode as PNG and wrap in base64 for JSON transport

use std::io::Cursor;

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::data::preprocessor::RESIZE_FILTER;
use crate::domain::saliency::SaliencyMap;

/// Overlay weight given to the heatmap colour.
pub const DEFAULT_ALPHA: f32 = 0.5;

/// JET colour for an 8-bit saliency level.
pub fn jet(level: u8) -> [u8; 3] {
    let x = level as f32 / 255.0;
    let ramp = |centre: f32| (1.5 - (4.0 * x - centre).abs()).clamp(0.0, 1.0);
    [
        (ramp(3.0) * 255.0).round() as u8,
        (ramp(2.0) * 255.0).round() as u8,
        (ramp(1.0) * 255.0).round() as u8,
    ]
}

/// Colour `saliency` and alpha-blend it over `original`.
/// The output has the saliency map's resolution.
pub fn blend(original: &DynamicImage, saliency: &SaliencyMap, alpha: f32) -> RgbImage {
    let alpha = alpha.clamp(0.0, 1.0);
    let (w, h) = (saliency.width() as u32, saliency.height() as u32);
    let base = original.resize_exact(w, h, RESIZE_FILTER).to_rgb8();

    RgbImage::from_fn(w, h, |x, y| {
        let level  = (saliency.get(x as usize, y as usize) * 255.0) as u8;
        let colour = jet(level);
        let under  = base.get_pixel(x, y).0;
        let mut out = [0u8; 3];
        for c in 0..3 {
            let v = alpha * colour[c] as f32 + (1.0 - alpha) * under[c] as f32;
            out[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    })
}

/// Lossless PNG bytes.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("PNG encoding failed")?;
    Ok(bytes)
}

/// PNG bytes as standard padded base64.
pub fn encode_png_base64(image: &RgbImage) -> Result<String> {
    Ok(general_purpose::STANDARD.encode(encode_png(image)?))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba, RgbaImage};

    #[test]
    fn test_jet_endpoints() {
        assert_eq!(jet(0),   [0, 0, 128]);
        assert_eq!(jet(255), [128, 0, 0]);
        // Middle of the ramp is green-dominant
        let mid = jet(128);
        assert!(mid[1] > 200);
    }

    #[test]
    fn test_jet_hue_moves_from_blue_to_red() {
        let low  = jet(40);
        let high = jet(215);
        assert!(low[2] > low[0]);
        assert!(high[0] > high[2]);
    }

    #[test]
    fn test_blend_grayscale_input() {
        let original = DynamicImage::ImageLuma8(GrayImage::from_pixel(50, 30, Luma([100])));
        let map      = SaliencyMap::uniform(16, 16, 0.0);
        let out      = blend(&original, &map, 0.5);
        assert_eq!(out.dimensions(), (16, 16));
        // 0.5 * (0,0,128) + 0.5 * (100,100,100)
        assert_eq!(out.get_pixel(3, 3).0, [50, 50, 114]);
    }

    #[test]
    fn test_blend_rgba_input_and_alpha_extremes() {
        let original = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 255])));
        let map      = SaliencyMap::uniform(8, 8, 1.0);
        assert_eq!(blend(&original, &map, 0.0).get_pixel(0, 0).0, [10, 20, 30]);
        assert_eq!(blend(&original, &map, 1.0).get_pixel(0, 0).0, jet(255));
    }

    #[test]
    fn test_transparent_overlay_matches_preprocessor_resize() {
        use crate::data::preprocessor::Preprocessor;

        let original = DynamicImage::ImageRgb8(RgbImage::from_fn(97, 61, |x, y| {
            Rgb([(x * 13 % 256) as u8, (y * 29 % 256) as u8, ((x + y) * 7 % 256) as u8])
        }));
        let map = SaliencyMap::uniform(32, 32, 0.3);
        assert_eq!(blend(&original, &map, 0.0), Preprocessor::new(32).resized_rgb(&original));
    }

    #[test]
    fn test_png_base64_decodes() {
        let img = RgbImage::from_fn(12, 7, |x, y| Rgb([x as u8 * 10, y as u8 * 20, 7]));
        let encoded = encode_png_base64(&img).unwrap();
        let bytes   = general_purpose::STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(decoded, img);
    }
}
