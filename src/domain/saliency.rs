// ============================================================
// Layer 3 — Saliency Map
// ============================================================
// A 2D grid of scalars in [0, 1], one per pixel of the model
// input, produced by Grad-CAM for a single (image, class) pair.
// Row-major: index = y * width + x.

/// Value used for every pixel when no gradient reached the
/// observed layer. Mid-scale so it stays distinguishable from
/// an all-zero map.
pub const NEUTRAL_SALIENCY: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct SaliencyMap {
    width:  usize,
    height: usize,
    values: Vec<f32>,
}

impl SaliencyMap {
    /// Build from row-major values, clamping each into [0, 1].
    /// Non-finite values become 0.
    pub fn from_values(width: usize, height: usize, values: Vec<f32>) -> Self {
        assert_eq!(values.len(), width * height, "saliency buffer does not match {width}x{height}");
        let values = values.into_iter()
            .map(|v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 })
            .collect();
        Self { width, height, values }
    }

    /// Every pixel set to the same value.
    pub fn uniform(width: usize, height: usize, value: f32) -> Self {
        Self::from_values(width, height, vec![value; width * height])
    }

    pub fn neutral(width: usize, height: usize) -> Self {
        Self::uniform(width, height, NEUTRAL_SALIENCY)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.width + x]
    }

    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }

}

#[cfg(test)]
impl SaliencyMap {
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// True when every pixel equals `value` within `eps`.
    pub fn is_uniform(&self, value: f32, eps: f32) -> bool {
        self.values.iter().all(|v| (v - value).abs() <= eps)
    }
}
