// ============================================================
// Layer 5 — Grad-CAM Explanation Engine
// ============================================================
// For one (image, class) pair, once the batch size and class
// index have been checked against the model:
//
//   1. Clear the capture
//   2. Clone the input and mark the clone as requiring grad
//   3. Replay the model with the feature extractor tracked,
//      observing the target layer
//   4. Back-propagate from the chosen class logit
//   5. weights[c] = mean over (H, W) of the captured gradient
//   6. cam       = relu( Σ_c weights[c] · activations[c] )
//   7. cam      /= max(cam)   (when max > 0)
//   8. Bilinear resize to the model input resolution
//
// If the target layer received no gradient the map is uniform
// 0.5. Every call builds its own graph; nothing is retained
// between classes.

use burn::tensor::{
    backend::AutodiffBackend,
    module::interpolate,
    ops::{InterpolateMode, InterpolateOptions},
    ElementConversion, Tensor,
};
use image::DynamicImage;
use thiserror::Error;
use tracing::{debug, warn};

use crate::data::visualize::{self, DEFAULT_ALPHA};
use crate::domain::diagnosis::ClassMap;
use crate::domain::saliency::SaliencyMap;
use crate::ml::capture::ActivationCapture;
use crate::ml::model::{GradMode, HybridModel, LayerObserver};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExplainError {
    #[error("class index {index} is out of range for {num_classes} classes")]
    ClassOutOfRange { index: usize, num_classes: usize },
    #[error("expected a single-image batch, got {0} images")]
    BatchSize(usize),
}

/// What the engine needs from a model: a gradient-tracked forward
/// pass with an observation hook and the geometry of its input.
pub trait ExplainableModel<B: AutodiffBackend> {
    fn forward_tracked(
        &self,
        images:   Tensor<B, 4>,
        observer: &mut dyn LayerObserver<B>,
    ) -> Tensor<B, 2>;

    /// Side length of the square model input.
    fn input_resolution(&self) -> usize;

    /// Width of the logit vector.
    fn num_classes(&self) -> usize;

    /// Layer observed by default.
    fn target_layer(&self) -> String;
}

impl<B: AutodiffBackend> ExplainableModel<B> for HybridModel<B> {
    fn forward_tracked(
        &self,
        images:   Tensor<B, 4>,
        observer: &mut dyn LayerObserver<B>,
    ) -> Tensor<B, 2> {
        self.forward_with(images, GradMode::Tracked, observer)
    }

    fn input_resolution(&self) -> usize {
        self.image_size
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn target_layer(&self) -> String {
        HybridModel::target_layer(self)
    }
}

pub struct GradCam {
    alpha: f32,
}

impl GradCam {
    pub fn new(alpha: f32) -> Self {
        Self { alpha }
    }

    /// Saliency map for `class_index`, at the model input resolution.
    pub fn generate<B, M>(
        &self,
        model:       &M,
        capture:     &mut ActivationCapture<B>,
        input:       &Tensor<B, 4>,
        class_index: usize,
    ) -> Result<SaliencyMap, ExplainError>
    where
        B: AutodiffBackend,
        M: ExplainableModel<B>,
    {
        let [batch, _, _, _] = input.dims();
        if batch != 1 {
            return Err(ExplainError::BatchSize(batch));
        }
        let num_classes = model.num_classes();
        if class_index >= num_classes {
            return Err(ExplainError::ClassOutOfRange { index: class_index, num_classes });
        }
        let resolution = model.input_resolution();

        capture.clear();
        let images = input.clone().detach().require_grad();
        let logits = model.forward_tracked(images, &mut *capture);

        let score = logits.slice([0..1, class_index..class_index + 1]).sum();
        let grads = score.backward();
        capture.on_backward(&grads);

        let (activations, gradients) = match (capture.activations(), capture.gradients()) {
            (Some(a), Some(g)) => (a.clone(), g.clone()),
            _ => {
                warn!(
                    layer = capture.layer(),
                    class_index,
                    "No gradient reached the observed layer, using neutral saliency"
                );
                return Ok(SaliencyMap::neutral(resolution, resolution));
            }
        };

        // [1, C, h, w] → [1, C, 1, 1]
        let weights = gradients.mean_dim(3).mean_dim(2);
        let cam     = (activations * weights).sum_dim(1).clamp_min(0.0);

        let max: f32 = cam.clone().max().into_scalar().elem();
        let cam = if max > 0.0 { cam / max } else { cam };

        let resized = interpolate(
            cam,
            [resolution, resolution],
            InterpolateOptions::new(InterpolateMode::Bilinear),
        );
        let values: Vec<f32> = resized.into_data().iter::<f32>().collect();

        Ok(SaliencyMap::from_values(resolution, resolution, values))
    }

    /// One base64 PNG overlay per class, keyed by class name in
    /// `class_names` order, observing the model's default layer.
    pub fn generate_all<B, M>(
        &self,
        model:       &M,
        input:       &Tensor<B, 4>,
        original:    &DynamicImage,
        class_names: &[&str],
    ) -> anyhow::Result<ClassMap<String>>
    where
        B: AutodiffBackend,
        M: ExplainableModel<B>,
    {
        let mut capture = ActivationCapture::new(model.target_layer());
        self.generate_all_with(&mut capture, model, input, original, class_names)
    }

    /// Same as [`generate_all`](Self::generate_all) with a caller-owned
    /// capture. The capture is detached when this returns, on success
    /// or error.
    pub fn generate_all_with<B, M>(
        &self,
        capture:     &mut ActivationCapture<B>,
        model:       &M,
        input:       &Tensor<B, 4>,
        original:    &DynamicImage,
        class_names: &[&str],
    ) -> anyhow::Result<ClassMap<String>>
    where
        B: AutodiffBackend,
        M: ExplainableModel<B>,
    {
        let mut session = capture.attach();
        let mut maps    = ClassMap::new();

        for (index, name) in class_names.iter().enumerate() {
            let saliency = self.generate(model, &mut *session, input, index)?;
            let overlay  = visualize::blend(original, &saliency, self.alpha);
            maps.insert(name.to_string(), visualize::encode_png_base64(&overlay)?);
            debug!(class = *name, peak = saliency.max(), "Grad-CAM map generated");
        }

        Ok(maps)
    }
}

impl Default for GradCam {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}
