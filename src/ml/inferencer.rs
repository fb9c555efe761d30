// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Owns the loaded model in two forms:
//   - the autodiff model, used for Grad-CAM replays
//   - its `valid()` copy on the plain NdArray backend, used for
//     classification
//
// Both live behind one mutex, so explanation sessions never
// overlap. Each session creates its own activation capture.

use anyhow::{ensure, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, Autodiff, NdArray},
    module::AutodiffModule,
    tensor::activation::softmax,
};
use image::DynamicImage;
use parking_lot::Mutex;

use crate::data::preprocessor::ImageTensor;
use crate::domain::diagnosis::{ClassMap, ClassProbabilities, CLASS_NAMES};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::gradcam::GradCam;
use crate::ml::model::HybridModel;

pub type InferBackend   = NdArray;
pub type ExplainBackend = Autodiff<InferBackend>;

/// Device reported by the health endpoint.
pub const DEVICE_LABEL: &str = "cpu";

struct LoadedModel {
    tracked: HybridModel<ExplainBackend>,
    frozen:  HybridModel<InferBackend>,
}

pub struct Inferencer {
    model:      Mutex<LoadedModel>,
    device:     NdArrayDevice,
    gradcam:    GradCam,
    image_size: usize,
}

impl Inferencer {
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager) -> Result<Self> {
        let device = NdArrayDevice::default();
        let cfg    = ckpt_manager.load_config()?;
        let model: HybridModel<ExplainBackend> = cfg.init(&device);
        let model  = ckpt_manager.load_model(model, &device)?;
        tracing::info!(
            features = cfg.num_features(),
            layer    = %model.target_layer(),
            "Model loaded from checkpoint"
        );
        Self::from_model(model, device)
    }

    pub fn from_model(model: HybridModel<ExplainBackend>, device: NdArrayDevice) -> Result<Self> {
        ensure!(
            model.num_classes == CLASS_NAMES.len(),
            "Model predicts {} classes, expected {}",
            model.num_classes, CLASS_NAMES.len()
        );
        let image_size = model.image_size;
        let frozen     = model.valid();
        Ok(Self {
            model: Mutex::new(LoadedModel { tracked: model, frozen }),
            device,
            gradcam: GradCam::default(),
            image_size,
        })
    }

    /// Square input resolution the model expects.
    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Softmax over the logits of one preprocessed image.
    pub fn classify(&self, image: &ImageTensor) -> Result<ClassProbabilities> {
        self.check_shape(image)?;
        let input  = image.to_tensor::<InferBackend>(&self.device);
        let logits = self.model.lock().frozen.forward(input);
        let probs: Vec<f32> = softmax(logits, 1).into_data().iter::<f32>().collect();
        ClassProbabilities::new(&CLASS_NAMES, &probs)
    }

    /// Grad-CAM overlay for every class, keyed in class order.
    pub fn explain(&self, image: &ImageTensor, original: &DynamicImage) -> Result<ClassMap<String>> {
        self.check_shape(image)?;
        let input = image.to_tensor::<ExplainBackend>(&self.device);
        let model = self.model.lock();
        self.gradcam.generate_all(&model.tracked, &input, original, &CLASS_NAMES)
    }

    fn check_shape(&self, image: &ImageTensor) -> Result<()> {
        let expected = [1, 3, self.image_size, self.image_size];
        ensure!(
            image.shape() == expected,
            "Input shape {:?} does not match model input {:?}",
            image.shape(), expected
        );
        Ok(())
    }
}
