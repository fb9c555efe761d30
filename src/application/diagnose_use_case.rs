// ============================================================
// Layer 2 — DiagnoseUseCase
// ============================================================
// Turns one uploaded image into a DiagnosisReport:
//
//   Step 1: Decode the upload             (Layer 4 - data)
//   Step 2: Resize + normalise            (Layer 4 - data)
//   Step 3: Classify                      (Layer 5 - ml)
//   Step 4: Grad-CAM per class (optional) (Layer 5 - ml)
//   Step 5: Risk assessment               (Layer 3 - domain)
//   Step 6: Assemble the report           (Layer 3 - domain)
//
// Synchronous and CPU-bound; the HTTP layer runs it on a
// blocking thread.

use anyhow::Result;

use crate::data::{preprocessor::Preprocessor, visualize};
use crate::domain::{
    diagnosis::{round_to, ClassMap, DiagnosisReport},
    risk,
};
use crate::ml::inferencer::Inferencer;

/// Decimal places kept for confidence and probabilities.
pub const REPORT_DECIMALS: i32 = 6;

pub struct DiagnoseUseCase<'a> {
    inferencer:     &'a Inferencer,
    preprocessor:   Preprocessor,
    model_accuracy: f64,
}

impl<'a> DiagnoseUseCase<'a> {
    pub fn new(inferencer: &'a Inferencer, model_accuracy: f64) -> Self {
        Self {
            preprocessor: Preprocessor::new(inferencer.image_size()),
            inferencer,
            model_accuracy,
        }
    }

    pub fn execute(&self, bytes: &[u8], with_gradcam: bool) -> Result<DiagnosisReport> {
        let image  = self.preprocessor.decode(bytes)?;
        let tensor = self.preprocessor.preprocess(&image);

        let probabilities = self.inferencer.classify(&tensor)?;
        let (prediction, confidence) = probabilities.top();
        let confidence = confidence as f64;

        let gradcam_images = if with_gradcam {
            self.inferencer.explain(&tensor, &image)?
        } else {
            ClassMap::new()
        };

        let uploaded_image = visualize::encode_png_base64(&self.preprocessor.resized_rgb(&image))?;

        let risk_level = risk::assess(prediction, confidence);

        tracing::info!(
            prediction,
            confidence = format_args!("{confidence:.4}"),
            risk = risk_level.level.label(),
            gradcam = with_gradcam,
            "Diagnosis complete"
        );

        Ok(DiagnosisReport {
            prediction:     prediction.to_string(),
            confidence:     round_to(confidence, REPORT_DECIMALS),
            probabilities:  probabilities.rounded(REPORT_DECIMALS),
            gradcam_images,
            risk_level,
            model_accuracy: self.model_accuracy,
            uploaded_image,
        })
    }
}
