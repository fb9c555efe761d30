// ============================================================
// Layer 2 — InitCheckpointUseCase
// ============================================================
// Writes a freshly initialised model checkpoint so the service
// can be started without trained weights:
//
//   Step 1: Refuse to overwrite unless forced  (Layer 6 - infra)
//   Step 2: Build the model from its config    (Layer 5 - ml)
//   Step 3: Save config JSON + weights          (Layer 6 - infra)

use anyhow::{bail, Result};
use burn::backend::ndarray::NdArrayDevice;

use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    inferencer::InferBackend,
    model::{HybridModel, HybridModelConfig},
};

pub struct InitCheckpointUseCase {
    checkpoint: CheckpointManager,
    config:     HybridModelConfig,
    force:      bool,
}

impl InitCheckpointUseCase {
    pub fn new(checkpoint: CheckpointManager, config: HybridModelConfig, force: bool) -> Self {
        Self { checkpoint, config, force }
    }

    pub fn execute(&self) -> Result<()> {
        if self.checkpoint.exists() && !self.force {
            bail!(
                "Checkpoint '{}' already exists. Pass --force to overwrite it.",
                self.checkpoint.weights_path().display()
            );
        }

        let device = NdArrayDevice::default();
        let model: HybridModel<InferBackend> = self.config.init(&device);
        self.checkpoint.save(&self.config, &model)?;

        tracing::info!(
            features = self.config.num_features(),
            weights  = %self.checkpoint.weights_path().display(),
            "Initialised checkpoint"
        );
        Ok(())
    }
}
