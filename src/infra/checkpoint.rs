// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the hybrid model using Burn's
// CompactRecorder.
//
// One checkpoint = two files sharing a stem (MODEL_PATH):
//   1. <stem>.mpk    — all learned parameters
//   2. <stem>.json   — HybridModelConfig (architecture)
//
// Any extension on MODEL_PATH is replaced, so
// `models/hybrid.pth` resolves to `models/hybrid.mpk` and
// `models/hybrid.json`.
//
// The config is needed to rebuild the exact module tree before
// the weights can be loaded into it; the recorder rejects a
// record whose structure doesn't match.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    backend::NdArray,
    prelude::*,
    record::{CompactRecorder, FileRecorder, Recorder},
};

use crate::ml::model::{HybridModel, HybridModelConfig};

pub struct CheckpointManager {
    /// Path stem shared by the weights and config files
    stem: PathBuf,
}

impl CheckpointManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { stem: path.into() }
    }

    /// File the recorder reads and writes. The recorder picks the
    /// extension; it does not depend on the backend.
    pub fn weights_path(&self) -> PathBuf {
        self.stem.with_extension(<CompactRecorder as FileRecorder<NdArray>>::file_extension())
    }

    pub fn config_path(&self) -> PathBuf {
        self.stem.with_extension("json")
    }

    pub fn exists(&self) -> bool {
        self.weights_path().is_file() && self.config_path().is_file()
    }

    /// Write config + weights. Creates the parent directory.
    pub fn save<B: Backend>(&self, cfg: &HybridModelConfig, model: &HybridModel<B>) -> Result<()> {
        if let Some(dir) = self.stem.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        }
        self.save_config(cfg)?;
        self.save_model(model)
    }

    pub fn save_model<B: Backend>(&self, model: &HybridModel<B>) -> Result<()> {
        CompactRecorder::new()
            .record(model.clone().into_record(), self.stem.clone())
            .with_context(|| {
                format!("Failed to save weights to '{}'", self.weights_path().display())
            })?;

        tracing::debug!("Saved weights to '{}'", self.weights_path().display());
        Ok(())
    }

    /// Load weights into `model`, which must have been built from
    /// the matching config.
    pub fn load_model<B: Backend>(
        &self,
        model:  HybridModel<B>,
        device: &B::Device,
    ) -> Result<HybridModel<B>> {
        tracing::info!("Loading weights from '{}'", self.weights_path().display());

        let record = CompactRecorder::new()
            .load(self.stem.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load weights '{}'. Run 'init-checkpoint' to create one.",
                    self.weights_path().display()
                )
            })?;

        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &HybridModelConfig) -> Result<()> {
        let path = self.config_path();
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved model config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<HybridModelConfig> {
        let path = self.config_path();
        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read model config from '{}'. \
                     Run 'init-checkpoint' to create one.",
                    path.display()
                )
            })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Invalid model config in '{}'", path.display()))
    }
}
