// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application)
// and the api module.
//
// Three commands are supported:
//   1. `serve`           — HTTP service with background loading
//   2. `predict`         — one-off diagnosis of a local image
//   3. `init-checkpoint` — write untrained weights + config
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use std::{fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use clap::Parser;
use commands::{Commands, InitCheckpointArgs, PredictArgs, ServeArgs};

use crate::domain::diagnosis::DiagnosisReport;
use crate::infra::{checkpoint::CheckpointManager, model_slot::ModelSlot};
use crate::ml::inferencer::Inferencer;

#[derive(Parser, Debug)]
#[command(
    name = "mri-classifier",
    version,
    about = "Hybrid quantum-classical brain MRI classifier with Grad-CAM explanations."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching handler. The CLI only routes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Serve(args)          => run_serve(args),
            Commands::Predict(args)        => run_predict(args),
            Commands::InitCheckpoint(args) => run_init_checkpoint(args),
        }
    }
}

/// Starts loading the model on a background thread, then serves
/// HTTP on a tokio runtime while it loads.
fn run_serve(args: ServeArgs) -> Result<()> {
    let config = (&args).into();
    let ckpt   = CheckpointManager::new(args.model_path);

    tracing::info!("Using checkpoint '{}'", ckpt.weights_path().display());

    let slot = Arc::new(ModelSlot::new());
    slot.spawn_loader(move || Inferencer::from_checkpoint(&ckpt))
        .context("Cannot start model loader thread")?;

    let runtime = tokio::runtime::Runtime::new().context("Cannot start async runtime")?;
    runtime.block_on(crate::api::serve(config, slot))
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::diagnose_use_case::DiagnoseUseCase;

    let bytes = fs::read(&args.image)
        .with_context(|| format!("Cannot read image '{}'", args.image.display()))?;

    let inferencer = Inferencer::from_checkpoint(&CheckpointManager::new(&args.model_path))?;
    let report = DiagnoseUseCase::new(&inferencer, args.model_accuracy)
        .execute(&bytes, !args.no_gradcam)?;

    if let Some(dir) = &args.out_dir {
        write_overlays(dir, &report)?;
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_init_checkpoint(args: InitCheckpointArgs) -> Result<()> {
    use crate::application::init_checkpoint_use_case::InitCheckpointUseCase;
    use crate::ml::model::HybridModelConfig;

    let ckpt   = CheckpointManager::new(&args.model_path);
    let config = HybridModelConfig::new().with_image_size(args.image_size);
    let target = ckpt.weights_path();

    InitCheckpointUseCase::new(ckpt, config, args.force).execute()?;

    println!("Checkpoint written to {}", target.display());
    Ok(())
}

/// Decode every base64 overlay in `report` into `<dir>/<class>.png`.
fn write_overlays(dir: &Path, report: &DiagnosisReport) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create '{}'", dir.display()))?;

    for (class, encoded) in report.gradcam_images.iter() {
        let path  = dir.join(format!("{class}.png"));
        let bytes = general_purpose::STANDARD
            .decode(encoded)
            .with_context(|| format!("Overlay for '{class}' is not valid base64"))?;
        fs::write(&path, bytes)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::info!("Wrote {}", path.display());
    }
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_defaults_and_flags() {
        let cli = Cli::try_parse_from(["mri-classifier", "serve", "--port", "9000"]).unwrap();
        let Commands::Serve(args) = cli.command else { panic!("expected serve") };
        assert_eq!(args.port, 9000);

        let config: crate::api::ServerConfig = (&args).into();
        assert_eq!(config.max_upload_bytes, args.max_upload_mb * 1024 * 1024);
        assert_eq!(config.load_timeout.as_secs(), args.load_timeout_secs);
    }

    #[test]
    fn test_predict_requires_image() {
        assert!(Cli::try_parse_from(["mri-classifier", "predict"]).is_err());
        let cli = Cli::try_parse_from([
            "mri-classifier", "predict", "--image", "scan.png", "--no-gradcam",
        ])
        .unwrap();
        let Commands::Predict(args) = cli.command else { panic!("expected predict") };
        assert!(args.no_gradcam);
        assert!(args.out_dir.is_none());
    }
}
