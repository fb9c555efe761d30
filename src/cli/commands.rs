// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `serve`, `predict` and
// `init-checkpoint`, and all their configurable flags.
//
// Every `serve` flag can also come from the environment
// (MODEL_PATH, HOST, PORT, ...), which is how the service is
// configured in containers.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::{path::PathBuf, time::Duration};

use clap::{Args, Subcommand};

use crate::api::{ServerConfig, DEFAULT_MAX_UPLOAD_MB, DEFAULT_MODEL_ACCURACY};

const DEFAULT_MODEL_PATH: &str = "models/hybrid_model";

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP service (model loads in the background)
    Serve(ServeArgs),

    /// Diagnose a single image from the command line
    Predict(PredictArgs),

    /// Write a randomly initialised checkpoint
    InitCheckpoint(InitCheckpointArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Checkpoint path stem (weights and config share it)
    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Accuracy reported alongside every prediction
    #[arg(long, env = "MODEL_ACCURACY", default_value_t = DEFAULT_MODEL_ACCURACY)]
    pub model_accuracy: f64,

    /// How long a request waits for the model to finish loading
    #[arg(long, env = "MODEL_LOAD_TIMEOUT_SECS", default_value_t = 120)]
    pub load_timeout_secs: u64,

    /// Largest accepted upload, in megabytes
    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = DEFAULT_MAX_UPLOAD_MB)]
    pub max_upload_mb: usize,
}

/// The api layer never sees clap types.
impl From<&ServeArgs> for ServerConfig {
    fn from(a: &ServeArgs) -> Self {
        ServerConfig {
            host:             a.host.clone(),
            port:             a.port,
            model_accuracy:   a.model_accuracy,
            load_timeout:     Duration::from_secs(a.load_timeout_secs),
            max_upload_bytes: a.max_upload_mb * 1024 * 1024,
        }
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// MRI scan to classify (PNG, JPEG, BMP or WebP)
    #[arg(long)]
    pub image: PathBuf,

    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,

    /// Skip Grad-CAM heatmaps
    #[arg(long)]
    pub no_gradcam: bool,

    /// Write each heatmap overlay as <class>.png into this directory
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    #[arg(long, env = "MODEL_ACCURACY", default_value_t = DEFAULT_MODEL_ACCURACY)]
    pub model_accuracy: f64,
}

#[derive(Args, Debug)]
pub struct InitCheckpointArgs {
    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,

    /// Square input resolution the model is built for
    #[arg(long, default_value_t = 224)]
    pub image_size: usize,

    /// Overwrite an existing checkpoint
    #[arg(long)]
    pub force: bool,
}
