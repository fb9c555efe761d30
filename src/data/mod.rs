// ============================================================
// Layer 4 — Image Pipeline
// ============================================================
// Everything between raw upload bytes and model-ready tensors,
// and back from saliency maps to displayable images:
//
//   upload bytes
//       │
//       ▼
//   Preprocessor   → decode, resize to 224×224, normalise,
//       │            lay out as [1, 3, H, W]
//       ▼
//   (ml layer: inference + Grad-CAM)
//       │
//       ▼
//   visualize      → JET colormap, alpha blend onto the
//                    resized original, PNG + base64
//
// Each module is responsible for exactly one direction.

/// Decode, resize and normalise uploaded images
pub mod preprocessor;

/// Heatmap colouring, overlay blending and PNG/base64 encoding
pub mod visualize;
