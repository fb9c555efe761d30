// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish one
// goal: turning an uploaded scan into a diagnosis report.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No HTTP or printing here (that's Layer 1 and the api)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Image → probabilities → heatmaps → risk → report
pub mod diagnose_use_case;

// Write a freshly initialised checkpoint
pub mod init_checkpoint_use_case;
