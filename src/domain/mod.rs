// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types describing what a diagnosis IS:
//   - the fixed tumor class list
//   - ordered class → value mappings (probabilities, heatmaps)
//   - the risk assessment derived from a prediction
//   - the report returned to callers
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O, image decoding or network calls
//
// Everything here is unit-testable without a tensor backend.

/// Class list, ordered class maps, probability distribution, report
pub mod diagnosis;

/// Risk level derived from (predicted class, confidence)
pub mod risk;

/// Normalised per-class spatial saliency maps
pub mod saliency;
