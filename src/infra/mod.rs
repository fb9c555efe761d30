// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any specific
// business layer:
//
//   checkpoint.rs — Saving and loading model weights
//                   Uses Burn's CompactRecorder for the weights
//                   and writes HybridModelConfig as JSON next to
//                   them so inference can rebuild the model.
//
//   model_slot.rs — Background model loading
//                   A NotStarted → Loading → Ready / Failed state
//                   machine with a bounded wait for requests that
//                   arrive before the model is ready.
//
// Reference: Rust Book §16 (Shared-State Concurrency)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Background loading state machine for the shared model
pub mod model_slot;
