// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn model code. Other layers only
// see plain data (ImageTensor in, ClassProbabilities and
// saliency overlays out).
//
// What's in this layer:
//
//   quantum.rs    — 4-qubit variational circuit simulated on
//                   the exact statevector with tensor ops, so
//                   gradients flow through it like any layer
//
//   model.rs      — The hybrid classifier
//                   • DenseNet-style convolutional extractor
//                   • Feature reducer (→ one angle per qubit)
//                   • Quantum layer
//                   • Classifier over [quantum ‖ classical]
//                   One forward pass, with a gradient-mode
//                   switch and a layer observation hook
//
//   capture.rs    — Records activations and gradients of one
//                   named layer for the length of a session
//
//   gradcam.rs    — Grad-CAM: per-class saliency maps from the
//                   captured activations and gradients
//
//   inferencer.rs — Holds the loaded model; classification on
//                   NdArray, explanations on Autodiff<NdArray>
//
// Reference: Burn Book §3 (Building Blocks), §4 (Autodiff)
//            Huang et al. (2017) Densely Connected CNNs
//            Selvaraju et al. (2017) Grad-CAM

/// Simulated variational quantum circuit
pub mod quantum;

/// Hybrid classical/quantum classifier architecture
pub mod model;

/// Activation and gradient capture for one layer
pub mod capture;

/// Gradient-weighted class activation maps
pub mod gradcam;

/// Inference engine — loads checkpoint, classifies and explains
pub mod inferencer;
