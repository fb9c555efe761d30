// ============================================================
// Layer 5 — Activation / Gradient Capture
// ============================================================
// Records what one named layer produced on the forward pass and
// the gradient of the class score w.r.t. that output on the
// backward pass.
//
// Burn only keeps gradients for leaf tensors, so on the forward
// pass the observed output is re-rooted: the activation snapshot
// is stored, and the pass continues from a fresh leaf that
// requires grad. After `backward()` the leaf's gradient is the
// gradient at the layer output.
//
// A capture is inert until attached. `attach()` hands out a
// session guard; dropping the guard detaches the capture on every
// exit path, including early returns and panics.

use std::ops::{Deref, DerefMut};

use burn::tensor::{backend::AutodiffBackend, Tensor};

use crate::ml::model::LayerObserver;

pub struct ActivationCapture<B: AutodiffBackend> {
    layer:       String,
    attached:    bool,
    leaf:        Option<Tensor<B, 4>>,
    activations: Option<Tensor<B::InnerBackend, 4>>,
    gradients:   Option<Tensor<B::InnerBackend, 4>>,
}

impl<B: AutodiffBackend> ActivationCapture<B> {
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer:       layer.into(),
            attached:    false,
            leaf:        None,
            activations: None,
            gradients:   None,
        }
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Start observing. Detaches again when the returned guard drops.
    pub fn attach(&mut self) -> CaptureSession<'_, B> {
        self.attached = true;
        CaptureSession { capture: self }
    }

    /// Stop observing and discard anything recorded.
    pub fn remove(&mut self) {
        self.attached = false;
        self.clear();
    }

    /// Forget the previous pass. Called before every forward pass so
    /// nothing stale leaks from one class into the next.
    pub fn clear(&mut self) {
        self.leaf        = None;
        self.activations = None;
        self.gradients   = None;
    }

    /// Backward half of the capture: pull the gradient of the
    /// re-rooted layer output out of `grads`. A leaf outside the
    /// differentiated graph leaves `gradients()` empty.
    pub fn on_backward(&mut self, grads: &B::Gradients) {
        if !self.attached {
            return;
        }
        self.gradients = self.leaf.as_ref().and_then(|leaf| leaf.grad(grads));
    }

    pub fn activations(&self) -> Option<&Tensor<B::InnerBackend, 4>> {
        self.activations.as_ref()
    }

    pub fn gradients(&self) -> Option<&Tensor<B::InnerBackend, 4>> {
        self.gradients.as_ref()
    }
}

impl<B: AutodiffBackend> LayerObserver<B> for ActivationCapture<B> {
    fn on_forward(&mut self, layer: &str, output: Tensor<B, 4>) -> Tensor<B, 4> {
        if !self.attached || layer != self.layer {
            return output;
        }
        self.activations = Some(output.clone().inner());
        let leaf = output.detach().require_grad();
        self.leaf = Some(leaf.clone());
        leaf
    }
}

// ─── Session guard ────────────────────────────────────────────────────────────
/// Attached capture. Detaches on drop.
pub struct CaptureSession<'a, B: AutodiffBackend> {
    capture: &'a mut ActivationCapture<B>,
}

impl<B: AutodiffBackend> Deref for CaptureSession<'_, B> {
    type Target = ActivationCapture<B>;

    fn deref(&self) -> &Self::Target {
        self.capture
    }
}

impl<B: AutodiffBackend> DerefMut for CaptureSession<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.capture
    }
}

impl<B: AutodiffBackend> Drop for CaptureSession<'_, B> {
    fn drop(&mut self) {
        self.capture.remove();
    }
}

#[cfg(test)]
impl<B: AutodiffBackend> ActivationCapture<B> {
    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type B = Autodiff<NdArray>;

    fn ones() -> Tensor<B, 4> {
        Tensor::ones([1, 2, 3, 3], &Default::default())
    }

    #[test]
    fn test_detached_capture_is_a_pass_through() {
        let mut capture = ActivationCapture::<B>::new("denseblock4");
        let _ = capture.on_forward("denseblock4", ones());
        assert!(!capture.is_attached());
        assert!(capture.activations().is_none());
    }

    #[test]
    fn test_only_target_layer_is_recorded() {
        let mut capture = ActivationCapture::<B>::new("denseblock4");
        let mut session = capture.attach();
        let _ = session.on_forward("denseblock3", ones());
        assert!(session.activations().is_none());
        let _ = session.on_forward("denseblock4", ones());
        assert_eq!(session.activations().map(|a| a.dims()), Some([1, 2, 3, 3]));
    }

    #[test]
    fn test_gradient_flows_to_layer_output() {
        let mut capture = ActivationCapture::<B>::new("block");
        let mut session = capture.attach();
        let out   = session.on_forward("block", ones());
        let score = (out * 3.0).sum();
        let grads = score.backward();
        session.on_backward(&grads);

        let g: Vec<f32> = session.gradients()
            .map(|g| g.clone().into_data().iter::<f32>().collect())
            .unwrap_or_default();
        assert_eq!(g.len(), 18);
        assert!(g.iter().all(|v| (*v - 3.0).abs() < 1e-6));
    }

    #[test]
    fn test_disconnected_score_yields_no_gradient() {
        let mut capture = ActivationCapture::<B>::new("block");
        let mut session = capture.attach();
        let _     = session.on_forward("block", ones());
        let other = Tensor::<B, 1>::ones([4], &Default::default()).require_grad();
        let grads = other.sum().backward();
        session.on_backward(&grads);
        assert!(session.activations().is_some());
        assert!(session.gradients().is_none());
    }

    #[test]
    fn test_dropping_session_detaches_and_clears() {
        let mut capture = ActivationCapture::<B>::new("block");
        {
            let mut session = capture.attach();
            let _ = session.on_forward("block", ones());
            assert!(session.is_attached());
        }
        assert!(!capture.is_attached());
        assert!(capture.activations().is_none());
    }

    #[test]
    fn test_session_detaches_on_early_error() {
        fn failing(capture: &mut ActivationCapture<B>) -> Result<(), &'static str> {
            let mut session = capture.attach();
            let _ = session.on_forward("block", ones());
            Err("mid-loop failure")
        }
        let mut capture = ActivationCapture::<B>::new("block");
        assert!(failing(&mut capture).is_err());
        assert!(!capture.is_attached());
    }
}
