// ============================================================
// Layer 5 — Variational Quantum Layer
// ============================================================
// A 4-qubit variational circuit simulated exactly on the
// statevector (16 complex amplitudes per sample).
//
// Circuit, per sample x ∈ [-1, 1]^4 (wire 0 = most significant
// bit of the basis index):
//
//   feature map:   H on every wire
//                  RZ(x_i) on wire i
//                  CNOT(0,1) CNOT(1,2) CNOT(2,3)
//   per layer l:   RY(θ[l,i]) on wire i
//                  CNOT(0,1) CNOT(1,2) CNOT(2,3) CNOT(3,0)
//   readout:       ⟨Z_i⟩ for every wire → 4 values in [-1, 1]
//
// Simulation trick: after the Hadamards every amplitude is
// 1/4, and RZ only adds phases, so the post-RZ state is
//   a_b = ¼ · exp(i · Σ_i s_i(b) · x_i / 2),  s_i(b) = ±1
// which is a single matmul followed by cos/sin. Every later
// gate is a real matrix built on the device:
//   CNOT      rows of the identity, permuted
//   RY layer  Kronecker product of the 2×2 rotations
// so the real and imaginary parts evolve independently through
// plain matmuls and gradients reach both the inputs and θ.

use burn::{module::Param, nn::Initializer, prelude::*};

pub const NUM_QUBITS:    usize = 4;
pub const QUANTUM_DEPTH: usize = 2;

#[derive(Config, Debug)]
pub struct QuantumLayerConfig {
    #[config(default = "NUM_QUBITS")]
    pub n_qubits: usize,
    #[config(default = "QUANTUM_DEPTH")]
    pub depth: usize,
    /// Std-dev of the normal initialisation of the RY angles
    #[config(default = 0.1)]
    pub init_std: f64,
}

impl QuantumLayerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> QuantumLayer<B> {
        let params = Initializer::Normal { mean: 0.0, std: self.init_std }
            .init([self.depth, self.n_qubits], device);
        QuantumLayer { params, n_qubits: self.n_qubits }
    }
}

#[derive(Module, Debug)]
pub struct QuantumLayer<B: Backend> {
    /// RY rotation angles, [depth, n_qubits]
    pub params: Param<Tensor<B, 2>>,
    n_qubits:   usize,
}

impl<B: Backend> QuantumLayer<B> {
    /// inputs: [batch, n_qubits] → Pauli-Z expectations [batch, n_qubits]
    pub fn forward(&self, inputs: Tensor<B, 2>) -> Tensor<B, 2> {
        let n    = self.n_qubits;
        let dim  = 1usize << n;
        let bits = basis_bits::<B>(n, &inputs.device()).float();

        // ── Feature map: H + RZ collapse to a phase per basis state ──────────
        // bit 0 → -½, bit 1 → +½
        let phase = inputs.matmul(bits.clone().sub_scalar(0.5).transpose());
        let amp   = 1.0 / (dim as f32).sqrt();
        let mut re = phase.clone().cos() * amp;
        let mut im = phase.sin() * amp;

        // States are rows, so every gate U is applied as `state · Uᵀ`
        let chain = entangler::<B>(n, false, &re.device()).transpose();
        re = re.matmul(chain.clone());
        im = im.matmul(chain);

        // ── Variational layers ────────────────────────────────────────────────
        let theta = self.params.val();
        let [depth, _] = theta.dims();
        for l in 0..depth {
            let angles = theta.clone().slice([l..l + 1, 0..n]);
            let u      = variational_layer(angles, n).transpose();
            re = re.matmul(u.clone());
            im = im.matmul(u);
        }

        // ── Readout: |a_b|² weighted by the Z eigenvalue of each wire ────────
        let probs = re.clone() * re + im.clone() * im;
        probs.matmul(bits.mul_scalar(-2.0).add_scalar(1.0))
    }
}

// ─── Circuit matrices ─────────────────────────────────────────────────────────
// dim×dim, acting on column state vectors. Wire 0 is the most
// significant bit of the basis index.

/// [dim, n]: bit of each wire in each basis state.
fn basis_bits<B: Backend>(n: usize, device: &B::Device) -> Tensor<B, 2, Int> {
    let dim   = 1usize << n;
    let index = Tensor::<B, 1, Int>::arange(0..dim as i64, device).reshape([dim, 1]);
    let columns = (0..n)
        .map(|wire| index.clone().div_scalar(1i64 << (n - 1 - wire)).remainder_scalar(2))
        .collect();
    Tensor::cat(columns, 1)
}

fn cnot<B: Backend>(n: usize, control: usize, target: usize, device: &B::Device) -> Tensor<B, 2> {
    let dim  = 1usize << n;
    let bits = basis_bits::<B>(n, device);
    let wire = |w: usize| bits.clone().slice([0..dim, w..w + 1]).reshape([dim]);

    // Partner state: target bit flipped when the control bit is set
    let flip    = wire(target).mul_scalar(-2).add_scalar(1).mul_scalar(1i64 << (n - 1 - target));
    let partner = Tensor::<B, 1, Int>::arange(0..dim as i64, device) + wire(control) * flip;

    Tensor::eye(dim, device).select(0, partner)
}

/// CNOT ladder 0→1→…→n-1, optionally closed with CNOT(n-1, 0).
fn entangler<B: Backend>(n: usize, ring: bool, device: &B::Device) -> Tensor<B, 2> {
    let mut m = Tensor::eye(1usize << n, device);
    for wire in 0..n.saturating_sub(1) {
        m = cnot(n, wire, wire + 1, device).matmul(m);
    }
    if ring && n > 1 {
        m = cnot(n, n - 1, 0, device).matmul(m);
    }
    m
}

/// ⊗_i RY(θ_i), then the closed CNOT ring. `angles` is [1, n].
fn variational_layer<B: Backend>(angles: Tensor<B, 2>, n: usize) -> Tensor<B, 2> {
    let device = angles.device();
    let half   = angles.div_scalar(2.0);
    let (cos, sin) = (half.clone().cos(), half.sin());

    let ry = (0..n)
        .map(|w| {
            let c = cos.clone().slice([0..1, w..w + 1]);
            let s = sin.clone().slice([0..1, w..w + 1]);
            Tensor::cat(vec![
                Tensor::cat(vec![c.clone(), s.clone().neg()], 1),
                Tensor::cat(vec![s, c], 1),
            ], 0)
        })
        .fold(Tensor::ones([1, 1], &device), kron);

    entangler(n, true, &device).matmul(ry)
}

/// Kronecker product a ⊗ b.
fn kron<B: Backend>(a: Tensor<B, 2>, b: Tensor<B, 2>) -> Tensor<B, 2> {
    let [m, p] = a.dims();
    let [k, q] = b.dims();
    (a.reshape([m, 1, p, 1]) * b.reshape([1, k, 1, q])).reshape([m * k, p * q])
}
