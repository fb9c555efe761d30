use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{
            AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig,
            AvgPool2d, AvgPool2dConfig,
            MaxPool2d, MaxPool2dConfig,
        },
        Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::{relu, tanh},
};

use crate::ml::quantum::{QuantumLayer, QuantumLayerConfig};

const REDUCER_WIDTHS:    [usize; 2] = [256, 64];
const CLASSIFIER_WIDTHS: [usize; 2] = [512, 256];

// ─── Observation seam ─────────────────────────────────────────────────────────
/// Receives the output of every named feature stage during a forward pass.
///
/// The returned tensor replaces the stage output for the rest of the pass,
/// which lets an observer re-root the graph at that layer.
pub trait LayerObserver<B: Backend> {
    fn on_forward(&mut self, layer: &str, output: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// Observer that passes every stage through untouched.
pub struct NoObserver;

impl<B: Backend> LayerObserver<B> for NoObserver {
    fn on_forward(&mut self, _layer: &str, output: Tensor<B, 4>) -> Tensor<B, 4> {
        output
    }
}

/// Whether the classical features stay in the autodiff graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradMode {
    /// Features are detached before the head (normal inference).
    Frozen,
    /// Features stay connected so gradients reach the extractor.
    Tracked,
}

fn block_name(index: usize) -> String {
    format!("denseblock{}", index + 1)
}

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct HybridModelConfig {
    #[config(default = 4)]
    pub num_classes: usize,
    /// Square input resolution
    #[config(default = 224)]
    pub image_size: usize,
    #[config(default = 64)]
    pub init_features: usize,
    #[config(default = 32)]
    pub growth_rate: usize,
    /// Bottleneck width multiplier of each dense layer
    #[config(default = 4)]
    pub bn_size: usize,
    /// Dense layers per block (DenseNet-121 layout by default)
    #[config(default = "vec![6, 12, 24, 16]")]
    pub block_config: Vec<usize>,
    #[config(default = "QuantumLayerConfig::new()")]
    pub quantum: QuantumLayerConfig,
}

impl HybridModelConfig {
    /// Width of the pooled classical feature vector.
    pub fn num_features(&self) -> usize {
        let mut channels = self.init_features;
        for (i, layers) in self.block_config.iter().enumerate() {
            channels += layers * self.growth_rate;
            if i + 1 < self.block_config.len() {
                channels /= 2;
            }
        }
        channels
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> HybridModel<B> {
        let num_features = self.num_features();
        let n_qubits     = self.quantum.n_qubits;

        let feature_extractor = self.build_extractor(device);
        let feature_reducer = FeatureReducer {
            fc1: LinearConfig::new(num_features, REDUCER_WIDTHS[0]).init(device),
            fc2: LinearConfig::new(REDUCER_WIDTHS[0], REDUCER_WIDTHS[1]).init(device),
            fc3: LinearConfig::new(REDUCER_WIDTHS[1], n_qubits).init(device),
        };
        let quantum_layer = self.quantum.init(device);
        let classifier = ClassifierHead {
            fc1: LinearConfig::new(n_qubits + num_features, CLASSIFIER_WIDTHS[0]).init(device),
            fc2: LinearConfig::new(CLASSIFIER_WIDTHS[0], CLASSIFIER_WIDTHS[1]).init(device),
            fc3: LinearConfig::new(CLASSIFIER_WIDTHS[1], self.num_classes).init(device),
        };

        HybridModel {
            feature_extractor, feature_reducer, quantum_layer, classifier,
            image_size:  self.image_size,
            num_classes: self.num_classes,
            num_blocks:  self.block_config.len(),
        }
    }

    fn build_extractor<B: Backend>(&self, device: &B::Device) -> FeatureExtractor<B> {
        let stem = Conv2dConfig::new([3, self.init_features], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .init(device);
        let stem_pool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let mut channels    = self.init_features;
        let mut blocks      = Vec::with_capacity(self.block_config.len());
        let mut transitions = Vec::new();

        for (i, &num_layers) in self.block_config.iter().enumerate() {
            let layers = (0..num_layers)
                .map(|j| self.build_dense_layer(channels + j * self.growth_rate, device))
                .collect();
            blocks.push(DenseBlock { layers });
            channels += num_layers * self.growth_rate;

            if i + 1 < self.block_config.len() {
                transitions.push(Transition {
                    conv: Conv2dConfig::new([channels, channels / 2], [1, 1]).init(device),
                    pool: AvgPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
                });
                channels /= 2;
            }
        }

        FeatureExtractor {
            stem, stem_pool, blocks, transitions,
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
        }
    }

    fn build_dense_layer<B: Backend>(&self, in_channels: usize, device: &B::Device) -> DenseLayer<B> {
        let bottleneck = self.bn_size * self.growth_rate;
        DenseLayer {
            conv1: Conv2dConfig::new([in_channels, bottleneck], [1, 1]).init(device),
            conv2: Conv2dConfig::new([bottleneck, self.growth_rate], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
        }
    }
}

// ─── Classical feature extractor ──────────────────────────────────────────────
/// relu → 1×1 bottleneck → relu → 3×3 conv; output is appended to the input.
#[derive(Module, Debug)]
pub struct DenseLayer<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
}

impl<B: Backend> DenseLayer<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let y = self.conv1.forward(relu(x.clone()));
        let y = self.conv2.forward(relu(y));
        Tensor::cat(vec![x, y], 1)
    }
}

#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    pub layers: Vec<DenseLayer<B>>,
}

impl<B: Backend> DenseBlock<B> {
    pub fn forward(&self, mut x: Tensor<B, 4>) -> Tensor<B, 4> {
        for layer in &self.layers {
            x = layer.forward(x);
        }
        x
    }
}

/// Halves channels (1×1 conv) and spatial size (2×2 average pool).
#[derive(Module, Debug)]
pub struct Transition<B: Backend> {
    pub conv: Conv2d<B>,
    pub pool: AvgPool2d,
}

impl<B: Backend> Transition<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pool.forward(self.conv.forward(relu(x)))
    }
}

#[derive(Module, Debug)]
pub struct FeatureExtractor<B: Backend> {
    pub stem:        Conv2d<B>,
    pub stem_pool:   MaxPool2d,
    pub blocks:      Vec<DenseBlock<B>>,
    pub transitions: Vec<Transition<B>>,
    pub pool:        AdaptiveAvgPool2d,
}

impl<B: Backend> FeatureExtractor<B> {
    /// images: [batch, 3, H, W] → pooled features [batch, num_features].
    /// Every dense block output is reported to `observer` as `denseblock{n}`.
    pub fn forward_observed(
        &self,
        images:   Tensor<B, 4>,
        observer: &mut dyn LayerObserver<B>,
    ) -> Tensor<B, 2> {
        let mut x = self.stem_pool.forward(relu(self.stem.forward(images)));

        for (i, block) in self.blocks.iter().enumerate() {
            x = block.forward(x);
            x = observer.on_forward(&block_name(i), x);
            if let Some(transition) = self.transitions.get(i) {
                x = transition.forward(x);
            }
        }

        let pooled = self.pool.forward(relu(x));
        let [batch, channels, _, _] = pooled.dims();
        pooled.reshape([batch, channels])
    }
}

// ─── Head ─────────────────────────────────────────────────────────────────────
/// Compresses classical features to one angle per qubit, in [-1, 1].
#[derive(Module, Debug)]
pub struct FeatureReducer<B: Backend> {
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
    pub fc3: Linear<B>,
}

impl<B: Backend> FeatureReducer<B> {
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.fc1.forward(x));
        let x = relu(self.fc2.forward(x));
        tanh(self.fc3.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
    pub fc3: Linear<B>,
}

impl<B: Backend> ClassifierHead<B> {
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.fc1.forward(x));
        let x = relu(self.fc2.forward(x));
        self.fc3.forward(x)
    }
}

// ─── Hybrid model ─────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct HybridModel<B: Backend> {
    pub feature_extractor: FeatureExtractor<B>,
    pub feature_reducer:   FeatureReducer<B>,
    pub quantum_layer:     QuantumLayer<B>,
    pub classifier:        ClassifierHead<B>,
    pub image_size:        usize,
    pub num_classes:       usize,
    pub num_blocks:        usize,
}

impl<B: Backend> HybridModel<B> {
    /// images: [batch, 3, S, S] → logits [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward_with(images, GradMode::Frozen, &mut NoObserver)
    }

    /// Single entry point for both inference and explanation.
    ///
    /// The extractor always runs first; `mode` decides whether its output
    /// stays attached to the graph before the shared head runs, so both
    /// paths produce the same logits from the same module instances.
    pub fn forward_with(
        &self,
        images:   Tensor<B, 4>,
        mode:     GradMode,
        observer: &mut dyn LayerObserver<B>,
    ) -> Tensor<B, 2> {
        let features = self.feature_extractor.forward_observed(images, observer);
        let features = match mode {
            GradMode::Frozen  => features.detach(),
            GradMode::Tracked => features,
        };
        self.forward_head(features)
    }

    /// reducer → quantum layer → [quantum ‖ classical] → classifier
    pub fn forward_head(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let reduced  = self.feature_reducer.forward(features.clone());
        let quantum  = self.quantum_layer.forward(reduced);
        let combined = Tensor::cat(vec![quantum, features], 1);
        self.classifier.forward(combined)
    }

    /// Deepest dense block, the layer Grad-CAM observes.
    pub fn target_layer(&self) -> String {
        block_name(self.num_blocks.saturating_sub(1))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use burn::backend::{Autodiff, NdArray};

    /// Small network with the production topology, fast on CPU.
    pub(crate) fn tiny_config() -> HybridModelConfig {
        HybridModelConfig::new()
            .with_init_features(8)
            .with_growth_rate(4)
            .with_bn_size(2)
            .with_block_config(vec![2, 2])
    }

    struct ShapeRecorder(Vec<(String, [usize; 4])>);

    impl<B: Backend> LayerObserver<B> for ShapeRecorder {
        fn on_forward(&mut self, layer: &str, output: Tensor<B, 4>) -> Tensor<B, 4> {
            self.0.push((layer.to_string(), output.dims()));
            output
        }
    }

    #[test]
    fn test_densenet121_layout_gives_1024_features() {
        let cfg = HybridModelConfig::new();
        assert_eq!(cfg.num_features(), 1024);
        assert_eq!(block_name(cfg.block_config.len() - 1), "denseblock4");
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model: HybridModel<NdArray> = tiny_config().init(&device);
        let logits = model.forward(Tensor::zeros([1, 3, 224, 224], &device));
        assert_eq!(logits.dims(), [1, 4]);
        assert_eq!(model.target_layer(), "denseblock2");
    }

    #[test]
    fn test_observer_sees_every_block() {
        let device = Default::default();
        let cfg = tiny_config();
        let model: HybridModel<NdArray> = cfg.init(&device);
        let mut rec = ShapeRecorder(Vec::new());
        model.forward_with(Tensor::zeros([1, 3, 224, 224], &device), GradMode::Frozen, &mut rec);
        assert_eq!(rec.0, vec![
            ("denseblock1".to_string(), [1, 16, 56, 56]),
            ("denseblock2".to_string(), [1, 16, 28, 28]),
        ]);
        assert_eq!(cfg.num_features(), 16);
    }

    #[test]
    fn test_tracked_and_frozen_logits_match() {
        type B = Autodiff<NdArray>;
        let device = Default::default();
        let model: HybridModel<B> = tiny_config().init(&device);
        let input = Tensor::<B, 4>::random([1, 3, 224, 224], burn::tensor::Distribution::Default, &device);

        let frozen:  Vec<f32> = model.forward(input.clone()).into_data().iter::<f32>().collect();
        let tracked: Vec<f32> = model
            .forward_with(input.require_grad(), GradMode::Tracked, &mut NoObserver)
            .into_data().iter::<f32>().collect();

        for (a, b) in frozen.iter().zip(&tracked) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
    }
}
