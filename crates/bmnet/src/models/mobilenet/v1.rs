//! # MobileNet V1 - Depthwise-Separable Baseline
//!
//! A strided stem convolution, thirteen [`SeparableBlock`] stages, and
//! a pooled classification head. Every channel count is derived from
//! the stage table by the width multiplier.

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{ConvNormAct, ConvNormActConfig};
use crate::models::mobilenet::separable::{SeparableBlock, SeparableBlockConfig};
use crate::models::mobilenet::width::scale_channels;
use burn::nn::conv::Conv2dConfig;
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{BatchNormConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Stem output channels at multiplier 1.0.
pub const V1_STEM_CHANNELS: usize = 32;

/// Final feature width at multiplier 1.0.
pub const V1_FEATURE_CHANNELS: usize = 1024;

/// Per-stage ``(depthwise_channels, out_channels, stride)``, at multiplier 1.0.
///
/// Strides are copied into the blocks verbatim; both channel fields are
/// scaled by the width multiplier.
pub const V1_STAGES: [(usize, usize, usize); 13] = [
    (32, 64, 1),
    (64, 128, 2),
    (128, 128, 1),
    (128, 256, 2),
    (256, 256, 1),
    (256, 512, 2),
    (512, 512, 1),
    (512, 512, 1),
    (512, 512, 1),
    (512, 512, 1),
    (512, 512, 1),
    (512, 1024, 2),
    (1024, 1024, 1),
];

/// [`MobileNet`] Config.
#[derive(Config, Debug)]
pub struct MobileNetConfig {
    /// Number of classes for the output layer.
    pub num_classes: usize,

    /// The width multiplier controlling the model size.
    ///
    /// Conventional values are 1.0, 0.75, 0.5 and 0.25; any positive
    /// value that scales no stage to zero channels is accepted.
    #[config(default = "1.0")]
    pub multiplier: f64,

    /// Normalization strategy, applied at every conv stage.
    #[config(default = "NormalizationConfig::Batch(BatchNormConfig::new(0))")]
    pub normalization: NormalizationConfig,
}

impl MobileNetConfig {
    /// MobileNet with width multiplier 1.0.
    pub fn mobilenet1_0(num_classes: usize) -> Self {
        Self::new(num_classes)
    }

    /// MobileNet with width multiplier 0.75.
    pub fn mobilenet0_75(num_classes: usize) -> Self {
        Self::new(num_classes).with_multiplier(0.75)
    }

    /// MobileNet with width multiplier 0.5.
    pub fn mobilenet0_5(num_classes: usize) -> Self {
        Self::new(num_classes).with_multiplier(0.5)
    }

    /// MobileNet with width multiplier 0.25.
    pub fn mobilenet0_25(num_classes: usize) -> Self {
        Self::new(num_classes).with_multiplier(0.25)
    }

    /// The scaled stem output channels.
    pub fn stem_channels(&self) -> usize {
        scale_channels(V1_STEM_CHANNELS, self.multiplier)
    }

    /// The scaled final feature width feeding the classifier.
    pub fn feature_channels(&self) -> usize {
        scale_channels(V1_FEATURE_CHANNELS, self.multiplier)
    }

    /// Build the scaled per-stage block configs, in table order.
    pub fn blocks(&self) -> Vec<SeparableBlockConfig> {
        V1_STAGES
            .iter()
            .map(|&(dw_channels, out_channels, stride)| {
                SeparableBlockConfig::new(
                    scale_channels(dw_channels, self.multiplier),
                    scale_channels(out_channels, self.multiplier),
                )
                .with_stride(stride)
                .with_normalization(self.normalization.clone())
            })
            .collect()
    }

    /// Check if the config is valid.
    ///
    /// Rejects non-positive multipliers, degenerate zero-channel
    /// stages, and broken channel threading.
    ///
    /// # Returns
    ///
    /// A `Result<(), String>`
    pub fn try_validate(&self) -> Result<(), String> {
        if !(self.multiplier.is_finite() && self.multiplier > 0.0) {
            return Err(format!(
                "multiplier must be a positive finite number: {}",
                self.multiplier
            ));
        }
        if self.stem_channels() == 0 {
            return Err(format!(
                "multiplier {} scales the stem to zero channels",
                self.multiplier
            ));
        }

        let mut prev = self.stem_channels();
        for (idx, block) in self.blocks().iter().enumerate() {
            if block.in_channels == 0 || block.out_channels == 0 {
                return Err(format!(
                    "stage[{}] scales to zero channels at multiplier {}",
                    idx, self.multiplier
                ));
            }
            if block.in_channels != prev {
                return Err(format!(
                    "stage[{}].in_channels({}) != previous out_channels({})",
                    idx, block.in_channels, prev
                ));
            }
            prev = block.out_channels;
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        match self.try_validate() {
            Ok(_) => (),
            Err(err) => panic!("{}", err),
        }
    }

    /// Initialize a [`MobileNet`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> MobileNet<B> {
        self.expect_valid();

        // 3x3 stem, /2.
        let stem = ConvNormActConfig::new(
            Conv2dConfig::new([3, self.stem_channels()], [3, 3])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1)),
            self.normalization.clone(),
        )
        .with_act(Some(ActivationConfig::Relu));

        let blocks = self
            .blocks()
            .into_iter()
            .map(|block| block.init(device))
            .collect();

        // [B, C, H, W] -> [B, C, 1, 1]
        let avgpool = AdaptiveAvgPool2dConfig::new([1, 1]);

        let fc = LinearConfig::new(self.feature_channels(), self.num_classes);

        MobileNet {
            stem: stem.init(device),
            blocks,
            avgpool: avgpool.init(),
            fc: fc.init(device),
        }
    }
}

/// MobileNet V1 model.
#[derive(Module, Debug)]
pub struct MobileNet<B: Backend> {
    /// Strided stem conv/norm/relu block.
    pub stem: ConvNormAct<B>,

    /// Depthwise-separable feature stages, in table order.
    pub blocks: Vec<SeparableBlock<B>>,

    /// Global average pooling.
    pub avgpool: AdaptiveAvgPool2d,

    /// Classification head.
    pub fc: Linear<B>,
}

impl<B: Backend> MobileNet<B> {
    /// The number of classes of the output layer.
    pub fn num_classes(&self) -> usize {
        self.fc.weight.shape().dims[1]
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, 3, height, width]``.
    ///
    /// # Returns
    ///
    /// Class logits; a ``[batch, num_classes]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let x = self.stem.forward(input);

        let x = self.blocks.iter().fold(x, |x, block| block.forward(x));

        let x = self.avgpool.forward(x);
        // Reshape [B, C, 1, 1] -> [B, C]
        let x = x.flatten(1, 3);

        self.fc.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::blocks::cna::ConvNormActMeta;
    use crate::models::mobilenet::BlockMeta;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_v1_schedule() {
        let config = MobileNetConfig::new(1000);
        assert_eq!(config.stem_channels(), 32);
        assert_eq!(config.feature_channels(), 1024);

        let blocks = config.blocks();
        assert_eq!(blocks.len(), 13);
        assert_eq!(
            (blocks[0].in_channels, blocks[0].out_channels, blocks[0].stride),
            (32, 64, 1)
        );
        assert_eq!(
            (blocks[12].in_channels, blocks[12].out_channels, blocks[12].stride),
            (1024, 1024, 1)
        );

        // Stem stride 2, four strided stages: /32 overall.
        let stride: usize = 2 * blocks.iter().map(|b| b.stride).product::<usize>();
        assert_eq!(stride, 32);
    }

    #[test]
    fn test_v1_schedule_scaled() {
        let config = MobileNetConfig::mobilenet0_5(10);
        assert_eq!(config.stem_channels(), 16);
        assert_eq!(config.feature_channels(), 512);

        let blocks = config.blocks();
        assert_eq!(blocks[0].in_channels, 16);
        assert_eq!(blocks[0].out_channels, 32);
        // Strides are never scaled.
        assert_eq!(blocks[1].stride, 2);

        config.expect_valid();
    }

    #[test]
    #[should_panic(expected = "multiplier must be a positive finite number")]
    fn test_v1_rejects_zero_multiplier() {
        MobileNetConfig::new(10).with_multiplier(0.0).expect_valid();
    }

    #[test]
    #[should_panic(expected = "scales the stem to zero channels")]
    fn test_v1_rejects_degenerate_multiplier() {
        MobileNetConfig::new(10).with_multiplier(0.01).expect_valid();
    }

    #[test]
    fn test_v1_assembly() {
        let device = Default::default();

        let model: MobileNet<TestBackend> = MobileNetConfig::new(1000).init(&device);

        assert_eq!(model.blocks.len(), 13);
        assert_eq!(model.num_classes(), 1000);
        assert_eq!(model.stem.out_channels(), 32);
        assert_eq!(model.blocks[0].in_channels(), 32);
        assert_eq!(model.blocks[12].out_channels(), 1024);
        assert_eq!(model.stem.stride(), [2, 2]);
    }

    #[test]
    fn test_v1_forward_224() {
        let device = Default::default();

        let model: MobileNet<TestBackend> = MobileNetConfig::new(1000).init(&device);

        let input = Tensor::random([1, 3, 224, 224], Distribution::Default, &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "num_classes"],
            &output,
            &[("batch", 1), ("num_classes", 1000)],
        );
    }

    #[test]
    fn test_v1_forward_small_multiplier() {
        let device = Default::default();

        let model: MobileNet<TestBackend> =
            MobileNetConfig::mobilenet0_25(10).init(&device);

        let input = Tensor::random([2, 3, 32, 32], Distribution::Default, &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "num_classes"],
            &output,
            &[("batch", 2), ("num_classes", 10)],
        );
    }
}
