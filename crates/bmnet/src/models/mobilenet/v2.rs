//! # MobileNet V2 - Inverted-Residual Variant, with Pose Heads
//!
//! A stride-1 stem (the pose variant keeps full resolution at the stem),
//! seventeen [`LinearBottleneck`] stages, a 1x1 expansion to the final
//! feature width, and a pooled head: 198 binned-classification logits
//! (3 axes x 66 bins), plus an optional 3-way continuous-angle
//! regression read from the bin logits.

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{ConvNormAct, ConvNormActConfig};
use crate::models::mobilenet::bottleneck::{LinearBottleneck, LinearBottleneckConfig};
use crate::models::mobilenet::width::scale_channels;
use burn::nn::conv::Conv2dConfig;
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{BatchNormConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Pose axes (yaw, pitch, roll).
pub const POSE_AXES: usize = 3;

/// Classification bins per pose axis.
pub const BINS_PER_AXIS: usize = 66;

/// Width of the binned-classification head: 3 axes x 66 bins.
pub const BIN_HEAD_WIDTH: usize = POSE_AXES * BINS_PER_AXIS;

/// Stem output channels at multiplier 1.0.
pub const V2_STEM_CHANNELS: usize = 32;

/// Final feature width at multiplier 1.0.
///
/// Only scaled *up*: multipliers above 1.0 widen the head conv, while
/// multipliers at or below 1.0 keep the full 1280 features.
pub const V2_HEAD_CHANNELS: usize = 1280;

/// Per-stage ``(in_channels, out_channels, expansion, stride)``, at
/// multiplier 1.0.
///
/// Expansion ratios and strides are copied into the blocks verbatim;
/// both channel fields are scaled by the width multiplier.
pub const V2_STAGES: [(usize, usize, usize, usize); 17] = [
    (32, 16, 1, 1),
    (16, 24, 6, 2),
    (24, 24, 6, 1),
    (24, 32, 6, 2),
    (32, 32, 6, 1),
    (32, 32, 6, 1),
    (32, 64, 6, 2),
    (64, 64, 6, 1),
    (64, 64, 6, 1),
    (64, 64, 6, 1),
    (64, 96, 6, 1),
    (96, 96, 6, 1),
    (96, 96, 6, 1),
    (96, 160, 6, 2),
    (160, 160, 6, 1),
    (160, 160, 6, 1),
    (160, 320, 6, 1),
];

/// [`MobileNetV2`] Config.
#[derive(Config, Debug)]
pub struct MobileNetV2Config {
    /// The width multiplier controlling the model size.
    ///
    /// Conventional values are 1.0, 0.75, 0.5 and 0.25; any positive
    /// value that scales no stage to zero channels is accepted.
    #[config(default = "1.0")]
    pub multiplier: f64,

    /// Whether to attach the continuous-angle regression head.
    ///
    /// This flag fixes the [`PoseOutput`] variant produced by
    /// [`MobileNetV2::forward`]; callers branch on the same flag.
    #[config(default = true)]
    pub angle_head: bool,

    /// Normalization strategy, applied at every conv stage.
    #[config(default = "NormalizationConfig::Batch(BatchNormConfig::new(0))")]
    pub normalization: NormalizationConfig,
}

impl MobileNetV2Config {
    /// MobileNet V2 with width multiplier 1.0.
    pub fn mobilenet_v2_1_0() -> Self {
        Self::new()
    }

    /// MobileNet V2 with width multiplier 0.75.
    pub fn mobilenet_v2_0_75() -> Self {
        Self::new().with_multiplier(0.75)
    }

    /// MobileNet V2 with width multiplier 0.5.
    pub fn mobilenet_v2_0_5() -> Self {
        Self::new().with_multiplier(0.5)
    }

    /// MobileNet V2 with width multiplier 0.25.
    pub fn mobilenet_v2_0_25() -> Self {
        Self::new().with_multiplier(0.25)
    }

    /// The scaled stem output channels.
    pub fn stem_channels(&self) -> usize {
        scale_channels(V2_STEM_CHANNELS, self.multiplier)
    }

    /// The final feature width feeding the heads.
    ///
    /// Multipliers above 1.0 widen the head by the literal product
    /// ``int(1280 * multiplier)``; at or below 1.0 the width is pinned
    /// to 1280 and is *not* routed through the generic scaler.
    pub fn last_channels(&self) -> usize {
        if self.multiplier > 1.0 {
            (V2_HEAD_CHANNELS as f64 * self.multiplier) as usize
        } else {
            V2_HEAD_CHANNELS
        }
    }

    /// Build the scaled per-stage block configs, in table order.
    pub fn blocks(&self) -> Vec<LinearBottleneckConfig> {
        V2_STAGES
            .iter()
            .map(|&(in_channels, out_channels, expansion, stride)| {
                LinearBottleneckConfig::new(
                    scale_channels(in_channels, self.multiplier),
                    scale_channels(out_channels, self.multiplier),
                )
                .with_expansion(expansion)
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

    /// Initialize a [`MobileNetV2`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> MobileNetV2<B> {
        self.expect_valid();

        // 3x3 stem; stride 1, full resolution.
        let stem = ConvNormActConfig::new(
            Conv2dConfig::new([3, self.stem_channels()], [3, 3])
                .with_stride([1, 1])
                .with_padding(PaddingConfig2d::Explicit(1, 1)),
            self.normalization.clone(),
        )
        .with_act(Some(ActivationConfig::Relu6));

        let blocks: Vec<LinearBottleneck<B>> = self
            .blocks()
            .into_iter()
            .map(|block| block.init(device))
            .collect();

        // 1x1 expansion to the final feature width.
        let feature_channels = scale_channels(
            V2_STAGES[V2_STAGES.len() - 1].1,
            self.multiplier,
        );
        let head = ConvNormActConfig::new(
            Conv2dConfig::new([feature_channels, self.last_channels()], [1, 1]),
            self.normalization.clone(),
        )
        .with_act(Some(ActivationConfig::Relu6));

        // [B, C, H, W] -> [B, C, 1, 1]
        let avgpool = AdaptiveAvgPool2dConfig::new([1, 1]);

        let fc_bins = LinearConfig::new(self.last_channels(), BIN_HEAD_WIDTH);

        // The angle head reads the bin logits, not the pooled features.
        let fc_angles = self
            .angle_head
            .then(|| LinearConfig::new(BIN_HEAD_WIDTH, POSE_AXES));

        MobileNetV2 {
            stem: stem.init(device),
            blocks,
            head: head.init(device),
            avgpool: avgpool.init(),
            fc_bins: fc_bins.init(device),
            fc_angles: fc_angles.map(|fc| fc.init(device)),
        }
    }
}

/// Output of [`MobileNetV2::forward`].
///
/// The variant is fixed at construction by
/// [`MobileNetV2Config::angle_head`]; callers branch on that same flag
/// rather than inferring the shape from the returned value.
#[derive(Debug, Clone)]
pub enum PoseOutput<B: Backend> {
    /// Binned-classification logits: ``[batch, 198]``.
    Bins(Tensor<B, 2>),

    /// Binned logits plus continuous angles.
    BinsAndAngles {
        /// Binned-classification logits: ``[batch, 198]``.
        bins: Tensor<B, 2>,

        /// Continuous yaw/pitch/roll estimates: ``[batch, 3]``.
        angles: Tensor<B, 2>,
    },
}

impl<B: Backend> PoseOutput<B> {
    /// The binned-classification logits.
    pub fn bins(&self) -> &Tensor<B, 2> {
        match self {
            PoseOutput::Bins(bins) => bins,
            PoseOutput::BinsAndAngles { bins, .. } => bins,
        }
    }

    /// The continuous-angle output, when the angle head is attached.
    pub fn angles(&self) -> Option<&Tensor<B, 2>> {
        match self {
            PoseOutput::Bins(_) => None,
            PoseOutput::BinsAndAngles { angles, .. } => Some(angles),
        }
    }
}

/// MobileNet V2 pose model.
#[derive(Module, Debug)]
pub struct MobileNetV2<B: Backend> {
    /// Stride-1 stem conv/norm/relu6 block.
    pub stem: ConvNormAct<B>,

    /// Inverted-residual feature stages, in table order.
    pub blocks: Vec<LinearBottleneck<B>>,

    /// 1x1 expansion conv/norm/relu6 to the final feature width.
    pub head: ConvNormAct<B>,

    /// Global average pooling.
    pub avgpool: AdaptiveAvgPool2d,

    /// Binned-classification head.
    pub fc_bins: Linear<B>,

    /// Optional continuous-angle head, reading the bin logits.
    pub fc_angles: Option<Linear<B>>,
}

impl<B: Backend> MobileNetV2<B> {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, 3, height, width]``.
    ///
    /// # Returns
    ///
    /// [`PoseOutput::BinsAndAngles`] when the angle head is attached,
    /// [`PoseOutput::Bins`] otherwise.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> PoseOutput<B> {
        let x = self.stem.forward(input);

        let x = self.blocks.iter().fold(x, |x, block| block.forward(x));

        let x = self.head.forward(x);
        let x = self.avgpool.forward(x);
        // Reshape [B, C, 1, 1] -> [B, C]
        let x: Tensor<B, 2> = x.flatten(1, 3);

        let bins = self.fc_bins.forward(x);

        match &self.fc_angles {
            Some(fc) => PoseOutput::BinsAndAngles {
                angles: fc.forward(bins.clone()),
                bins,
            },
            None => PoseOutput::Bins(bins),
        }
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
    fn test_v2_schedule() {
        let config = MobileNetV2Config::new();
        assert_eq!(config.stem_channels(), 32);

        let blocks = config.blocks();
        assert_eq!(blocks.len(), 17);

        // Only the first stage runs unexpanded.
        assert_eq!(blocks[0].expansion, 1);
        assert!(blocks[1..].iter().all(|b| b.expansion == 6));

        assert_eq!(
            (blocks[0].in_channels, blocks[0].out_channels, blocks[0].stride),
            (32, 16, 1)
        );
        assert_eq!(
            (blocks[16].in_channels, blocks[16].out_channels, blocks[16].stride),
            (160, 320, 1)
        );

        // Stride-1 stem, five strided stages: /32 overall.
        let stride: usize = blocks.iter().map(|b| b.stride).product();
        assert_eq!(stride, 32);
    }

    #[test]
    fn test_v2_shortcut_pattern() {
        let config = MobileNetV2Config::new();

        let mut shortcuts = 0;
        for block in config.blocks() {
            assert_eq!(
                block.use_shortcut(),
                block.stride == 1 && block.in_channels == block.out_channels,
            );
            if block.use_shortcut() {
                shortcuts += 1;
            }
        }
        assert_eq!(shortcuts, 10);
    }

    #[test]
    fn test_v2_last_channels() {
        // At or below 1.0: pinned to 1280.
        assert_eq!(MobileNetV2Config::new().last_channels(), 1280);
        assert_eq!(MobileNetV2Config::mobilenet_v2_0_75().last_channels(), 1280);
        assert_eq!(MobileNetV2Config::mobilenet_v2_0_25().last_channels(), 1280);

        // Above 1.0: the literal-multiply path, not the generic scaler.
        assert_eq!(
            MobileNetV2Config::new().with_multiplier(1.5).last_channels(),
            1920
        );
        assert_eq!(
            MobileNetV2Config::new().with_multiplier(1.4).last_channels(),
            1791
        );
    }

    #[test]
    #[should_panic(expected = "multiplier must be a positive finite number")]
    fn test_v2_rejects_negative_multiplier() {
        MobileNetV2Config::new().with_multiplier(-1.0).expect_valid();
    }

    #[test]
    #[should_panic(expected = "scales to zero channels")]
    fn test_v2_rejects_degenerate_multiplier() {
        // scale(32, 0.04) = 1, but scale(16, 0.04) = 0.
        MobileNetV2Config::new().with_multiplier(0.04).expect_valid();
    }

    #[test]
    fn test_v2_assembly() {
        let device = Default::default();

        let model: MobileNetV2<TestBackend> = MobileNetV2Config::new().init(&device);

        assert_eq!(model.blocks.len(), 17);
        assert_eq!(model.stem.out_channels(), 32);
        assert_eq!(model.stem.stride(), [1, 1]);

        // First stage is the unexpanded bottleneck.
        assert!(model.blocks[0].expand.is_none());
        assert!(model.blocks[1].expand.is_some());

        assert_eq!(model.blocks[16].out_channels(), 320);
        assert_eq!(model.head.in_channels(), 320);
        assert_eq!(model.head.out_channels(), 1280);

        assert_eq!(model.fc_bins.weight.shape().dims, [1280, BIN_HEAD_WIDTH]);
        let fc_angles = model.fc_angles.as_ref().unwrap();
        assert_eq!(fc_angles.weight.shape().dims, [BIN_HEAD_WIDTH, POSE_AXES]);
    }

    #[test]
    fn test_v2_forward_bins_only() {
        let device = Default::default();

        let model: MobileNetV2<TestBackend> = MobileNetV2Config::new()
            .with_angle_head(false)
            .init(&device);
        assert!(model.fc_angles.is_none());

        let input = Tensor::random([1, 3, 64, 64], Distribution::Default, &device);
        let output = model.forward(input);

        assert!(matches!(output, PoseOutput::Bins(_)));
        assert!(output.angles().is_none());
        assert_shape_contract!(
            ["batch", "bins"],
            output.bins(),
            &[("batch", 1), ("bins", BIN_HEAD_WIDTH)],
        );
    }

    #[test]
    fn test_v2_forward_with_angles_224() {
        let device = Default::default();

        let model: MobileNetV2<TestBackend> = MobileNetV2Config::new().init(&device);

        let input = Tensor::random([1, 3, 224, 224], Distribution::Default, &device);
        let output = model.forward(input);

        assert!(matches!(output, PoseOutput::BinsAndAngles { .. }));
        assert_shape_contract!(
            ["batch", "bins"],
            output.bins(),
            &[("batch", 1), ("bins", BIN_HEAD_WIDTH)],
        );
        assert_shape_contract!(
            ["batch", "axes"],
            output.angles().unwrap(),
            &[("batch", 1), ("axes", POSE_AXES)],
        );
    }

    #[test]
    fn test_v2_angle_head_reads_bin_logits() {
        let device = Default::default();

        let model: MobileNetV2<TestBackend> = MobileNetV2Config::mobilenet_v2_0_25()
            .init(&device);

        let input = Tensor::random([2, 3, 32, 32], Distribution::Default, &device);
        let output = model.forward(input);

        let expected = model
            .fc_angles
            .as_ref()
            .unwrap()
            .forward(output.bins().clone());
        output
            .angles()
            .unwrap()
            .to_data()
            .assert_eq(&expected.to_data(), true);
    }
}
