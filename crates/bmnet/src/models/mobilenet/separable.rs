//! # Depthwise-Separable Block
//!
//! [`SeparableBlock`] is the core unit of the baseline MobileNet:
//! a depthwise 3x3 convolution (one filter per channel) followed by a
//! pointwise 1x1 convolution mixing channels, each with norm and plain
//! rectification. No shortcut.
//!
//! [`SeparableBlockConfig`] implements [`Config`], and provides
//! [`SeparableBlockConfig::init`] to initialize a [`SeparableBlock`].

use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{ConvNormAct, ConvNormActConfig, ConvNormActMeta};
use crate::models::mobilenet::BlockMeta;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::Conv2dConfig;
use burn::nn::{BatchNormConfig, PaddingConfig2d};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`SeparableBlock`] Config.
///
/// Implements [`BlockMeta`].
#[derive(Config, Debug)]
pub struct SeparableBlockConfig {
    /// The number of input channels.
    pub in_channels: usize,

    /// The number of output channels.
    pub out_channels: usize,

    /// The stride of the depthwise convolution.
    #[config(default = 1)]
    pub stride: usize,

    /// Normalization strategy for both stages.
    ///
    /// The feature size of this config will be replaced per-stage.
    #[config(default = "NormalizationConfig::Batch(BatchNormConfig::new(0))")]
    pub normalization: NormalizationConfig,
}

impl BlockMeta for SeparableBlockConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl SeparableBlockConfig {
    /// Initialize a [`SeparableBlock`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> SeparableBlock<B> {
        let depthwise = ConvNormActConfig::new(
            Conv2dConfig::new([self.in_channels, self.in_channels], [3, 3])
                .with_stride([self.stride, self.stride])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_groups(self.in_channels),
            self.normalization.clone(),
        );

        let pointwise = ConvNormActConfig::new(
            Conv2dConfig::new([self.in_channels, self.out_channels], [1, 1]),
            self.normalization,
        );

        SeparableBlock {
            depthwise: depthwise.init(device),
            pointwise: pointwise.init(device),
        }
    }
}

/// Depthwise-separable convolution block.
///
/// Implements [`BlockMeta`].
#[derive(Module, Debug)]
pub struct SeparableBlock<B: Backend> {
    /// Depthwise 3x3 conv/norm/relu stage.
    pub depthwise: ConvNormAct<B>,

    /// Pointwise 1x1 conv/norm/relu stage.
    pub pointwise: ConvNormAct<B>,
}

impl<B: Backend> BlockMeta for SeparableBlock<B> {
    fn in_channels(&self) -> usize {
        self.depthwise.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.pointwise.out_channels()
    }

    fn stride(&self) -> usize {
        self.depthwise.stride()[0]
    }
}

impl<B: Backend> SeparableBlock<B> {
    /// Forward Pass.
    ///
    /// A strict pipeline through the depthwise and pointwise stages.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height=out_height*stride, in_width=out_width*stride]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_channels, out_height, out_width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, out_height, out_width] = unpack_shape_contract!(
            [
                "batch",
                "in_channels",
                "in_height" = "out_height" * "stride",
                "in_width" = "out_width" * "stride"
            ],
            &input,
            &["batch", "out_height", "out_width"],
            &[("in_channels", self.in_channels()), ("stride", self.stride())],
        );

        let x = self.depthwise.forward(input);
        let x = self.pointwise.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", out_height),
                ("out_width", out_width)
            ],
        );

        x
    }
}
