//! # `ConvNormAct` - conv/norm/activation block.
//!
//! A [`ConvNormAct`] module is:
//! * a grouped, bias-less [`Conv2d`] layer,
//! * a [`Normalization`] layer,
//! * an optional [`Activation`] layer.
//!
//! When the activation is ``None`` the stage is skipped entirely;
//! the block output is the normalization output. This is how the
//! linear bottleneck projection stays linear.

use crate::compat::activation_wrapper::{Activation, ActivationConfig};
use crate::compat::normalization_wrapper::{Normalization, NormalizationConfig};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::prelude::{Backend, Tensor};

/// [`ConvNormAct`] Meta API.
pub trait ConvNormActMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Number of convolution groups.
    fn groups(&self) -> usize;

    /// Get the stride.
    fn stride(&self) -> [usize; 2];
}

/// [`ConvNormAct`] Config.
///
/// Implements [`ConvNormActMeta`].
#[derive(Config, Debug)]
pub struct ConvNormActConfig {
    /// The [`Conv2d`] config.
    ///
    /// The convolution always runs without bias; the following norm
    /// layer carries the learnable shift.
    pub conv: Conv2dConfig,

    /// The [`Normalization`] config.
    ///
    /// The feature size of this config will be replaced with the
    /// convolution's output channels.
    pub norm: NormalizationConfig,

    /// The optional [`Activation`] config; ``None`` applies no nonlinearity.
    #[config(default = "Some(ActivationConfig::Relu)")]
    pub act: Option<ActivationConfig>,
}

impl ConvNormActMeta for ConvNormActConfig {
    fn in_channels(&self) -> usize {
        self.conv.channels[0]
    }

    fn out_channels(&self) -> usize {
        self.conv.channels[1]
    }

    fn groups(&self) -> usize {
        self.conv.groups
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }
}

impl ConvNormActConfig {
    /// Initialize a [`ConvNormAct`].
    ///
    /// Auto-matches the norm layer feature size to the conv layer's
    /// output channels.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ConvNormAct<B> {
        let cfg = self.match_norm_features();
        ConvNormAct {
            conv: cfg.conv.with_bias(false).init(device),
            norm: cfg.norm.init(device),
            act: cfg.act.map(|act| act.init(device)),
        }
    }

    /// Adjust the norm features to match the conv output size.
    ///
    /// [`ConvNormActConfig::init`] does this automatically.
    pub fn match_norm_features(self) -> Self {
        let features = self.out_channels();
        let norm = self.norm.with_num_features(features);
        Self { norm, ..self }
    }
}

/// Sequenced conv/norm/activation block.
///
/// Implements [`ConvNormActMeta`].
#[derive(Module, Debug)]
pub struct ConvNormAct<B: Backend> {
    /// Internal Conv2d layer.
    pub conv: Conv2d<B>,

    /// Internal Norm layer.
    pub norm: Normalization<B>,

    /// Optional activation layer.
    pub act: Option<Activation<B>>,
}

impl<B: Backend> ConvNormActMeta for ConvNormAct<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.shape().dims[1] * self.groups()
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn groups(&self) -> usize {
        self.conv.groups
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }
}

impl<B: Backend> ConvNormAct<B> {
    /// Forward Pass.
    ///
    /// Applies the conv/norm/act layers in sequence; the activation
    /// stage is skipped when no activation is configured.
    ///
    /// # Arguments
    ///
    /// - `input`: \
    ///   ``[batch, in_channels, in_height=out_height*stride, in_width=out_width*stride]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, out_height, out_width] = unpack_shape_contract!(
            [
                "batch",
                "in_channels",
                "in_height" = "out_height" * "height_stride",
                "in_width" = "out_width" * "width_stride"
            ],
            &input,
            &["batch", "out_height", "out_width"],
            &[
                ("in_channels", self.in_channels()),
                ("height_stride", self.stride()[0]),
                ("width_stride", self.stride()[1]),
            ]
        );

        let x = self.conv.forward(input);
        let x = self.norm.forward(x);
        let x = match &self.act {
            Some(act) => act.forward(x),
            None => x,
        };

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        x
    }
}
