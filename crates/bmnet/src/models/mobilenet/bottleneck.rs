//! # Linear Bottleneck Block
//!
//! [`LinearBottleneck`] is the inverted-residual unit of MobileNet V2:
//! an optional 1x1 expansion, a depthwise 3x3, and a 1x1 projection
//! back down. The expansion and depthwise stages use six-bounded
//! rectification; the projection is linear (no activation), and when
//! the block preserves shape (`stride == 1 && in_channels ==
//! out_channels`) the input is added back as a shortcut.
//!
//! [`LinearBottleneckConfig`] implements [`Config`], and provides
//! [`LinearBottleneckConfig::init`] to initialize a [`LinearBottleneck`].

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{ConvNormAct, ConvNormActConfig, ConvNormActMeta};
use crate::models::mobilenet::BlockMeta;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::Conv2dConfig;
use burn::nn::{BatchNormConfig, PaddingConfig2d};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`LinearBottleneck`] Config.
///
/// Implements [`BlockMeta`].
#[derive(Config, Debug)]
pub struct LinearBottleneckConfig {
    /// The number of input channels.
    pub in_channels: usize,

    /// The number of output channels.
    pub out_channels: usize,

    /// The expansion ratio `t`.
    ///
    /// The hidden width of the block is ``in_channels * t``. When
    /// ``t == 1`` the expansion stage is omitted entirely.
    #[config(default = 6)]
    pub expansion: usize,

    /// The stride of the depthwise convolution.
    #[config(default = 1)]
    pub stride: usize,

    /// Normalization strategy for all stages.
    ///
    /// The feature size of this config will be replaced per-stage.
    #[config(default = "NormalizationConfig::Batch(BatchNormConfig::new(0))")]
    pub normalization: NormalizationConfig,
}

impl BlockMeta for LinearBottleneckConfig {
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

impl LinearBottleneckConfig {
    /// The hidden (expanded) channel width, ``in_channels * t``.
    pub fn hidden_channels(&self) -> usize {
        self.in_channels * self.expansion
    }

    /// Whether the block carries an additive shortcut.
    ///
    /// True iff the block preserves both resolution and channel count.
    pub fn use_shortcut(&self) -> bool {
        self.stride == 1 && self.in_channels == self.out_channels
    }

    /// Initialize a [`LinearBottleneck`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> LinearBottleneck<B> {
        let hidden = self.hidden_channels();
        let use_shortcut = self.use_shortcut();

        let expand = (self.expansion != 1).then(|| {
            ConvNormActConfig::new(
                Conv2dConfig::new([self.in_channels, hidden], [1, 1]),
                self.normalization.clone(),
            )
            .with_act(Some(ActivationConfig::Relu6))
        });

        let depthwise = ConvNormActConfig::new(
            Conv2dConfig::new([hidden, hidden], [3, 3])
                .with_stride([self.stride, self.stride])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_groups(hidden),
            self.normalization.clone(),
        )
        .with_act(Some(ActivationConfig::Relu6));

        // The linear bottleneck: no nonlinearity on the projection,
        // even though the sibling stages clip with relu6.
        let project = ConvNormActConfig::new(
            Conv2dConfig::new([hidden, self.out_channels], [1, 1]),
            self.normalization,
        )
        .with_act(None);

        LinearBottleneck {
            use_shortcut,
            expand: expand.map(|cfg| cfg.init(device)),
            depthwise: depthwise.init(device),
            project: project.init(device),
        }
    }
}

/// Inverted residual block with linear bottleneck.
///
/// Implements [`BlockMeta`].
#[derive(Module, Debug)]
pub struct LinearBottleneck<B: Backend> {
    /// Whether the input is added back to the block output.
    ///
    /// Fixed at construction; never re-derived from tensor shapes.
    pub use_shortcut: bool,

    /// Optional 1x1 expansion conv/norm/relu6 stage; present iff `t != 1`.
    pub expand: Option<ConvNormAct<B>>,

    /// Depthwise 3x3 conv/norm/relu6 stage at the hidden width.
    pub depthwise: ConvNormAct<B>,

    /// Linear 1x1 projection conv/norm stage (no activation).
    pub project: ConvNormAct<B>,
}

impl<B: Backend> BlockMeta for LinearBottleneck<B> {
    fn in_channels(&self) -> usize {
        match &self.expand {
            Some(expand) => expand.in_channels(),
            None => self.depthwise.in_channels(),
        }
    }

    fn out_channels(&self) -> usize {
        self.project.out_channels()
    }

    fn stride(&self) -> usize {
        self.depthwise.stride()[0]
    }
}

impl<B: Backend> LinearBottleneck<B> {
    /// The expansion ratio `t`.
    pub fn expansion(&self) -> usize {
        self.depthwise.in_channels() / self.in_channels()
    }

    /// Forward Pass.
    ///
    /// Runs the stage pipeline; when [`LinearBottleneck::use_shortcut`]
    /// is set, the result is the elementwise sum of the pipeline output
    /// and the block input (shapes are guaranteed equal by the shortcut
    /// precondition).
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

        let identity = self.use_shortcut.then(|| input.clone());

        let x = match &self.expand {
            Some(expand) => expand.forward(input),
            None => input,
        };
        let x = self.depthwise.forward(x);
        let x = self.project.forward(x);

        let x = match identity {
            Some(identity) => x + identity,
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
            ],
        );

        x
    }
}
