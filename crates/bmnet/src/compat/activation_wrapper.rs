//! # Activation Layer Wrapper
//!
//! [`Activation`] wraps the rectifier family used by the mobile
//! convolution blocks:
//! * [`Relu`] - plain rectification, ``max(x, 0)``.
//! * [`Relu6`] - six-bounded rectification, ``min(max(x, 0), 6)``.
//! * [`PRelu`] - parametric rectification.
//!
//! "No activation" is not a variant; layers that may skip activation
//! hold an ``Option<Activation<B>>`` and omit the stage entirely.

use burn::module::Module;
use burn::nn::{PRelu, PReluConfig, Relu};
use burn::prelude::{Backend, Config, Tensor};

/// Rectifier clipped to the range ``[0, 6]``.
///
/// ``relu6(x) = min(max(x, 0), 6)``; used by the inverted-residual
/// blocks. Not yet available in ``burn::nn``.
#[derive(Module, Clone, Debug, Default)]
pub struct Relu6;

impl Relu6 {
    /// Create the layer.
    pub fn new() -> Self {
        Self
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: any float tensor.
    ///
    /// # Returns
    ///
    /// The input, clipped elementwise to ``[0, 6]``.
    pub fn forward<B: Backend, const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        input.clamp(0.0, 6.0)
    }
}

/// [`Activation`] Configuration.
#[derive(Config, Debug)]
#[non_exhaustive]
pub enum ActivationConfig {
    /// [`Relu`] activation layer.
    Relu,

    /// [`Relu6`] activation layer.
    Relu6,

    /// [`PRelu`] activation layer.
    PRelu(PReluConfig),
}

impl From<PReluConfig> for ActivationConfig {
    fn from(config: PReluConfig) -> Self {
        Self::PRelu(config)
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self::Relu
    }
}

impl ActivationConfig {
    /// Initialize a wrapped activation layer.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Activation<B> {
        match self {
            ActivationConfig::Relu => Activation::Relu(Relu),
            ActivationConfig::Relu6 => Activation::Relu6(Relu6),
            ActivationConfig::PRelu(conf) => Activation::PRelu(conf.init(device)),
        }
    }
}

/// Activation Layer Wrapper.
#[derive(Module, Debug)]
#[non_exhaustive]
pub enum Activation<B: Backend> {
    /// [`Relu`] activation layer.
    Relu(Relu),

    /// [`Relu6`] activation layer.
    Relu6(Relu6),

    /// [`PRelu`] activation layer.
    PRelu(PRelu<B>),
}

impl<B: Backend> Activation<B> {
    /// Forward pass.
    #[tracing::instrument]
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        match self {
            Activation::Relu(layer) => layer.forward(input),
            Activation::Relu6(layer) => layer.forward(input),
            Activation::PRelu(layer) => layer.forward(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn make_input<B: Backend>(device: &B::Device) -> Tensor<B, 2> {
        Tensor::from_data([[-2.0, -0.5, 0.0], [0.5, 5.0, 9.0]], device)
    }

    #[test]
    fn test_relu() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);

        let layer: Activation<TestBackend> = ActivationConfig::Relu.init(&device);
        let output = layer.forward(input);

        let expected: Tensor<TestBackend, 2> =
            Tensor::from_data([[0.0, 0.0, 0.0], [0.5, 5.0, 9.0]], &device);
        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_relu6() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);

        let layer: Activation<TestBackend> = ActivationConfig::Relu6.init(&device);
        let output = layer.forward(input);

        // Negative inputs clip to 0; inputs above 6 clip to 6.
        let expected: Tensor<TestBackend, 2> =
            Tensor::from_data([[0.0, 0.0, 0.0], [0.5, 5.0, 6.0]], &device);
        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_relu6_matches_bounded_relu() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);

        let output = Relu6::new().forward(input.clone());
        let expected = Relu.forward(input).clamp_max(6.0);
        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_prelu() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);

        let inner_config = PReluConfig::new();
        let expected = inner_config.init(&device).forward(input.clone());

        let layer: Activation<TestBackend> =
            ActivationConfig::from(inner_config).init(&device);
        let output = layer.forward(input);
        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_default_config() {
        assert!(matches!(ActivationConfig::default(), ActivationConfig::Relu));
    }
}
