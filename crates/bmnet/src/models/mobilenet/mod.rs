//! # The MobileNet Family
//!
//! * [`v1`] - the depthwise-separable baseline.
//! * [`v2`] - the inverted-residual variant, with pose heads.
//!
//! Both variants derive their per-layer channel counts from a continuous
//! width multiplier (see [`width`]), and assemble a fixed per-variant
//! stage table into a sequence of blocks.

pub mod bottleneck;
pub mod separable;
pub mod v1;
pub mod v2;
pub mod width;

use bimm_contracts::unpack_shape_contract;

/// Common meta API for mobile convolution blocks.
pub trait BlockMeta {
    /// The number of input channels.
    fn in_channels(&self) -> usize;

    /// The number of output channels.
    fn out_channels(&self) -> usize;

    /// The stride of the block's spatial convolution.
    fn stride(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    ///
    /// The input must be a multiple of the stride.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height=out_height*stride, in_width=out_width*stride]``.
    ///
    /// # Returns
    ///
    /// ``[out_height, out_width]``
    ///
    /// # Panics
    ///
    /// If the input resolution is not a multiple of the stride.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        unpack_shape_contract!(
            [
                "in_height" = "out_height" * "stride",
                "in_width" = "out_width" * "stride"
            ],
            &input_resolution,
            &["out_height", "out_width"],
            &[("stride", self.stride())]
        )
    }
}
