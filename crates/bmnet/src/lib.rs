#![warn(missing_docs)]
//!# bmnet - Burn Mobile Networks
//!
//! ## Notable Components
//!
//! * [`compat`] - compat code, candidates for an upcoming release of ``burn``.
//!   * [`compat::activation_wrapper::Activation`] - activation layer abstraction wrapper.
//!   * [`compat::normalization_wrapper::Normalization`] - norm layer abstraction wrapper.
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::blocks`] - miscellaneous blocks.
//!     * [`layers::blocks::cna`] - ``Conv2d + Norm (+ Activation)`` block.
//! * [`models`] - complete model families.
//!   * [`models::mobilenet`] - The MobileNet Family.
//!     * [`models::mobilenet::v1`] - the depthwise-separable baseline.
//!     * [`models::mobilenet::v2`] - the inverted-residual variant, with pose heads.

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod compat;

pub mod layers;

pub mod models;
