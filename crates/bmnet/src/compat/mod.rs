//! # Compat Code
//!
//! Wrappers and small layers that `burn` does not (yet) ship;
//! candidates for upstreaming.

pub mod activation_wrapper;
pub mod normalization_wrapper;
