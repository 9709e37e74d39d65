//! # Complete model families.

pub mod mobilenet;
