//! Image preprocessing for the inference stages
//!
//! Turns BGR pixel buffers and crops into normalized planar tensors.

pub mod steps;
