//! Individual preprocessing steps

pub mod crop;
pub mod normalize;
pub mod resize;
