//! Core type definitions
//!
//! - [`Laterality`]: Breast laterality of an image
//! - [`PreprocessConfig`]: Parameters of the image normalization transform

mod config;
mod enums;

pub use config::PreprocessConfig;
pub use enums::Laterality;
