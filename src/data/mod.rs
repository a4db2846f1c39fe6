//! Built-in reference data and synthetic observations.

pub mod catalogue;
pub mod sample;

pub use catalogue::*;
pub use sample::*;
