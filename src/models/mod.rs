//! Line-profile model.
//!
//! Turns a line catalogue and a dispersion hypothesis into a synthetic spectrum
//! that can be correlated against an observation.

pub mod dispersion;
pub mod line_spectrum;

pub use dispersion::*;
pub use line_spectrum::*;
