//! Dispersion search.
//!
//! Responsibilities:
//!
//! - correlate an observed spectrum against synthetic line spectra
//! - find the best integer shifts of a dispersion guess
//! - refine the dispersion continuously from several starts (multi-start driver)
//! - or, alternatively, search a grid of anchor-point perturbations (parallel)

pub mod continuous;
pub mod correlation;
pub mod diagnostics;
pub mod grid;
pub mod multistart;
pub mod shift;
pub mod simplex;

pub use continuous::*;
pub use correlation::*;
pub use diagnostics::*;
pub use grid::*;
pub use multistart::*;
pub use shift::*;
pub use simplex::*;
