//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the reference line list (`LineCatalogue`) and line-spread parameters (`ModelParams`)
//! - search options for the shift scan, the continuous optimiser and the grid search
//! - calibration outputs (`Calibration`, `ShiftCandidate`, `SolutionFile`)

pub mod types;

pub use types::*;
