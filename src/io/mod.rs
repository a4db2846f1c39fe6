//! Input/output helpers.
//!
//! - CSV ingest of spectra and line catalogues (`ingest`)
//! - per-pixel calibration table export (`export`)
//! - dispersion solution JSON read/write (`solution`)

pub mod export;
pub mod ingest;
pub mod solution;

pub use export::*;
pub use ingest::*;
pub use solution::*;
