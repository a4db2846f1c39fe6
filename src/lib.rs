//! `wavecal` library crate.
//!
//! Wavelength calibration of arc-lamp spectra: a dispersion polynomial is
//! refined by correlating the observation against synthetic line spectra built
//! from a reference catalogue.
//!
//! The binary (`wavecal`) is a thin wrapper around this library so that:
//!
//! - the engine (`math`, `models`, `fit`) is testable without spawning processes
//! - front-ends stay small (`cli`, `app`, `report`, `plot`, `debug`)

pub mod app;
pub mod cli;
pub mod data;
pub mod debug;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
