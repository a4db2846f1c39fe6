//! Command-line parsing for the wavelength calibrator.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! calibration engine. `app` turns the parsed arguments into a
//! `CalibrationConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{OptimizerKind, Strategy};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "wavecal", version, about = "Correlation-driven wavelength calibration of arc spectra")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Calibrate an observed spectrum against a line catalogue.
    Calibrate(CalibrateArgs),
    /// Calibrate a synthetic arc with a known dispersion and report the recovery error.
    Demo(DemoArgs),
    /// Plot a previously exported solution JSON.
    Plot(PlotArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct CalibrateArgs {
    /// Observed spectrum CSV (`flux` or `pixel,flux`).
    #[arg(short = 's', long, value_name = "CSV")]
    pub spectrum: PathBuf,

    /// Line catalogue CSV (`wavelength,intensity`); the built-in Ne/Ar list when omitted.
    #[arg(short = 'c', long, value_name = "CSV")]
    pub catalogue: Option<PathBuf>,

    /// Guess dispersion coefficients `c0,c1,...` (wavelength = Σ c_k x^k, x in pixels from 0).
    #[arg(short = 'g', long, value_delimiter = ',', num_args = 1.., required = true, allow_negative_numbers = true)]
    pub guess: Vec<f64>,

    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct DemoArgs {
    /// Detector length of the synthetic arc.
    #[arg(long, default_value_t = 2048)]
    pub pixels: usize,

    /// Offset of the guess from the true dispersion, in pixels at the detector centre.
    #[arg(long, default_value_t = 3.5, allow_negative_numbers = true)]
    pub offset_px: f64,

    /// Standard deviation of the Gaussian noise added to the arc.
    #[arg(long, default_value_t = 2.0)]
    pub noise: f64,

    /// Constant continuum level of the arc.
    #[arg(long, default_value_t = 20.0)]
    pub continuum: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Engine, output and export options shared by `calibrate` and `demo`.
#[derive(Debug, Args, Clone)]
pub struct EngineArgs {
    /// Search strategy.
    #[arg(long, value_enum, default_value_t = Strategy::Auto)]
    pub strategy: Strategy,

    /// Slit image width (pixels).
    #[arg(long, default_value_t = 2.0)]
    pub slit: f64,

    /// Instrumental FWHM (pixels).
    #[arg(long, default_value_t = 2.0)]
    pub fwhm: f64,

    /// Profile truncation radius (pixels); `0.5·slit + 5σ` when omitted.
    #[arg(long)]
    pub truncation: Option<f64>,

    /// Deposit lines in two pixels and convolve once (faster, slightly less accurate).
    #[arg(long)]
    pub fast: bool,

    /// Compress line intensities with ln(1 + I).
    #[arg(long)]
    pub log: bool,

    /// Highest dispersion coefficient the continuous search may move.
    #[arg(long, default_value_t = 1)]
    pub max_degree_freedom: usize,

    /// Convergence tolerance of the continuous search (pixels).
    #[arg(long, default_value_t = 0.1)]
    pub tolerance: f64,

    /// Initial simplex step (pixels).
    #[arg(long, default_value_t = 1.0)]
    pub step: f64,

    /// Integer shifts scanned on each side of a dispersion.
    #[arg(long, default_value_t = 10)]
    pub half_window: usize,

    /// Iteration budget of one optimiser run.
    #[arg(long, default_value_t = 400)]
    pub max_iterations: usize,

    /// Continuous optimiser backing the search.
    #[arg(long, value_enum, default_value_t = OptimizerKind::NelderMead)]
    pub optimizer: OptimizerKind,

    /// Shift maxima used as starting points.
    #[arg(long, default_value_t = 3)]
    pub n_maxima: usize,

    /// Stop refining once a run used more lines than this.
    #[arg(long, default_value_t = 200)]
    pub line_limit: usize,

    /// Tolerance escalations allowed per start.
    #[arg(long, default_value_t = 3)]
    pub max_fail: usize,

    /// Restarts from a better shift allowed per start.
    #[arg(long, default_value_t = 3)]
    pub max_continuations: usize,

    /// Run the starts in parallel.
    #[arg(long)]
    pub parallel: bool,

    /// Degree of the grid-search dispersion; the guess degree (at least 1) when omitted.
    #[arg(long)]
    pub grid_degree: Option<usize>,

    /// Wavelength search range per anchor (one value, or one per anchor); ±10 px when omitted.
    #[arg(long, value_delimiter = ',')]
    pub grid_range: Vec<f64>,

    /// Samples per anchor.
    #[arg(long, default_value_t = 21)]
    pub grid_samples: usize,

    /// Render ASCII plots in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plots.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export the per-pixel calibration table to CSV.
    #[arg(long = "export-table", value_name = "CSV")]
    pub export_table: Option<PathBuf>,

    /// Export the dispersion solution to JSON.
    #[arg(long = "export-solution", value_name = "JSON")]
    pub export_solution: Option<PathBuf>,

    /// Write a Markdown debug bundle to `debug/`.
    #[arg(long)]
    pub debug: bool,
}

/// Options for plotting a saved solution.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Solution JSON produced by `wavecal calibrate --export-solution`.
    #[arg(long, value_name = "JSON")]
    pub solution: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}
