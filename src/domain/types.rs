//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during calibration
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{CalibError, CalibResult};
use crate::math::{Polynomial, default_truncation};

/// One reference line: wavelength and relative intensity.
///
/// An intensity `<= 0` marks a line of unknown or blended strength; it is kept in
/// the catalogue but never deposited into a model spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatalogueLine {
    pub wavelength: f64,
    pub intensity: f64,
}

/// Reference lines ordered by strictly increasing wavelength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCatalogue {
    lines: Vec<CatalogueLine>,
}

impl LineCatalogue {
    /// Validate ordering and finiteness.
    pub fn new(lines: Vec<CatalogueLine>) -> CalibResult<Self> {
        if let Some(bad) = lines
            .iter()
            .position(|l| !(l.wavelength.is_finite() && l.intensity.is_finite()))
        {
            return Err(CalibError::IllegalInput(format!(
                "catalogue line {bad} has a non-finite wavelength or intensity"
            )));
        }
        if let Some(i) = lines.windows(2).position(|w| w[1].wavelength <= w[0].wavelength) {
            return Err(CalibError::IllegalInput(format!(
                "catalogue wavelengths must be strictly increasing (line {} = {} after {})",
                i + 1,
                lines[i + 1].wavelength,
                lines[i].wavelength
            )));
        }
        Ok(Self { lines })
    }

    pub fn from_pairs(pairs: &[(f64, f64)]) -> CalibResult<Self> {
        Self::new(
            pairs
                .iter()
                .map(|&(wavelength, intensity)| CatalogueLine {
                    wavelength,
                    intensity,
                })
                .collect(),
        )
    }

    pub fn lines(&self) -> &[CatalogueLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Index range of the lines with `wl_min <= wavelength <= wl_max`.
    pub fn range_indices(&self, wl_min: f64, wl_max: f64) -> std::ops::Range<usize> {
        let start = self.lines.partition_point(|l| l.wavelength < wl_min);
        let end = self.lines.partition_point(|l| l.wavelength <= wl_max);
        start..end.max(start)
    }
}

/// Line-spread model parameters, all in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Width of the slit image (top-hat).
    pub slit_width: f64,
    /// FWHM of the Gaussian instrumental resolution.
    pub fwhm: f64,
    /// Profile is ignored further than this from a line centre.
    pub truncation: f64,
}

impl ModelParams {
    /// Parameters with the default truncation radius for the given widths.
    pub fn new(slit_width: f64, fwhm: f64) -> Self {
        Self {
            slit_width,
            fwhm,
            truncation: default_truncation(slit_width, fwhm),
        }
    }

    pub fn validate(&self) -> CalibResult<()> {
        let ok = |v: f64| v.is_finite() && v > 0.0;
        if !ok(self.slit_width) {
            return Err(CalibError::IllegalInput(format!(
                "slit width must be finite and > 0, got {}",
                self.slit_width
            )));
        }
        if !ok(self.fwhm) {
            return Err(CalibError::IllegalInput(format!(
                "FWHM must be finite and > 0, got {}",
                self.fwhm
            )));
        }
        if !ok(self.truncation) {
            return Err(CalibError::IllegalInput(format!(
                "truncation radius must be finite and > 0, got {}",
                self.truncation
            )));
        }
        Ok(())
    }
}

impl Default for ModelParams {
    fn default() -> Self {
        Self::new(2.0, 2.0)
    }
}

/// How catalogue lines are turned into a model spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LineSpectrumFiller {
    /// Integrate the profile over every pixel within the truncation radius.
    Exact,
    /// As `Exact`, with line intensities compressed by `ln(1 + I)`.
    Log,
    /// Split each line between two pixels, then convolve once with the profile kernel.
    Fast,
    /// As `Fast`, with `ln(1 + I)` intensities.
    FastLog,
}

impl LineSpectrumFiller {
    pub fn from_flags(fast: bool, log: bool) -> Self {
        match (fast, log) {
            (false, false) => LineSpectrumFiller::Exact,
            (false, true) => LineSpectrumFiller::Log,
            (true, false) => LineSpectrumFiller::Fast,
            (true, true) => LineSpectrumFiller::FastLog,
        }
    }

    pub fn is_fast(self) -> bool {
        matches!(self, LineSpectrumFiller::Fast | LineSpectrumFiller::FastLog)
    }

    pub fn is_log(self) -> bool {
        matches!(self, LineSpectrumFiller::Log | LineSpectrumFiller::FastLog)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            LineSpectrumFiller::Exact => "exact",
            LineSpectrumFiller::Log => "exact/log",
            LineSpectrumFiller::Fast => "fast",
            LineSpectrumFiller::FastLog => "fast/log",
        }
    }
}

/// A local maximum of the correlation-vs-shift curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShiftCandidate {
    /// Integer pixel shift `s`: `p(x + s)` is the shifted dispersion.
    pub shift: i64,
    pub correlation: f64,
}

/// Which continuous minimiser backs the correlation search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizerKind {
    /// Bundled Nelder–Mead simplex.
    NelderMead,
    /// No continuous optimiser; correlation searches fail with `UnsupportedMode`.
    Disabled,
}

/// Calibration strategy selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Multi-start continuous optimisation.
    Continuous,
    /// Anchor-point grid search.
    Grid,
    /// Continuous, falling back to the grid when no optimiser is available.
    Auto,
}

impl Strategy {
    pub fn display_name(self) -> &'static str {
        match self {
            Strategy::Continuous => "continuous",
            Strategy::Grid => "grid",
            Strategy::Auto => "auto",
        }
    }
}

/// Options of a single continuous optimisation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuousOptions {
    /// Coefficients `c_0..=c_k` are free; higher ones stay fixed.
    pub max_degree_freedom: usize,
    /// Convergence threshold on the simplex size, in pixels.
    pub pixel_tolerance: f64,
    /// Initial simplex step, in pixels.
    pub pixel_step: f64,
    /// Integer shifts `-h..=h` are scanned at every evaluation.
    pub half_window: usize,
    /// Iteration budget of the minimiser.
    pub max_iterations: usize,
    pub optimizer: OptimizerKind,
}

impl ContinuousOptions {
    pub fn validate(&self) -> CalibResult<()> {
        if !(self.pixel_tolerance.is_finite() && self.pixel_tolerance > 0.0) {
            return Err(CalibError::IllegalInput(format!(
                "pixel tolerance must be finite and > 0, got {}",
                self.pixel_tolerance
            )));
        }
        if !(self.pixel_step.is_finite() && self.pixel_step > 0.0) {
            return Err(CalibError::IllegalInput(format!(
                "pixel step must be finite and > 0, got {}",
                self.pixel_step
            )));
        }
        if self.max_iterations == 0 {
            return Err(CalibError::IllegalInput(
                "maximum iterations must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ContinuousOptions {
    fn default() -> Self {
        Self {
            max_degree_freedom: 1,
            pixel_tolerance: 0.1,
            pixel_step: 1.0,
            half_window: 10,
            max_iterations: 400,
            optimizer: OptimizerKind::NelderMead,
        }
    }
}

/// Options of the multi-start driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiStartOptions {
    pub continuous: ContinuousOptions,
    /// Number of shift candidates used as starting points.
    pub n_maxima: usize,
    /// Stop refining once a run used more lines than this.
    pub line_limit: usize,
    /// Tolerance escalations allowed before a start is abandoned.
    pub max_fail: usize,
    /// Restart signals honoured per start.
    pub max_continuations: usize,
    /// Run the starts on the rayon pool.
    pub parallel: bool,
}

impl MultiStartOptions {
    pub fn validate(&self) -> CalibResult<()> {
        self.continuous.validate()?;
        if self.n_maxima == 0 {
            return Err(CalibError::IllegalInput(
                "number of shift maxima must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MultiStartOptions {
    fn default() -> Self {
        Self {
            continuous: ContinuousOptions::default(),
            n_maxima: 3,
            line_limit: 200,
            max_fail: 3,
            max_continuations: 3,
            parallel: false,
        }
    }
}

/// Options of the anchor-point grid search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchOptions {
    /// Degree of the refitted dispersion (`degree + 1` anchors).
    pub degree: usize,
    /// Wavelength search range per anchor (length `degree + 1`).
    pub search_range: Vec<f64>,
    /// Samples per anchor.
    pub n_samples: usize,
    pub slit_width: f64,
    pub fwhm: f64,
    /// Keep every evaluated candidate for diagnostics.
    pub record_table: bool,
}

impl Default for GridSearchOptions {
    fn default() -> Self {
        Self {
            degree: 1,
            search_range: vec![20.0, 20.0],
            n_samples: 21,
            slit_width: 2.0,
            fwhm: 2.0,
            record_table: false,
        }
    }
}

/// A dispersion polynomial with the correlation it achieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub polynomial: Polynomial,
    pub correlation: f64,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    pub spectrum_path: Option<PathBuf>,
    /// `None` selects the built-in Ne/Ar list.
    pub catalogue_path: Option<PathBuf>,
    /// Guess dispersion coefficients `c_0, c_1, ...`.
    pub guess: Vec<f64>,
    pub strategy: Strategy,
    pub filler: LineSpectrumFiller,
    pub model: ModelParams,
    pub multi_start: MultiStartOptions,
    pub grid: GridSearchOptions,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_table: Option<PathBuf>,
    pub export_solution: Option<PathBuf>,
    pub debug_bundle: bool,
}

/// A saved dispersion solution (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionFile {
    pub tool: String,
    pub created: DateTime<Utc>,
    pub strategy: Strategy,
    pub n_pixels: usize,
    pub coefficients: Vec<f64>,
    pub correlation: f64,
    pub baseline_correlation: f64,
    pub model: ModelParams,
    pub filler: LineSpectrumFiller,
    pub grid: WavelengthGrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WavelengthGrid {
    pub pixel: Vec<f64>,
    pub wavelength: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_rejects_unsorted_lines() {
        let err = LineCatalogue::from_pairs(&[(5000.0, 1.0), (4990.0, 1.0)]).unwrap_err();
        assert!(matches!(err, CalibError::IllegalInput(_)));
        let err = LineCatalogue::from_pairs(&[(5000.0, 1.0), (5000.0, 2.0)]).unwrap_err();
        assert!(matches!(err, CalibError::IllegalInput(_)));
    }

    #[test]
    fn catalogue_range_is_inclusive() {
        let cat = LineCatalogue::from_pairs(&[(1.0, 1.0), (2.0, 1.0), (3.0, 1.0), (4.0, 1.0)]).unwrap();
        assert_eq!(cat.range_indices(2.0, 3.0), 1..3);
        assert_eq!(cat.range_indices(4.5, 9.0), 4..4);
        assert!(cat.range_indices(3.5, 1.5).is_empty());
    }

    #[test]
    fn model_params_validation() {
        assert!(ModelParams::new(2.0, 2.5).validate().is_ok());
        let bad = ModelParams {
            slit_width: 0.0,
            ..ModelParams::default()
        };
        assert!(matches!(bad.validate(), Err(CalibError::IllegalInput(_))));
    }
}
