//! Shared calibration pipeline used by the `calibrate` and `demo` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! ingest -> strategy dispatch -> model spectrum -> summary
//!
//! The commands can then focus on where the observation comes from and on
//! presentation.

use log::{info, warn};

use crate::domain::{
    Calibration, CalibrationConfig, GridSearchOptions, LineCatalogue, LineSpectrumFiller, ModelParams, Strategy,
};
use crate::error::{AppError, CalibError, CalibResult};
use crate::fit::{
    CorrelationEvaluator, DiagnosticSink, RecordingSink, best_polynomial_by_grid,
    find_dispersion_from_correlation_all,
};
use crate::io::{RowError, SolutionMeta, load_catalogue, load_spectrum};
use crate::math::Polynomial;
use crate::models::{LineModel, fill_line_spectrum_model};
use crate::report::{RunSummary, dispersion_change, lines_on_detector};

/// Default grid search range on each side of an anchor, in pixels.
const DEFAULT_GRID_HALF_RANGE_PX: f64 = 10.0;

/// Observation and catalogue, however they were obtained.
#[derive(Debug, Clone)]
pub struct CalibrationInputs {
    pub observed: Vec<f64>,
    pub catalogue: LineCatalogue,
    /// Human-readable origin of the catalogue.
    pub catalogue_source: String,
    pub row_errors: Vec<RowError>,
}

/// Result of one strategy dispatch.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub used: Strategy,
    pub calibration: Calibration,
    pub baseline_correlation: f64,
    pub grid_evaluated: Option<usize>,
}

/// All computed outputs of a single calibration run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub inputs: CalibrationInputs,
    pub summary: RunSummary,
    /// Model spectrum of the final dispersion, same length as the observation.
    pub model_spectrum: Vec<f64>,
    pub diagnostics: RecordingSink,
}

impl RunOutput {
    pub fn solution_meta(&self, config: &CalibrationConfig) -> SolutionMeta {
        SolutionMeta {
            strategy: self.summary.used,
            n_pixels: self.summary.n_pixels,
            correlation: self.summary.calibration.correlation,
            baseline_correlation: self.summary.baseline_correlation,
            model: config.model,
            filler: config.filler,
        }
    }
}

/// Load the inputs named by `config` and calibrate.
pub fn run_calibration(config: &CalibrationConfig) -> Result<RunOutput, AppError> {
    let spectrum_path = config
        .spectrum_path
        .as_deref()
        .ok_or_else(|| AppError::new(2, "No spectrum file given."))?;
    let spectrum = load_spectrum(spectrum_path)?;
    info!("read {} pixels from {}", spectrum.flux.len(), spectrum_path.display());

    let inputs = match &config.catalogue_path {
        Some(path) => {
            let data = load_catalogue(path)?;
            info!(
                "read {} catalogue lines from {} ({} rows skipped)",
                data.catalogue.len(),
                path.display(),
                data.row_errors.len()
            );
            CalibrationInputs {
                observed: spectrum.flux,
                catalogue: data.catalogue,
                catalogue_source: path.display().to_string(),
                row_errors: data.row_errors,
            }
        }
        None => CalibrationInputs {
            observed: spectrum.flux,
            catalogue: crate::data::ne_ar_catalogue()?,
            catalogue_source: "built-in Ne/Ar".to_string(),
            row_errors: Vec::new(),
        },
    };
    run_with_inputs(config, inputs)
}

/// Calibrate already-loaded inputs with the guess in `config`.
pub fn run_with_inputs(config: &CalibrationConfig, inputs: CalibrationInputs) -> Result<RunOutput, AppError> {
    if config.guess.is_empty() {
        return Err(AppError::new(2, "No guess dispersion coefficients given."));
    }
    let guess = Polynomial::new(config.guess.clone());
    let n_pixels = inputs.observed.len();

    let mut diagnostics = RecordingSink::default();
    let outcome = calibrate(&inputs.observed, &inputs.catalogue, &guess, config, &mut diagnostics)?;

    let model = LineModel::new(&inputs.catalogue, config.model);
    let final_poly = &outcome.calibration.polynomial;
    let model_spectrum = fill_line_spectrum_model(final_poly, n_pixels, &model, config.filler)?;
    let lines = lines_on_detector(final_poly, &model, n_pixels)?;

    let summary = RunSummary {
        n_pixels,
        catalogue_source: inputs.catalogue_source.clone(),
        catalogue_lines: inputs.catalogue.len(),
        requested: config.strategy,
        used: outcome.used,
        filler: config.filler,
        model: config.model,
        change: dispersion_change(&guess, final_poly, n_pixels),
        guess,
        calibration: outcome.calibration,
        baseline_correlation: outcome.baseline_correlation,
        lines_on_detector: lines.len(),
        grid_evaluated: outcome.grid_evaluated,
    };
    info!(
        "calibrated with {} search: r {:.5} -> {:.5}, moved {:.3} px rms",
        summary.used.display_name(),
        summary.baseline_correlation,
        summary.calibration.correlation,
        summary.change.rms_px
    );

    Ok(RunOutput {
        inputs,
        summary,
        model_spectrum,
        diagnostics,
    })
}

/// Run the configured strategy.
///
/// `Auto` tries the continuous search and falls back to the grid when no
/// continuous optimiser is available; every other error is returned as is.
pub fn calibrate(
    observed: &[f64],
    catalogue: &LineCatalogue,
    guess: &Polynomial,
    config: &CalibrationConfig,
    sink: &mut dyn DiagnosticSink,
) -> CalibResult<StrategyOutcome> {
    match config.strategy {
        Strategy::Continuous => calibrate_continuous(observed, catalogue, guess, config, sink),
        Strategy::Grid => calibrate_grid(observed, catalogue, guess, config, sink),
        Strategy::Auto => match calibrate_continuous(observed, catalogue, guess, config, sink) {
            Err(CalibError::UnsupportedMode(reason)) => {
                warn!("continuous search unavailable ({reason}); falling back to grid search");
                calibrate_grid(observed, catalogue, guess, config, sink)
            }
            other => other,
        },
    }
}

fn calibrate_continuous(
    observed: &[f64],
    catalogue: &LineCatalogue,
    guess: &Polynomial,
    config: &CalibrationConfig,
    sink: &mut dyn DiagnosticSink,
) -> CalibResult<StrategyOutcome> {
    let model = LineModel::new(catalogue, config.model);
    let out = find_dispersion_from_correlation_all(guess, observed, &model, config.filler, &config.multi_start, sink)?;
    Ok(StrategyOutcome {
        used: Strategy::Continuous,
        calibration: Calibration {
            polynomial: out.polynomial,
            correlation: out.correlation,
        },
        baseline_correlation: out.baseline_correlation,
        grid_evaluated: None,
    })
}

fn calibrate_grid(
    observed: &[f64],
    catalogue: &LineCatalogue,
    guess: &Polynomial,
    config: &CalibrationConfig,
    sink: &mut dyn DiagnosticSink,
) -> CalibResult<StrategyOutcome> {
    let opts = resolve_grid_options(&config.grid, guess, observed.len());
    let model = LineModel::new(catalogue, ModelParams::new(opts.slit_width, opts.fwhm));
    let baseline = CorrelationEvaluator::new(observed, model, LineSpectrumFiller::Exact, 0)?.correlation(guess);

    let out = best_polynomial_by_grid(observed, catalogue, guess, &opts, sink)?;
    Ok(StrategyOutcome {
        used: Strategy::Grid,
        calibration: Calibration {
            polynomial: out.polynomial,
            correlation: out.correlation,
        },
        baseline_correlation: baseline,
        grid_evaluated: Some(out.evaluated),
    })
}

/// Fill in the search range when it was left empty (±10 px of the guess
/// dispersion at the detector centre) or given as a single value for all
/// anchors.
pub fn resolve_grid_options(grid: &GridSearchOptions, guess: &Polynomial, n_pixels: usize) -> GridSearchOptions {
    let mut opts = grid.clone();
    let n_anchors = opts.degree + 1;
    match opts.search_range.len() {
        0 => {
            let centre = 0.5 * (n_pixels as f64 - 1.0).max(0.0);
            let slope = guess.eval_with_derivative(centre).1.abs();
            opts.search_range = vec![2.0 * DEFAULT_GRID_HALF_RANGE_PX * slope; n_anchors];
        }
        1 => opts.search_range = vec![opts.search_range[0]; n_anchors],
        _ => {}
    }
    opts
}
