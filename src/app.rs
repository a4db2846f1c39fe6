//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads (or synthesises) the observation and the catalogue
//! - runs the calibration
//! - prints reports/plots
//! - writes optional exports and the debug bundle

use std::path::Path;

use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};
use log::info;

use crate::cli::{CalibrateArgs, Command, DemoArgs, EngineArgs, PlotArgs};
use crate::data::{ArcSpec, demo_dispersion, generate_arc, ne_ar_catalogue, perturb_guess};
use crate::domain::{
    CalibrationConfig, ContinuousOptions, GridSearchOptions, LineSpectrumFiller, ModelParams, MultiStartOptions,
};
use crate::error::AppError;
use crate::report::dispersion_change;

pub mod pipeline;

/// Points in the exported solution grid.
const SOLUTION_GRID_POINTS: usize = 64;

/// Environment variable holding the log filter (e.g. `debug`, `wavecal::fit=trace`).
pub const LOG_ENV: &str = "WAVECAL_LOG";

/// Start logging to stderr, so reports on stdout stay clean.
///
/// The filter comes from `WAVECAL_LOG` (a `.env` file is honoured) and
/// defaults to `info`. Keep the returned handle alive for the whole run.
pub fn setup_logging() -> Result<LoggerHandle, AppError> {
    dotenvy::dotenv().ok();
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| "info".to_string());
    Logger::try_with_str(&filter)
        .map_err(|e| AppError::new(2, format!("Invalid {LOG_ENV} '{filter}': {e}")))?
        .log_to_stderr()
        .start()
        .map_err(|e| AppError::new(4, format!("Logger initialization failed: {e}")))
}

/// Entry point for the `wavecal` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Calibrate(args) => handle_calibrate(args),
        Command::Demo(args) => handle_demo(args),
        Command::Plot(args) => handle_plot(args),
    }
}

fn handle_calibrate(args: CalibrateArgs) -> Result<(), AppError> {
    let config = calibration_config_from_args(&args);
    let run = pipeline::run_calibration(&config)?;
    present(&run, &config)
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    if args.pixels < 2 {
        return Err(AppError::new(2, "Demo needs at least 2 pixels."));
    }
    let mut config = demo_config_from_args(&args);
    let catalogue = ne_ar_catalogue()?;
    let truth = demo_dispersion();
    let arc = ArcSpec {
        filler: LineSpectrumFiller::Exact,
        continuum: args.continuum,
        noise_sigma: args.noise,
        seed: args.seed,
        ..ArcSpec::clean(truth.clone(), args.pixels, config.model)
    };
    let observed = generate_arc(&arc, &catalogue)?;
    let guess = perturb_guess(&truth, args.pixels, args.offset_px);
    config.guess = guess.coeffs().to_vec();
    info!(
        "demo: {} pixels, guess offset {:.2} px, noise σ={}, seed {}",
        args.pixels, args.offset_px, args.noise, args.seed
    );

    let inputs = pipeline::CalibrationInputs {
        observed,
        catalogue,
        catalogue_source: "built-in Ne/Ar".to_string(),
        row_errors: Vec::new(),
    };
    let run = pipeline::run_with_inputs(&config, inputs)?;
    present(&run, &config)?;

    let before = dispersion_change(&truth, &run.summary.guess, args.pixels);
    let after = dispersion_change(&truth, &run.summary.calibration.polynomial, args.pixels);
    println!("Recovery vs true dispersion:");
    println!("- guess : rms={:.3}px max={:.3}px", before.rms_px, before.max_px);
    println!("- final : rms={:.3}px max={:.3}px", after.rms_px, after.max_px);
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let solution = crate::io::read_solution_json(&args.solution)?;
    println!(
        "Solution: {} ({}, {} pixels, r={:.6})",
        crate::report::fmt_vec(&solution.coefficients),
        solution.strategy.display_name(),
        solution.n_pixels,
        solution.correlation
    );
    println!("{}", crate::plot::render_solution_plot(&solution, args.width, args.height));
    Ok(())
}

/// Print the report and plots, then write whatever exports were requested.
fn present(run: &pipeline::RunOutput, config: &CalibrationConfig) -> Result<(), AppError> {
    println!("{}", crate::report::format_run_summary(&run.summary));
    let table = crate::report::format_search_table(&run.diagnostics.candidates, &run.diagnostics.starts);
    if !table.is_empty() {
        println!("{table}");
    }
    let skipped = crate::report::format_row_errors(&run.inputs.row_errors, 10);
    if !skipped.is_empty() {
        println!("{skipped}");
    }

    if config.plot {
        println!(
            "{}",
            crate::plot::render_spectrum_plot(
                &run.inputs.observed,
                Some(run.model_spectrum.as_slice()),
                Some(&run.summary.calibration.polynomial),
                config.plot_width,
                config.plot_height,
            )
        );
        if !run.diagnostics.shift_curve.is_empty() {
            println!(
                "{}",
                crate::plot::render_shift_plot(
                    &run.diagnostics.shift_curve,
                    config.plot_width,
                    (config.plot_height / 2).max(5),
                )
            );
        }
    }

    if let Some(path) = &config.export_table {
        crate::io::write_table_csv(
            path,
            &run.summary.calibration.polynomial,
            &run.inputs.observed,
            &run.model_spectrum,
        )?;
        info!("wrote calibration table to {}", path.display());
    }
    if let Some(path) = &config.export_solution {
        let solution = crate::io::build_solution(
            &run.summary.calibration.polynomial,
            &run.solution_meta(config),
            SOLUTION_GRID_POINTS,
        );
        crate::io::write_solution_json(path, &solution)?;
        info!("wrote solution to {}", path.display());
    }
    if config.debug_bundle {
        let path = crate::debug::write_debug_bundle(Path::new("debug"), &run.summary, config, &run.diagnostics)?;
        println!("Debug bundle: {}", path.display());
    }
    Ok(())
}

pub fn calibration_config_from_args(args: &CalibrateArgs) -> CalibrationConfig {
    let guess_degree = args.guess.len().saturating_sub(1);
    let mut config = config_from_engine_args(&args.engine, guess_degree);
    config.spectrum_path = Some(args.spectrum.clone());
    config.catalogue_path = args.catalogue.clone();
    config.guess = args.guess.clone();
    config
}

pub fn demo_config_from_args(args: &DemoArgs) -> CalibrationConfig {
    config_from_engine_args(&args.engine, demo_dispersion().degree())
}

fn config_from_engine_args(engine: &EngineArgs, guess_degree: usize) -> CalibrationConfig {
    let mut model = ModelParams::new(engine.slit, engine.fwhm);
    if let Some(truncation) = engine.truncation {
        model.truncation = truncation;
    }
    let degree = engine.grid_degree.unwrap_or(guess_degree.max(1));

    CalibrationConfig {
        spectrum_path: None,
        catalogue_path: None,
        guess: Vec::new(),
        strategy: engine.strategy,
        filler: LineSpectrumFiller::from_flags(engine.fast, engine.log),
        model,
        multi_start: MultiStartOptions {
            continuous: ContinuousOptions {
                max_degree_freedom: engine.max_degree_freedom,
                pixel_tolerance: engine.tolerance,
                pixel_step: engine.step,
                half_window: engine.half_window,
                max_iterations: engine.max_iterations,
                optimizer: engine.optimizer,
            },
            n_maxima: engine.n_maxima,
            line_limit: engine.line_limit,
            max_fail: engine.max_fail,
            max_continuations: engine.max_continuations,
            parallel: engine.parallel,
        },
        grid: GridSearchOptions {
            degree,
            search_range: engine.grid_range.clone(),
            n_samples: engine.grid_samples,
            slit_width: engine.slit,
            fwhm: engine.fwhm,
            record_table: engine.debug,
        },
        plot: engine.plot && !engine.no_plot,
        plot_width: engine.width,
        plot_height: engine.height,
        export_table: engine.export_table.clone(),
        export_solution: engine.export_solution.clone(),
        debug_bundle: engine.debug,
    }
}
