//! Debug bundle writer for inspecting a calibration run.
//!
//! The bundle is a single Markdown file holding the run settings, the
//! correlation-vs-shift curve, the per-start outcomes and (when the grid search
//! ran with table recording) the best grid candidates.

use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::domain::CalibrationConfig;
use crate::error::AppError;
use crate::fit::{GridSample, RecordingSink};
use crate::report::{RunSummary, fmt_vec};

/// Grid rows kept in the bundle (best first).
const MAX_GRID_ROWS: usize = 200;

pub fn write_debug_bundle(
    dir: &Path,
    summary: &RunSummary,
    config: &CalibrationConfig,
    diagnostics: &RecordingSink,
) -> Result<PathBuf, AppError> {
    create_dir_all(dir).map_err(|e| AppError::new(4, format!("Failed to create debug dir: {e}")))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!(
        "wavecal_debug_{}_{}px_{ts}.md",
        summary.used.display_name(),
        summary.n_pixels
    ));
    let mut file = File::create(&path)
        .map_err(|e| AppError::new(4, format!("Failed to create debug file: {e}")))?;

    writeln!(file, "# wavecal debug bundle").map_err(write_err)?;
    writeln!(file, "- generated: {}", Local::now().to_rfc3339()).map_err(write_err)?;
    writeln!(file, "- pixels: {}", summary.n_pixels).map_err(write_err)?;
    writeln!(
        file,
        "- catalogue: {} ({} lines, {} on detector)",
        summary.catalogue_source, summary.catalogue_lines, summary.lines_on_detector
    )
    .map_err(write_err)?;
    writeln!(
        file,
        "- strategy: requested={}, used={}",
        summary.requested.display_name(),
        summary.used.display_name()
    )
    .map_err(write_err)?;
    writeln!(
        file,
        "- model: filler={}, slit={:.4}, fwhm={:.4}, truncation={:.4}",
        config.filler.display_name(),
        config.model.slit_width,
        config.model.fwhm,
        config.model.truncation
    )
    .map_err(write_err)?;
    let ms = &config.multi_start;
    writeln!(
        file,
        "- continuous: free_coeffs=0..={}, tolerance={:.4}px, step={:.3}px, half_window={}, max_iter={}, optimizer={:?}",
        ms.continuous.max_degree_freedom,
        ms.continuous.pixel_tolerance,
        ms.continuous.pixel_step,
        ms.continuous.half_window,
        ms.continuous.max_iterations,
        ms.continuous.optimizer
    )
    .map_err(write_err)?;
    writeln!(
        file,
        "- multi-start: n_maxima={}, line_limit={}, max_fail={}, max_continuations={}, parallel={}",
        ms.n_maxima, ms.line_limit, ms.max_fail, ms.max_continuations, ms.parallel
    )
    .map_err(write_err)?;
    writeln!(
        file,
        "- grid: degree={}, range={}, samples={}",
        config.grid.degree,
        fmt_vec(&config.grid.search_range),
        config.grid.n_samples
    )
    .map_err(write_err)?;

    writeln!(file, "\n## Result").map_err(write_err)?;
    writeln!(file, "- guess: {}", fmt_vec(summary.guess.coeffs())).map_err(write_err)?;
    writeln!(file, "- final: {}", fmt_vec(summary.calibration.polynomial.coeffs())).map_err(write_err)?;
    writeln!(
        file,
        "- correlation: baseline={:.6}, final={:.6}",
        summary.baseline_correlation, summary.calibration.correlation
    )
    .map_err(write_err)?;
    writeln!(
        file,
        "- change vs guess: rms={:.4}px, max={:.4}px",
        summary.change.rms_px, summary.change.max_px
    )
    .map_err(write_err)?;

    if !diagnostics.shift_curve.is_empty() {
        writeln!(file, "\n## Shift curve").map_err(write_err)?;
        writeln!(file, "| shift | r |").map_err(write_err)?;
        writeln!(file, "| - | - |").map_err(write_err)?;
        for &(shift, r) in &diagnostics.shift_curve {
            writeln!(file, "| {shift} | {r:.6} |").map_err(write_err)?;
        }
    }

    if !diagnostics.candidates.is_empty() {
        writeln!(file, "\n## Shift candidates").map_err(write_err)?;
        writeln!(file, "| rank | shift | r |").map_err(write_err)?;
        writeln!(file, "| - | - | - |").map_err(write_err)?;
        for (rank, c) in diagnostics.candidates.iter().enumerate() {
            writeln!(file, "| {rank} | {} | {:.6} |", c.shift, c.correlation).map_err(write_err)?;
        }
    }

    if !diagnostics.starts.is_empty() {
        writeln!(file, "\n## Starts").map_err(write_err)?;
        writeln!(file, "| start | shift | r | tolerance | runs | failures | continuations | lines |")
            .map_err(write_err)?;
        writeln!(file, "| - | - | - | - | - | - | - | - |").map_err(write_err)?;
        for s in &diagnostics.starts {
            writeln!(
                file,
                "| {} | {} | {} | {:.5} | {} | {} | {} | {} |",
                s.index,
                s.shift,
                s.correlation.map_or_else(|| "-".to_string(), |r| format!("{r:.6}")),
                s.final_tolerance,
                s.runs,
                s.failures,
                s.continuations,
                s.lines_used
            )
            .map_err(write_err)?;
        }
    }

    if !diagnostics.grid.is_empty() {
        let rows = best_grid_rows(&diagnostics.grid, MAX_GRID_ROWS);
        writeln!(
            file,
            "\n## Grid candidates (best {} of {})",
            rows.len(),
            diagnostics.grid.len()
        )
        .map_err(write_err)?;
        writeln!(file, "| index | anchors | r |").map_err(write_err)?;
        writeln!(file, "| - | - | - |").map_err(write_err)?;
        for s in rows {
            writeln!(file, "| {} | {} | {:.6} |", s.index, fmt_anchors(&s.anchors), s.correlation)
                .map_err(write_err)?;
        }
    }

    Ok(path)
}

fn write_err(e: std::io::Error) -> AppError {
    AppError::new(4, format!("Failed to write debug bundle: {e}"))
}

/// Highest correlations first; equal correlations keep index order.
fn best_grid_rows(samples: &[GridSample], max: usize) -> Vec<&GridSample> {
    let mut rows: Vec<&GridSample> = samples.iter().collect();
    rows.sort_by(|a, b| b.correlation.total_cmp(&a.correlation).then(a.index.cmp(&b.index)));
    rows.truncate(max);
    rows
}

fn fmt_anchors(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:.3}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Calibration, GridSearchOptions, LineSpectrumFiller, ModelParams, MultiStartOptions, ShiftCandidate,
        Strategy,
    };
    use crate::fit::StartReport;
    use crate::math::Polynomial;
    use crate::report::DispersionChange;

    fn config() -> CalibrationConfig {
        CalibrationConfig {
            spectrum_path: None,
            catalogue_path: None,
            guess: vec![6000.0, 1.0],
            strategy: Strategy::Continuous,
            filler: LineSpectrumFiller::Exact,
            model: ModelParams::default(),
            multi_start: MultiStartOptions::default(),
            grid: GridSearchOptions::default(),
            plot: false,
            plot_width: 80,
            plot_height: 20,
            export_table: None,
            export_solution: None,
            debug_bundle: true,
        }
    }

    #[test]
    fn bundle_has_all_recorded_sections() {
        let summary = RunSummary {
            n_pixels: 300,
            catalogue_source: "test".to_string(),
            catalogue_lines: 10,
            requested: Strategy::Continuous,
            used: Strategy::Continuous,
            filler: LineSpectrumFiller::Exact,
            model: ModelParams::default(),
            guess: Polynomial::new(vec![6000.0, 1.0]),
            calibration: Calibration {
                polynomial: Polynomial::new(vec![6001.0, 1.0]),
                correlation: 0.99,
            },
            baseline_correlation: 0.5,
            change: DispersionChange {
                rms_px: 1.0,
                max_px: 1.0,
            },
            lines_on_detector: 9,
            grid_evaluated: None,
        };
        let sink = RecordingSink {
            shift_curve: vec![(-1, 0.2), (0, 0.5), (1, 0.9)],
            candidates: vec![ShiftCandidate {
                shift: 1,
                correlation: 0.9,
            }],
            starts: vec![StartReport {
                index: 0,
                shift: 1,
                correlation: None,
                final_tolerance: 0.4,
                runs: 4,
                failures: 3,
                continuations: 0,
                lines_used: 0,
            }],
            grid: vec![
                GridSample {
                    index: 0,
                    anchors: vec![6000.0, 6299.0],
                    correlation: 0.1,
                },
                GridSample {
                    index: 1,
                    anchors: vec![6001.0, 6299.0],
                    correlation: 0.7,
                },
            ],
        };

        let dir = std::env::temp_dir().join(format!("wavecal-debug-{}", std::process::id()));
        let path = write_debug_bundle(&dir, &summary, &config(), &sink).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# wavecal debug bundle\n"));
        assert!(text.contains("## Shift curve"));
        assert!(text.contains("| 1 | 0.900000 |"));
        assert!(text.contains("| 0 | 1 | - | 0.40000 | 4 | 3 | 0 | 0 |"));
        assert!(text.contains("## Grid candidates (best 2 of 2)"));
        let best = text.find("| 1 | [6001.000, 6299.000] | 0.700000 |").unwrap();
        let worst = text.find("| 0 | [6000.000, 6299.000] | 0.100000 |").unwrap();
        assert!(best < worst);
        let _ = std::fs::remove_dir_all(dir);
    }
}
