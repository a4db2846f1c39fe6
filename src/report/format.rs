//! Formatted terminal output.
//!
//! Formatting lives here so that:
//! - the engine stays free of presentation concerns
//! - output changes are localized (the tables are covered by snapshot tests)

use crate::domain::ShiftCandidate;
use crate::fit::StartReport;
use crate::io::RowError;
use crate::report::RunSummary;

/// Inputs, settings and the resulting dispersion.
pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str("=== wavecal - wavelength calibration ===\n");
    out.push_str(&format!(
        "Spectrum: n={} pixels\n",
        summary.n_pixels
    ));
    out.push_str(&format!(
        "Catalogue: {} ({} lines, {} on detector)\n",
        summary.catalogue_source, summary.catalogue_lines, summary.lines_on_detector
    ));
    let strategy = if summary.requested == summary.used {
        summary.used.display_name().to_string()
    } else {
        format!("{} (requested {})", summary.used.display_name(), summary.requested.display_name())
    };
    out.push_str(&format!("Strategy: {strategy}\n"));
    out.push_str(&format!(
        "Model: filler={} | slit={:.3}px | fwhm={:.3}px | truncation={:.3}px\n",
        summary.filler.display_name(),
        summary.model.slit_width,
        summary.model.fwhm,
        summary.model.truncation
    ));
    if let Some(n) = summary.grid_evaluated {
        out.push_str(&format!("Grid: {n} candidates evaluated\n"));
    }

    out.push_str("\nCorrelation:\n");
    out.push_str(&format!("- guess : {:.6}\n", summary.baseline_correlation));
    out.push_str(&format!("- final : {:.6}\n", summary.calibration.correlation));

    out.push_str("\nDispersion:\n");
    out.push_str(&format!("- guess : {}\n", fmt_vec(summary.guess.coeffs())));
    out.push_str(&format!("- final : {}\n", fmt_vec(summary.calibration.polynomial.coeffs())));
    out.push_str(&format!(
        "- change: rms={:.3}px max={:.3}px\n",
        summary.change.rms_px, summary.change.max_px
    ));
    if summary.n_pixels > 0 {
        let p = &summary.calibration.polynomial;
        let last = (summary.n_pixels - 1) as f64;
        out.push_str(&format!(
            "- range : [{:.3}, {:.3}]\n",
            p.eval(0.0),
            p.eval(last)
        ));
    }

    out
}

/// Shift candidates and the outcome of the start seeded from each.
pub fn format_search_table(candidates: &[ShiftCandidate], starts: &[StartReport]) -> String {
    let mut out = String::new();
    if candidates.is_empty() {
        return out;
    }

    out.push_str("Starts (correlation-vs-shift maxima):\n");
    push_row(
        &mut out,
        format!(
            "{:>3} {:>6} {:>10} {:>10} {:>6} {:>5} {:>5} {:>6} {:>10}",
            "#", "shift", "r_shift", "r_final", "runs", "fail", "cont", "lines", "tol_px"
        ),
    );
    push_row(
        &mut out,
        format!(
            "{:-<3} {:-<6} {:-<10} {:-<10} {:-<6} {:-<5} {:-<5} {:-<6} {:-<10}",
            "", "", "", "", "", "", "", "", ""
        ),
    );

    for (i, c) in candidates.iter().enumerate() {
        match starts.iter().find(|s| s.index == i) {
            Some(s) => push_row(
                &mut out,
                format!(
                    "{:>3} {:>6} {:>10.5} {:>10} {:>6} {:>5} {:>5} {:>6} {:>10.4}",
                    i,
                    c.shift,
                    c.correlation,
                    fmt_opt(s.correlation),
                    s.runs,
                    s.failures,
                    s.continuations,
                    s.lines_used,
                    s.final_tolerance
                ),
            ),
            None => push_row(
                &mut out,
                format!("{:>3} {:>6} {:>10.5} {:>10}", i, c.shift, c.correlation, "-"),
            ),
        }
    }
    out
}

/// Skipped catalogue rows, at most `max` of them.
pub fn format_row_errors(errors: &[RowError], max: usize) -> String {
    let mut out = String::new();
    if errors.is_empty() {
        return out;
    }
    out.push_str(&format!("Skipped {} catalogue row(s):\n", errors.len()));
    for e in errors.iter().take(max) {
        out.push_str(&format!("- line {}: {}\n", e.line, e.message));
    }
    if errors.len() > max {
        out.push_str(&format!("- ... {} more\n", errors.len() - max));
    }
    out
}

pub fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6e}")).collect();
    format!("[{}]", parts.join(", "))
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.5}"),
        _ => "-".to_string(),
    }
}

fn push_row(out: &mut String, row: String) {
    out.push_str(row.trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Calibration, LineSpectrumFiller, ModelParams, Strategy};
    use crate::math::Polynomial;
    use crate::report::DispersionChange;

    fn summary() -> RunSummary {
        RunSummary {
            n_pixels: 1024,
            catalogue_source: "built-in Ne/Ar".to_string(),
            catalogue_lines: 43,
            requested: Strategy::Auto,
            used: Strategy::Grid,
            filler: LineSpectrumFiller::Fast,
            model: ModelParams::default(),
            guess: Polynomial::new(vec![6000.0, 1.5]),
            calibration: Calibration {
                polynomial: Polynomial::new(vec![6003.0, 1.5]),
                correlation: 0.97,
            },
            baseline_correlation: 0.31,
            change: DispersionChange {
                rms_px: 2.0,
                max_px: 2.0,
            },
            lines_on_detector: 12,
            grid_evaluated: Some(441),
        }
    }

    #[test]
    fn summary_mentions_fallback_and_correlations() {
        let txt = format_run_summary(&summary());
        assert!(txt.contains("Strategy: grid (requested auto)"));
        assert!(txt.contains("- guess : 0.310000"));
        assert!(txt.contains("- final : 0.970000"));
        assert!(txt.contains("Grid: 441 candidates evaluated"));
        assert!(txt.contains("- change: rms=2.000px max=2.000px"));
        assert!(txt.contains("(43 lines, 12 on detector)"));
    }

    #[test]
    fn search_table_snapshot() {
        let candidates = [
            ShiftCandidate {
                shift: 3,
                correlation: 0.8,
            },
            ShiftCandidate {
                shift: -7,
                correlation: 0.25,
            },
        ];
        let starts = [StartReport {
            index: 0,
            shift: 3,
            correlation: Some(0.99),
            final_tolerance: 0.025,
            runs: 3,
            failures: 0,
            continuations: 1,
            lines_used: 14,
        }];
        let txt = format_search_table(&candidates, &starts);
        let expected = concat!(
            "Starts (correlation-vs-shift maxima):\n",
            "  #  shift    r_shift    r_final   runs  fail  cont  lines     tol_px\n",
            "--- ------ ---------- ---------- ------ ----- ----- ------ ----------\n",
            "  0      3    0.80000    0.99000      3     0     1     14     0.0250\n",
            "  1     -7    0.25000          -\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn row_errors_are_capped() {
        let errors: Vec<RowError> = (0..5)
            .map(|i| RowError {
                line: i + 2,
                message: "bad".to_string(),
            })
            .collect();
        let txt = format_row_errors(&errors, 2);
        assert!(txt.starts_with("Skipped 5 catalogue row(s):\n"));
        assert!(txt.ends_with("- ... 3 more\n"));
        assert_eq!(format_row_errors(&[], 2), "");
    }
}
