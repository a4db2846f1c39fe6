//! Observational hooks for the search drivers.
//!
//! A sink sees intermediate products (shift curve, candidates, per-start
//! outcomes, grid samples) but never influences the result. All methods have
//! no-op defaults so callers implement only what they want to look at.

use serde::Serialize;

use crate::domain::ShiftCandidate;
use crate::fit::grid::GridSample;

/// Summary of one multi-start run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartReport {
    /// Position of the start in the candidate list.
    pub index: usize,
    /// Integer shift the start was seeded from.
    pub shift: i64,
    /// Best correlation reached, if any run converged.
    pub correlation: Option<f64>,
    /// Tolerance (pixels) of the last optimiser run.
    pub final_tolerance: f64,
    pub runs: usize,
    pub failures: usize,
    pub continuations: usize,
    pub lines_used: usize,
}

pub trait DiagnosticSink {
    /// Correlation at each integer shift of the input dispersion.
    fn shift_curve(&mut self, _shifts: &[i64], _correlations: &[f64]) {}

    /// Local maxima of the shift curve, best first.
    fn shift_candidates(&mut self, _candidates: &[ShiftCandidate]) {}

    fn start_finished(&mut self, _report: &StartReport) {}

    fn grid_samples(&mut self, _samples: &[GridSample]) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {}

/// Keeps everything it is shown, for reports and debug bundles.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub shift_curve: Vec<(i64, f64)>,
    pub candidates: Vec<ShiftCandidate>,
    pub starts: Vec<StartReport>,
    pub grid: Vec<GridSample>,
}

impl DiagnosticSink for RecordingSink {
    fn shift_curve(&mut self, shifts: &[i64], correlations: &[f64]) {
        self.shift_curve = shifts.iter().copied().zip(correlations.iter().copied()).collect();
    }

    fn shift_candidates(&mut self, candidates: &[ShiftCandidate]) {
        self.candidates = candidates.to_vec();
    }

    fn start_finished(&mut self, report: &StartReport) {
        self.starts.push(report.clone());
    }

    fn grid_samples(&mut self, samples: &[GridSample]) {
        self.grid = samples.to_vec();
    }
}
