//! Anchor-point grid search.
//!
//! We perturb the guess dispersion at `degree + 1` anchor pixels spread evenly
//! over the detector:
//!
//! - anchor `j` sits at `x_j = j·(n-1)/degree`
//! - its wavelength is sampled `n_samples` times across `range_j`, centred on
//!   the guess
//! - every combination of samples (`n_samples^(degree+1)` in total) is refitted
//!   into a polynomial and correlated against the observation
//!
//! Candidates are independent and evaluated on the rayon pool. Selection is
//! deterministic: highest correlation, ties broken by combination index.

use log::debug;
use rayon::prelude::*;
use serde::Serialize;

use crate::domain::{GridSearchOptions, LineCatalogue, LineSpectrumFiller, ModelParams};
use crate::error::{CalibError, CalibResult};
use crate::fit::correlation::{CorrelationEvaluator, MIN_CORRELATION};
use crate::fit::diagnostics::DiagnosticSink;
use crate::math::{Polynomial, fit_polynomial};
use crate::models::LineModel;

/// One evaluated combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSample {
    /// Combination index (anchor 0 varies fastest).
    pub index: usize,
    /// Wavelength at each anchor.
    pub anchors: Vec<f64>,
    pub correlation: f64,
}

/// Grid search result.
#[derive(Debug, Clone)]
pub struct GridSearchOutcome {
    pub polynomial: Polynomial,
    pub correlation: f64,
    /// Anchor pixel positions.
    pub anchor_pixels: Vec<f64>,
    pub evaluated: usize,
    /// Every sample, when `record_table` was requested.
    pub table: Option<Vec<GridSample>>,
}

/// The sampling lattice.
#[derive(Debug, Clone)]
struct AnchorGrid {
    pixels: Vec<f64>,
    starts: Vec<f64>,
    steps: Vec<f64>,
    n_samples: usize,
}

impl AnchorGrid {
    fn wavelengths(&self, mut index: usize) -> Vec<f64> {
        self.starts
            .iter()
            .zip(&self.steps)
            .map(|(&start, &step)| {
                let i = index % self.n_samples;
                index /= self.n_samples;
                start + i as f64 * step
            })
            .collect()
    }
}

/// Best polynomial of degree `opts.degree` over the anchor grid around `guess`.
///
/// Synthesis uses exact deposition with the default truncation radius for the
/// given slit width and FWHM.
pub fn best_polynomial_by_grid(
    observed: &[f64],
    catalogue: &LineCatalogue,
    guess: &Polynomial,
    opts: &GridSearchOptions,
    sink: &mut dyn DiagnosticSink,
) -> CalibResult<GridSearchOutcome> {
    if observed.is_empty() {
        return Err(CalibError::NullInput("observed spectrum is empty".to_string()));
    }
    if opts.degree == 0 {
        return Err(CalibError::IllegalInput("grid degree must be >= 1".to_string()));
    }
    if opts.n_samples == 0 {
        return Err(CalibError::IllegalInput("grid needs at least one sample per anchor".to_string()));
    }
    let n_anchors = opts.degree + 1;
    if opts.search_range.len() != n_anchors {
        return Err(CalibError::IncompatibleInput(format!(
            "{} search ranges given for {n_anchors} anchors",
            opts.search_range.len()
        )));
    }
    if let Some(bad) = opts.search_range.iter().find(|r| !(r.is_finite() && **r >= 0.0)) {
        return Err(CalibError::IllegalInput(format!(
            "search range must be finite and >= 0, got {bad}"
        )));
    }
    if observed.len() < n_anchors {
        return Err(CalibError::IllegalInput(format!(
            "{} pixels cannot hold {n_anchors} distinct anchors",
            observed.len()
        )));
    }
    let total = u32::try_from(n_anchors)
        .ok()
        .and_then(|e| opts.n_samples.checked_pow(e))
        .ok_or_else(|| {
            CalibError::IllegalInput(format!(
                "{}^{n_anchors} grid combinations overflow",
                opts.n_samples
            ))
        })?;

    let params = ModelParams::new(opts.slit_width, opts.fwhm);
    let model = LineModel::new(catalogue, params);
    let evaluator = CorrelationEvaluator::new(observed, model, LineSpectrumFiller::Exact, 0)?;

    let span = observed.len() as f64 - 1.0;
    let pixels: Vec<f64> = (0..n_anchors)
        .map(|j| j as f64 * span / opts.degree as f64)
        .collect();
    let grid = AnchorGrid {
        starts: pixels
            .iter()
            .zip(&opts.search_range)
            .map(|(&x, &range)| {
                if opts.n_samples == 1 { guess.eval(x) } else { guess.eval(x) - 0.5 * range }
            })
            .collect(),
        steps: opts
            .search_range
            .iter()
            .map(|&range| {
                if opts.n_samples == 1 { 0.0 } else { range / (opts.n_samples - 1) as f64 }
            })
            .collect(),
        pixels,
        n_samples: opts.n_samples,
    };
    debug!(
        "grid search: degree {}, {} samples per anchor, {total} combinations",
        opts.degree, opts.n_samples
    );

    let score = |ev: &mut CorrelationEvaluator<'_>, index: usize| {
        let anchors = grid.wavelengths(index);
        let r = match fit_polynomial(&grid.pixels, &anchors, opts.degree) {
            Some(p) => ev.correlation(&p),
            None => MIN_CORRELATION,
        };
        if r.is_nan() { MIN_CORRELATION } else { r }
    };

    // Only the table needs every score; otherwise keep the running best.
    let (scores, (best, best_correlation)) = if opts.record_table {
        let scores: Vec<f64> = (0..total)
            .into_par_iter()
            .map_init(|| evaluator.clone(), |ev, index| score(ev, index))
            .collect();
        let best = scores.iter().copied().enumerate().fold(NO_CANDIDATE, better_candidate);
        (scores, best)
    } else {
        let best = (0..total)
            .into_par_iter()
            .map_init(|| evaluator.clone(), |ev, index| (index, score(ev, index)))
            .reduce(|| NO_CANDIDATE, better_candidate);
        (Vec::new(), best)
    };
    if !(best_correlation > MIN_CORRELATION) {
        return Err(CalibError::DataNotFound(
            "no grid candidate produced a usable model".to_string(),
        ));
    }

    let best_anchors = grid.wavelengths(best);
    let polynomial = fit_polynomial(&grid.pixels, &best_anchors, opts.degree).ok_or_else(|| {
        CalibError::DataNotFound("best grid candidate could not be refitted".to_string())
    })?;

    let samples: Vec<GridSample> = scores
        .iter()
        .enumerate()
        .map(|(index, &correlation)| GridSample {
            index,
            anchors: grid.wavelengths(index),
            correlation,
        })
        .collect();
    if opts.record_table {
        sink.grid_samples(&samples);
    }

    debug!("grid search: best combination {best} with r = {best_correlation:.5}");
    Ok(GridSearchOutcome {
        polynomial,
        correlation: best_correlation,
        anchor_pixels: grid.pixels,
        evaluated: total,
        table: opts.record_table.then_some(samples),
    })
}

const NO_CANDIDATE: (usize, f64) = (usize::MAX, f64::NEG_INFINITY);

/// Higher correlation wins; ties go to the lower combination index, so the
/// choice does not depend on how rayon splits the range.
fn better_candidate(a: (usize, f64), b: (usize, f64)) -> (usize, f64) {
    if b.1 > a.1 || (b.1 == a.1 && b.0 < a.0) { b } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::diagnostics::{NoopSink, RecordingSink};
    use crate::models::fill_line_spectrum_model;

    fn catalogue() -> LineCatalogue {
        let pairs: Vec<(f64, f64)> = (0..10)
            .map(|i| (6012.0 + 27.1 * i as f64 + (i % 3) as f64 * 4.4, 2.0 + (i % 2) as f64))
            .collect();
        LineCatalogue::from_pairs(&pairs).unwrap()
    }

    fn observed(cat: &LineCatalogue, truth: &Polynomial) -> Vec<f64> {
        let model = LineModel::new(cat, ModelParams::new(2.0, 2.0));
        fill_line_spectrum_model(truth, 300, &model, LineSpectrumFiller::Exact).unwrap()
    }

    #[test]
    fn lands_on_the_true_linear_dispersion() {
        let cat = catalogue();
        let truth = Polynomial::new(vec![6000.0, 1.0]);
        let obs = observed(&cat, &truth);
        let guess = Polynomial::new(vec![5998.0, 1.0]);
        let opts = GridSearchOptions {
            degree: 1,
            search_range: vec![10.0, 10.0],
            n_samples: 11,
            slit_width: 2.0,
            fwhm: 2.0,
            record_table: true,
        };
        let mut sink = RecordingSink::default();
        let out = best_polynomial_by_grid(&obs, &cat, &guess, &opts, &mut sink).unwrap();
        assert_eq!(out.evaluated, 121);
        for &x in &[0.0, 150.0, 299.0] {
            assert!((out.polynomial.eval(x) - truth.eval(x)).abs() < 1e-6);
        }
        assert!(out.correlation > 0.999);
        assert_eq!(sink.grid.len(), 121);
        assert_eq!(out.table.map(|t| t.len()), Some(121));
    }

    #[test]
    fn single_sample_evaluates_the_guess() {
        let cat = catalogue();
        let truth = Polynomial::new(vec![6000.0, 1.0]);
        let obs = observed(&cat, &truth);
        let opts = GridSearchOptions {
            n_samples: 1,
            ..GridSearchOptions::default()
        };
        let out = best_polynomial_by_grid(&obs, &cat, &truth, &opts, &mut NoopSink).unwrap();
        assert_eq!(out.evaluated, 1);
        assert!((out.polynomial.coeff(0) - 6000.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_bad_shapes() {
        let cat = catalogue();
        let truth = Polynomial::new(vec![6000.0, 1.0]);
        let obs = observed(&cat, &truth);
        let opts = GridSearchOptions {
            search_range: vec![1.0],
            ..GridSearchOptions::default()
        };
        let err = best_polynomial_by_grid(&obs, &cat, &truth, &opts, &mut NoopSink).unwrap_err();
        assert!(matches!(err, CalibError::IncompatibleInput(_)));

        let opts = GridSearchOptions {
            degree: 40,
            search_range: vec![1.0; 41],
            n_samples: 1000,
            ..GridSearchOptions::default()
        };
        let err = best_polynomial_by_grid(&obs, &cat, &truth, &opts, &mut NoopSink).unwrap_err();
        assert!(matches!(err, CalibError::IllegalInput(_)));
    }

    #[test]
    fn running_best_matches_the_recorded_table() {
        let cat = catalogue();
        let truth = Polynomial::new(vec![6000.0, 1.0]);
        let obs = observed(&cat, &truth);
        let guess = Polynomial::new(vec![6003.0, 1.0]);
        let mut opts = GridSearchOptions {
            degree: 1,
            search_range: vec![8.0, 8.0],
            n_samples: 9,
            slit_width: 2.0,
            fwhm: 2.0,
            record_table: true,
        };
        let mut sink = RecordingSink::default();
        let with_table = best_polynomial_by_grid(&obs, &cat, &guess, &opts, &mut sink).unwrap();

        opts.record_table = false;
        let mut quiet = RecordingSink::default();
        let without = best_polynomial_by_grid(&obs, &cat, &guess, &opts, &mut quiet).unwrap();
        assert_eq!(with_table.polynomial, without.polynomial);
        assert_eq!(with_table.correlation, without.correlation);
        assert!(without.table.is_none());
        assert!(quiet.grid.is_empty());

        let top = sink.grid.iter().map(|s| s.correlation).fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(without.correlation, top);
    }

    #[test]
    fn ties_go_to_the_lower_index_in_any_order() {
        let picks = [(4, 0.5), (2, 0.9), (7, 0.9), (1, -1.0)];
        let forward = picks.iter().copied().fold(NO_CANDIDATE, better_candidate);
        let backward = picks.iter().rev().copied().fold(NO_CANDIDATE, better_candidate);
        assert_eq!(forward, (2, 0.9));
        assert_eq!(backward, (2, 0.9));
        assert_eq!(better_candidate(NO_CANDIDATE, NO_CANDIDATE), NO_CANDIDATE);
    }
}
