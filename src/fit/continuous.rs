//! Continuous optimisation of the dispersion coefficients.
//!
//! The objective is `-r(p)`, the negated zero-shift correlation. Every
//! evaluation scans all integer shifts of the candidate anyway (one oversized
//! fill), and the best off-centre shift seen during the whole run is
//! remembered. If that remembered model beats the converged optimum the run
//! reports `restart` with the shifted polynomial substituted, so the driver can
//! start again from there instead of accepting a shift-degenerate optimum.

use log::debug;
use serde::Serialize;

use crate::domain::{ContinuousOptions, LineSpectrumFiller};
use crate::error::{CalibError, CalibResult};
use crate::fit::correlation::{CorrelationEvaluator, MIN_CORRELATION};
use crate::fit::simplex::SimplexProblem;
use crate::math::Polynomial;
use crate::models::LineModel;

/// Result of one continuous run.
#[derive(Debug, Clone, Serialize)]
pub struct ContinuousOutcome {
    pub polynomial: Polynomial,
    pub correlation: f64,
    /// A shifted model beat the converged optimum; `polynomial` is that model.
    pub restart: bool,
    /// Objective evaluations.
    pub cost: usize,
    /// Evaluations whose model could be synthesised.
    pub successful_cost: usize,
    /// Lines deposited for the reported polynomial.
    pub lines_used: usize,
    pub iterations: usize,
}

/// Best off-centre shift seen so far.
#[derive(Debug, Clone)]
struct LocalMaxTracker {
    correlation: f64,
    shift: i64,
    polynomial: Option<Polynomial>,
    /// Lines used by the scan that found it.
    lines_used: usize,
}

struct CorrelationProblem<'a> {
    evaluator: CorrelationEvaluator<'a>,
    base: Polynomial,
    x_centre: f64,
    x_last: f64,
    tracker: LocalMaxTracker,
    cost: usize,
    successful_cost: usize,
    lines_used: usize,
}

impl CorrelationProblem<'_> {
    fn polynomial(&self, x: &[f64]) -> Polynomial {
        let mut p = self.base.clone();
        for (k, &c) in x.iter().enumerate() {
            p.set_coeff(k, c);
        }
        p
    }
}

impl SimplexProblem for CorrelationProblem<'_> {
    fn cost(&mut self, x: &[f64]) -> f64 {
        self.cost += 1;
        let p = self.polynomial(x);
        let scan = match self.evaluator.scan(&p) {
            Ok(scan) => scan,
            Err(_) => return -MIN_CORRELATION,
        };
        self.successful_cost += 1;
        self.lines_used = scan.lines_used;

        for (shift, &r) in scan.shifts().zip(&scan.correlations) {
            if shift != 0 && r > self.tracker.correlation {
                self.tracker = LocalMaxTracker {
                    correlation: r,
                    shift,
                    polynomial: Some(p.shifted(shift as f64)),
                    lines_used: scan.lines_used,
                };
            }
        }

        let r = scan.at(0);
        if r.is_nan() { -MIN_CORRELATION } else { -r }
    }

    /// Mean over vertices of the largest wavelength difference to the best
    /// vertex (at both ends and the centre), in pixels of the best dispersion.
    fn size(&self, simplex: &[Vec<f64>]) -> f64 {
        let best = self.polynomial(&simplex[0]);
        let slope = best.eval_with_derivative(self.x_centre).1.abs();
        if !(slope > 0.0) || simplex.len() < 2 {
            return f64::INFINITY;
        }
        let checkpoints = [0.0, self.x_centre, self.x_last];
        let reference = checkpoints.map(|x| best.eval(x));

        let total: f64 = simplex[1..]
            .iter()
            .map(|v| {
                let p = self.polynomial(v);
                checkpoints
                    .iter()
                    .zip(&reference)
                    .map(|(&x, &w)| (p.eval(x) - w).abs())
                    .fold(0.0, f64::max)
            })
            .sum();
        total / (simplex.len() - 1) as f64 / slope
    }
}

/// Initial simplex steps: `pixel_step` pixels of wavelength at the centre for
/// `c_0`, scaled by `x_c^-k` and halved per order for `c_k`.
pub fn initial_steps(dispersion: &Polynomial, n_free: usize, x_centre: f64, pixel_step: f64) -> Vec<f64> {
    let slope = dispersion.eval_with_derivative(x_centre).1;
    (0..n_free)
        .map(|k| pixel_step * slope / x_centre.powi(k as i32) * 0.5f64.powi(k as i32))
        .collect()
}

/// Maximise the zero-shift correlation over `c_0..=c_{max_degree_freedom}`.
///
/// Higher coefficients stay fixed. When `max_degree_freedom` exceeds the degree
/// of `dispersion` the missing coefficients start at zero.
pub fn find_dispersion_from_correlation(
    dispersion: &Polynomial,
    observed: &[f64],
    model: &LineModel<'_>,
    filler: LineSpectrumFiller,
    opts: &ContinuousOptions,
) -> CalibResult<ContinuousOutcome> {
    opts.validate()?;
    let evaluator = CorrelationEvaluator::new(observed, *model, filler, opts.half_window)?;

    let n = observed.len();
    let x_centre = 0.5 * (n as f64 - 1.0);
    let n_free = opts.max_degree_freedom + 1;

    let mut base = dispersion.clone();
    if base.coeffs().len() < n_free {
        base.set_coeff(n_free - 1, 0.0);
    }
    if !(base.eval_with_derivative(x_centre).1 > 0.0) {
        return Err(CalibError::IllegalInput(
            "dispersion must increase at the spectrum centre".to_string(),
        ));
    }

    let start: Vec<f64> = base.coeffs()[..n_free].to_vec();
    let steps = initial_steps(&base, n_free, x_centre, opts.pixel_step);

    let mut problem = CorrelationProblem {
        evaluator,
        base,
        x_centre,
        x_last: n as f64 - 1.0,
        tracker: LocalMaxTracker {
            correlation: MIN_CORRELATION,
            shift: 0,
            polynomial: None,
            lines_used: 0,
        },
        cost: 0,
        successful_cost: 0,
        lines_used: 0,
    };

    let optimizer = opts.optimizer.instantiate();
    let minimum = optimizer.minimize(
        &mut problem,
        &start,
        &steps,
        opts.pixel_tolerance,
        opts.max_iterations,
    )?;

    let polynomial = problem.polynomial(&minimum.x);
    let (correlation, lines_used) = problem.evaluator.try_correlation(&polynomial).map_err(|e| {
        CalibError::Continue(format!("optimum left the valid model region ({e})"))
    })?;

    let mut outcome = ContinuousOutcome {
        polynomial,
        correlation,
        restart: false,
        cost: problem.cost,
        successful_cost: problem.successful_cost,
        lines_used,
        iterations: minimum.iterations,
    };

    if let Some(shifted) = problem.tracker.polynomial.take() {
        if problem.tracker.correlation > outcome.correlation {
            debug!(
                "{}: shift {} (r = {:.5}) beats the optimum (r = {:.5}); restarting",
                optimizer.name(),
                problem.tracker.shift,
                problem.tracker.correlation,
                outcome.correlation
            );
            outcome.polynomial = shifted;
            outcome.correlation = problem.tracker.correlation;
            outcome.lines_used = problem.tracker.lines_used;
            outcome.restart = true;
        }
    }

    debug!(
        "{} finished: r = {:.5} after {} iterations, {} evaluations ({} ok)",
        optimizer.name(),
        outcome.correlation,
        outcome.iterations,
        outcome.cost,
        outcome.successful_cost
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LineCatalogue, ModelParams, OptimizerKind};
    use crate::models::fill_line_spectrum_model;

    fn catalogue() -> LineCatalogue {
        let pairs: Vec<(f64, f64)> = (0..12)
            .map(|i| (6010.0 + 23.7 * i as f64 + (i * i) as f64 * 1.3, 1.0 + (i % 4) as f64))
            .collect();
        LineCatalogue::from_pairs(&pairs).unwrap()
    }

    #[test]
    fn steps_shrink_with_order() {
        let p = Polynomial::new(vec![6000.0, 2.0, 0.0]);
        let steps = initial_steps(&p, 3, 100.0, 1.0);
        assert!((steps[0] - 2.0).abs() < 1e-12);
        assert!((steps[1] - 0.01).abs() < 1e-12);
        assert!((steps[2] - 0.00005).abs() < 1e-15);
    }

    #[test]
    fn recovers_small_offset() {
        let cat = catalogue();
        let model = LineModel::new(&cat, ModelParams::new(2.0, 2.5));
        let truth = Polynomial::new(vec![6000.0, 1.0]);
        let observed = fill_line_spectrum_model(&truth, 400, &model, LineSpectrumFiller::Exact).unwrap();

        let guess = Polynomial::new(vec![6000.6, 1.0]);
        let opts = ContinuousOptions {
            max_degree_freedom: 0,
            pixel_tolerance: 0.01,
            half_window: 3,
            ..ContinuousOptions::default()
        };
        let out = find_dispersion_from_correlation(&guess, &observed, &model, LineSpectrumFiller::Exact, &opts)
            .unwrap();
        assert!((out.polynomial.coeff(0) - 6000.0).abs() < 0.1, "{:?}", out.polynomial);
        assert!(out.correlation > 0.99);
        assert!(out.successful_cost <= out.cost);
    }

    #[test]
    fn shift_degenerate_start_asks_for_a_restart() {
        // Narrow lines 8 px away from their observed positions: no overlap, so
        // the simplex settles where it is while the shift scan sees the match.
        let cat = catalogue();
        let model = LineModel::new(&cat, ModelParams::new(1.0, 1.0));
        let truth = Polynomial::new(vec![6000.0, 1.0]);
        let observed = fill_line_spectrum_model(&truth, 400, &model, LineSpectrumFiller::Exact).unwrap();

        let guess = truth.shifted(-8.0);
        let opts = ContinuousOptions {
            max_degree_freedom: 0,
            pixel_step: 0.5,
            pixel_tolerance: 0.4,
            half_window: 10,
            ..ContinuousOptions::default()
        };
        let out = find_dispersion_from_correlation(&guess, &observed, &model, LineSpectrumFiller::Exact, &opts)
            .unwrap();
        assert!(out.restart);
        assert!(out.correlation > 0.9, "r = {}", out.correlation);
        assert!((out.polynomial.coeff(0) - 6000.0).abs() < 0.6, "{:?}", out.polynomial);
        assert!(out.lines_used > 0);

        // From the substituted polynomial the run stays on the true optimum.
        let again =
            find_dispersion_from_correlation(&out.polynomial, &observed, &model, LineSpectrumFiller::Exact, &opts)
                .unwrap();
        assert!((again.polynomial.coeff(0) - 6000.0).abs() < 0.3, "{:?}", again.polynomial);
        assert!(again.correlation > 0.99);
    }

    #[test]
    fn disabled_optimizer_reports_unsupported() {
        let cat = catalogue();
        let model = LineModel::new(&cat, ModelParams::default());
        let truth = Polynomial::new(vec![6000.0, 1.0]);
        let observed = fill_line_spectrum_model(&truth, 200, &model, LineSpectrumFiller::Exact).unwrap();
        let opts = ContinuousOptions {
            optimizer: OptimizerKind::Disabled,
            ..ContinuousOptions::default()
        };
        let err = find_dispersion_from_correlation(&truth, &observed, &model, LineSpectrumFiller::Exact, &opts)
            .unwrap_err();
        assert!(matches!(err, CalibError::UnsupportedMode(_)));
    }
}
