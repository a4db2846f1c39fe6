//! Multi-start driver.
//!
//! Responsibilities:
//!
//! - find local maxima of the correlation-vs-shift curve of the guess
//! - run the continuous search from each of the best `n_maxima` shifts
//! - per start, loosen the tolerance after failures and tighten it after
//!   successes (see `SearchState`)
//! - keep the single best polynomial across all starts
//!
//! Starts are independent, so they may run on the rayon pool. The reduction
//! walks the results in start order and only replaces the best on a strictly
//! higher correlation, which makes the outcome independent of scheduling.

use log::{debug, warn};
use rayon::prelude::*;

use crate::domain::{ContinuousOptions, LineSpectrumFiller, MultiStartOptions, ShiftCandidate};
use crate::error::{CalibError, CalibResult};
use crate::fit::continuous::{ContinuousOutcome, find_dispersion_from_correlation};
use crate::fit::correlation::CorrelationEvaluator;
use crate::fit::diagnostics::{DiagnosticSink, StartReport};
use crate::fit::shift::scan_shift_maxima;
use crate::math::Polynomial;
use crate::models::LineModel;

/// Per-start control state.
///
/// | state          | event                               | next                       |
/// |----------------|-------------------------------------|----------------------------|
/// | `Searching`    | converged                           | `Converged`                |
/// | `Searching`    | restart, continuations left         | `Searching` (substituted)  |
/// | `Searching`    | restart, continuations used up      | `Exhausted`                |
/// | `Searching`    | `Continue`, nothing good yet        | `Escalating`               |
/// | `Searching`    | `Continue`, have a good result      | `Exhausted` (revert)       |
/// | `Converged`    | line limit hit or tolerance reached | `Exhausted`                |
/// | `Converged`    | otherwise                           | `Deescalating`             |
/// | `Escalating`   | failures left                       | `Searching` (tolerance ×2) |
/// | `Escalating`   | failures used up                    | `Exhausted`                |
/// | `Deescalating` | always                              | `Searching` (tolerance ÷4) |
#[derive(Debug)]
enum SearchState {
    Searching,
    Converged(Box<ContinuousOutcome>),
    Escalating,
    Deescalating,
    Exhausted,
}

/// Final multi-start result.
#[derive(Debug, Clone)]
pub struct MultiStartOutcome {
    pub polynomial: Polynomial,
    pub correlation: f64,
    /// Zero-shift correlation of the input dispersion.
    pub baseline_correlation: f64,
    pub candidates: Vec<ShiftCandidate>,
    /// Index into `candidates` of the start that produced the result.
    pub best_start: usize,
    pub starts: Vec<StartReport>,
}

struct StartRun {
    report: StartReport,
    good: Option<ContinuousOutcome>,
}

/// Globally best dispersion from several starting shifts.
///
/// Fails `DataNotFound` when no start improves on the correlation of the input
/// dispersion. `Continue` from individual runs is handled locally; every other
/// error propagates.
pub fn find_dispersion_from_correlation_all(
    dispersion: &Polynomial,
    observed: &[f64],
    model: &LineModel<'_>,
    filler: LineSpectrumFiller,
    opts: &MultiStartOptions,
    sink: &mut dyn DiagnosticSink,
) -> CalibResult<MultiStartOutcome> {
    opts.validate()?;
    let mut evaluator = CorrelationEvaluator::new(observed, *model, filler, opts.continuous.half_window)?;
    let (scan, mut candidates) = scan_shift_maxima(&mut evaluator, dispersion, sink)?;
    candidates.truncate(opts.n_maxima);

    let baseline = scan.at(0);
    debug!(
        "multi-start: baseline r = {baseline:.5}, {} start(s){}",
        candidates.len(),
        if opts.parallel { " in parallel" } else { "" }
    );

    let run = |index: usize, candidate: &ShiftCandidate| {
        run_start(index, candidate, dispersion, opts, |start, tolerance| {
            let run_opts = ContinuousOptions {
                pixel_tolerance: tolerance,
                ..opts.continuous.clone()
            };
            find_dispersion_from_correlation(start, observed, model, filler, &run_opts)
        })
    };
    let runs: Vec<CalibResult<StartRun>> = if opts.parallel {
        candidates.par_iter().enumerate().map(|(i, c)| run(i, c)).collect()
    } else {
        let mut out = Vec::with_capacity(candidates.len());
        for (i, c) in candidates.iter().enumerate() {
            let r = run(i, c);
            let failed = r.is_err();
            out.push(r);
            if failed {
                break;
            }
        }
        out
    };

    let mut best: Option<(usize, ContinuousOutcome)> = None;
    let mut best_correlation = baseline;
    let mut starts = Vec::with_capacity(runs.len());
    for result in runs {
        let run = result?;
        sink.start_finished(&run.report);
        starts.push(run.report);
        if let Some(good) = run.good {
            if good.correlation > best_correlation {
                best_correlation = good.correlation;
                best = Some((starts.len() - 1, good));
            }
        }
    }

    match best {
        Some((best_start, good)) => Ok(MultiStartOutcome {
            polynomial: good.polynomial,
            correlation: good.correlation,
            baseline_correlation: baseline,
            candidates,
            best_start,
            starts,
        }),
        None => Err(CalibError::DataNotFound(format!(
            "no starting shift improved on the baseline correlation {baseline:.5}"
        ))),
    }
}

/// Drive one start through `SearchState`; `attempt(start, tolerance)` is one
/// continuous run.
fn run_start<F>(
    index: usize,
    candidate: &ShiftCandidate,
    dispersion: &Polynomial,
    opts: &MultiStartOptions,
    mut attempt: F,
) -> CalibResult<StartRun>
where
    F: FnMut(&Polynomial, f64) -> CalibResult<ContinuousOutcome>,
{
    let requested = opts.continuous.pixel_tolerance;
    let mut tolerance = requested;
    let mut current = dispersion.shifted(candidate.shift as f64);
    let mut good: Option<ContinuousOutcome> = None;
    let mut failures = 0usize;
    let mut continuations = 0usize;
    let mut runs = 0usize;

    let mut state = SearchState::Searching;
    loop {
        state = match state {
            SearchState::Searching => {
                runs += 1;
                match attempt(&current, tolerance) {
                    Ok(out) if out.restart => {
                        continuations += 1;
                        current = out.polynomial.clone();
                        if continuations > opts.max_continuations {
                            debug!("start {index}: continuation budget used up");
                            keep_better(&mut good, out);
                            SearchState::Exhausted
                        } else {
                            debug!("start {index}: restart {continuations} from shifted model");
                            SearchState::Searching
                        }
                    }
                    Ok(out) => SearchState::Converged(Box::new(out)),
                    Err(e) if e.is_continue() => {
                        debug!("start {index}: no convergence at {tolerance:.4} px ({e})");
                        if good.is_some() {
                            SearchState::Exhausted
                        } else {
                            SearchState::Escalating
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
            SearchState::Converged(out) => {
                let lines_used = out.lines_used;
                debug!(
                    "start {index}: converged at {tolerance:.4} px, r = {:.5}, {lines_used} lines",
                    out.correlation
                );
                keep_better(&mut good, *out);
                if lines_used > opts.line_limit || tolerance < requested {
                    SearchState::Exhausted
                } else {
                    SearchState::Deescalating
                }
            }
            SearchState::Escalating => {
                failures += 1;
                if failures > opts.max_fail {
                    warn!("start {index} (shift {}): gave up after {failures} failures", candidate.shift);
                    SearchState::Exhausted
                } else {
                    tolerance *= 2.0;
                    SearchState::Searching
                }
            }
            SearchState::Deescalating => {
                tolerance /= 4.0;
                if let Some(g) = &good {
                    current = g.polynomial.clone();
                }
                SearchState::Searching
            }
            SearchState::Exhausted => break,
        };
    }

    let report = StartReport {
        index,
        shift: candidate.shift,
        correlation: good.as_ref().map(|g| g.correlation),
        final_tolerance: tolerance,
        runs,
        failures,
        continuations,
        lines_used: good.as_ref().map_or(0, |g| g.lines_used),
    };
    Ok(StartRun { report, good })
}

fn keep_better(good: &mut Option<ContinuousOutcome>, candidate: ContinuousOutcome) {
    match good {
        Some(g) if g.correlation >= candidate.correlation => {}
        _ => *good = Some(candidate),
    }
}
