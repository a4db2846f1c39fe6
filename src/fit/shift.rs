//! Shift-maxima finder.
//!
//! One oversized model fill gives the correlation at every integer shift in
//! `-half_window..=half_window`. Local maxima of that curve are cheap starting
//! points for the continuous search.

use log::debug;

use crate::domain::{LineSpectrumFiller, ShiftCandidate};
use crate::error::{CalibError, CalibResult};
use crate::fit::correlation::{CorrelationEvaluator, ShiftScan};
use crate::fit::diagnostics::DiagnosticSink;
use crate::math::Polynomial;
use crate::models::LineModel;

/// Local maxima of a shift curve, best first.
///
/// An endpoint counts when the curve is monotone towards it. On a plateau the
/// leftmost sample is reported. Ties in correlation keep the smaller shift first.
pub fn local_maxima(scan: &ShiftScan) -> Vec<ShiftCandidate> {
    let c = &scan.correlations;
    let last = c.len().saturating_sub(1);
    let mut out: Vec<ShiftCandidate> = scan
        .shifts()
        .enumerate()
        .filter(|&(k, _)| (k == 0 || c[k] > c[k - 1]) && (k == last || c[k] >= c[k + 1]))
        .map(|(k, shift)| ShiftCandidate {
            shift,
            correlation: c[k],
        })
        .collect();
    out.sort_by(|a, b| b.correlation.total_cmp(&a.correlation).then(a.shift.cmp(&b.shift)));
    out
}

/// Scan all integer shifts of `dispersion` and return the local maxima.
///
/// The diagnostic sink receives the full curve and the candidate list.
pub fn find_shift_maxima(
    dispersion: &Polynomial,
    observed: &[f64],
    model: &LineModel<'_>,
    filler: LineSpectrumFiller,
    half_window: usize,
    sink: &mut dyn DiagnosticSink,
) -> CalibResult<Vec<ShiftCandidate>> {
    let mut evaluator = CorrelationEvaluator::new(observed, *model, filler, half_window)?;
    let (_, candidates) = scan_shift_maxima(&mut evaluator, dispersion, sink)?;
    Ok(candidates)
}

/// As [`find_shift_maxima`], also returning the scan itself.
pub fn scan_shift_maxima(
    evaluator: &mut CorrelationEvaluator<'_>,
    dispersion: &Polynomial,
    sink: &mut dyn DiagnosticSink,
) -> CalibResult<(ShiftScan, Vec<ShiftCandidate>)> {
    let scan = evaluator.scan(dispersion)?;
    let shifts: Vec<i64> = scan.shifts().collect();
    sink.shift_curve(&shifts, &scan.correlations);

    let candidates = local_maxima(&scan);
    if candidates.is_empty() {
        return Err(CalibError::DataNotFound(
            "correlation-vs-shift curve has no maximum".to_string(),
        ));
    }
    debug!(
        "shift scan ±{}: {} maxima, best shift {} (r = {:.4}), {} lines",
        scan.half_window,
        candidates.len(),
        candidates[0].shift,
        candidates[0].correlation,
        scan.lines_used
    );
    sink.shift_candidates(&candidates);
    Ok((scan, candidates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::diagnostics::RecordingSink;

    fn scan(values: &[f64]) -> ShiftScan {
        ShiftScan {
            correlations: values.to_vec(),
            half_window: values.len() / 2,
            lines_used: 1,
        }
    }

    #[test]
    fn maxima_are_sorted_and_include_monotone_ends() {
        // shifts -3..=3
        let s = scan(&[0.9, 0.5, 0.6, 0.4, 0.7, 0.8, 0.85]);
        let got = local_maxima(&s);
        let shifts: Vec<i64> = got.iter().map(|c| c.shift).collect();
        assert_eq!(shifts, vec![-3, 3, -1]);
    }

    #[test]
    fn plateau_reports_one_candidate() {
        let s = scan(&[0.1, 0.5, 0.5, 0.2, 0.1]);
        let got = local_maxima(&s);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].shift, -1);
    }

    #[test]
    fn sink_receives_curve() {
        use crate::domain::{LineCatalogue, ModelParams};
        let cat = LineCatalogue::from_pairs(&[(6010.0, 1.0), (6042.0, 3.0), (6070.0, 2.0)]).unwrap();
        let model = LineModel::new(&cat, ModelParams::default());
        let p = Polynomial::new(vec![6000.0, 1.0]);
        let observed =
            crate::models::fill_line_spectrum_model(&p.shifted(2.0), 80, &model, LineSpectrumFiller::Exact).unwrap();
        let mut sink = RecordingSink::default();
        let got = find_shift_maxima(&p, &observed, &model, LineSpectrumFiller::Exact, 4, &mut sink).unwrap();
        assert_eq!(got[0].shift, 2);
        assert_eq!(sink.shift_curve.len(), 9);
        assert_eq!(sink.candidates, got);
    }
}
