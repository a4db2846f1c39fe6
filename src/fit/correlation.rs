//! Correlation between an observed spectrum and a synthetic one.
//!
//! The evaluator owns one model buffer of `n + 2·half_window` pixels. A single
//! fill therefore serves every integer shift in `-half_window..=half_window`:
//! shift `s` is the window starting at buffer index `half_window + s`.

use crate::domain::LineSpectrumFiller;
use crate::error::{CalibError, CalibResult};
use crate::math::Polynomial;
use crate::models::LineModel;

/// Smallest possible correlation; reported for candidates that cannot be modelled.
pub const MIN_CORRELATION: f64 = -1.0;

/// Pearson correlation of two equally long series.
///
/// Returns [`MIN_CORRELATION`] for mismatched lengths, fewer than two samples or
/// a series without variance.
pub fn normalized_correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len();
    if n < 2 || b.len() != n {
        return MIN_CORRELATION;
    }
    let inv_n = 1.0 / n as f64;
    let mean_a = a.iter().sum::<f64>() * inv_n;
    let mean_b = b.iter().sum::<f64>() * inv_n;

    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    if !(saa > 0.0 && sbb > 0.0) {
        return MIN_CORRELATION;
    }
    let r = sab / (saa * sbb).sqrt();
    if r.is_finite() { r.clamp(-1.0, 1.0) } else { MIN_CORRELATION }
}

/// Correlations at every integer shift of one model fill.
#[derive(Debug, Clone)]
pub struct ShiftScan {
    /// `correlations[k]` belongs to shift `k - half_window`.
    pub correlations: Vec<f64>,
    pub half_window: usize,
    /// Catalogue lines deposited into the model.
    pub lines_used: usize,
}

impl ShiftScan {
    /// Correlation at integer shift `s` (`|s| <= half_window`).
    pub fn at(&self, shift: i64) -> f64 {
        let k = shift + self.half_window as i64;
        usize::try_from(k)
            .ok()
            .and_then(|k| self.correlations.get(k).copied())
            .unwrap_or(MIN_CORRELATION)
    }

    pub fn shifts(&self) -> impl Iterator<Item = i64> + '_ {
        let h = self.half_window as i64;
        (0..self.correlations.len()).map(move |k| k as i64 - h)
    }
}

/// Correlates candidate dispersions against one observed spectrum.
#[derive(Debug, Clone)]
pub struct CorrelationEvaluator<'a> {
    observed: &'a [f64],
    model: LineModel<'a>,
    filler: LineSpectrumFiller,
    half_window: usize,
    buffer: Vec<f64>,
}

impl<'a> CorrelationEvaluator<'a> {
    pub fn new(
        observed: &'a [f64],
        model: LineModel<'a>,
        filler: LineSpectrumFiller,
        half_window: usize,
    ) -> CalibResult<Self> {
        if observed.is_empty() {
            return Err(CalibError::NullInput("observed spectrum is empty".to_string()));
        }
        if observed.len() < 2 {
            return Err(CalibError::IllegalInput(
                "observed spectrum needs at least two pixels".to_string(),
            ));
        }
        model.params.validate()?;
        Ok(Self {
            observed,
            model,
            filler,
            half_window,
            buffer: vec![0.0; observed.len() + 2 * half_window],
        })
    }

    pub fn n_pixels(&self) -> usize {
        self.observed.len()
    }

    pub fn half_window(&self) -> usize {
        self.half_window
    }

    pub fn observed(&self) -> &'a [f64] {
        self.observed
    }

    pub fn model(&self) -> &LineModel<'a> {
        &self.model
    }

    pub fn filler(&self) -> LineSpectrumFiller {
        self.filler
    }

    /// Fill the model once and correlate every shift window.
    pub fn scan(&mut self, dispersion: &Polynomial) -> CalibResult<ShiftScan> {
        let lines_used = self
            .filler
            .fill(&mut self.buffer, dispersion, &self.model, self.half_window)?;
        let n = self.observed.len();
        let correlations = (0..=2 * self.half_window)
            .map(|k| normalized_correlation(self.observed, &self.buffer[k..k + n]))
            .collect();
        Ok(ShiftScan {
            correlations,
            half_window: self.half_window,
            lines_used,
        })
    }

    /// Correlation at zero shift and the number of lines used.
    pub fn try_correlation(&mut self, dispersion: &Polynomial) -> CalibResult<(f64, usize)> {
        let lines_used = self
            .filler
            .fill(&mut self.buffer, dispersion, &self.model, self.half_window)?;
        let h = self.half_window;
        let r = normalized_correlation(self.observed, &self.buffer[h..h + self.observed.len()]);
        Ok((r, lines_used))
    }

    /// Correlation at zero shift; synthesis failures count as [`MIN_CORRELATION`].
    pub fn correlation(&mut self, dispersion: &Polynomial) -> f64 {
        self.try_correlation(dispersion)
            .map(|(r, _)| r)
            .unwrap_or(MIN_CORRELATION)
    }

    /// The current model window at shift `s` (valid after a fill).
    pub fn model_window(&self, shift: i64) -> Option<&[f64]> {
        let k = usize::try_from(shift + self.half_window as i64).ok()?;
        self.buffer.get(k..k + self.observed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LineCatalogue, ModelParams};

    #[test]
    fn correlation_basics() {
        let a = [1.0, 2.0, 3.0, 4.0];
        assert!((normalized_correlation(&a, &[2.0, 4.0, 6.0, 8.0]) - 1.0).abs() < 1e-12);
        assert!((normalized_correlation(&a, &[4.0, 3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
        assert_eq!(normalized_correlation(&a, &[1.0; 4]), MIN_CORRELATION);
        assert_eq!(normalized_correlation(&a, &[1.0, 2.0]), MIN_CORRELATION);
    }

    #[test]
    fn failing_synthesis_yields_minimum() {
        let cat = LineCatalogue::from_pairs(&[(6050.0, 1.0)]).unwrap();
        let observed = vec![0.0, 1.0, 0.0, 2.0, 0.0];
        let model = LineModel::new(&cat, ModelParams::default());
        let mut eval = CorrelationEvaluator::new(&observed, model, LineSpectrumFiller::Exact, 0).unwrap();
        // Decreasing dispersion.
        let p = Polynomial::new(vec![6050.0, -1.0]);
        assert_eq!(eval.correlation(&p), MIN_CORRELATION);
        assert!(matches!(eval.try_correlation(&p), Err(CalibError::IllegalInput(_))));
    }

    #[test]
    fn scan_peaks_at_self() {
        let cat = LineCatalogue::from_pairs(&[(6020.0, 4.0), (6055.5, 2.0), (6081.0, 7.0)]).unwrap();
        let model = LineModel::new(&cat, ModelParams::new(2.0, 2.0));
        let p = Polynomial::new(vec![6000.0, 1.0]);
        let observed = crate::models::fill_line_spectrum_model(&p, 100, &model, LineSpectrumFiller::Exact).unwrap();
        let mut eval = CorrelationEvaluator::new(&observed, model, LineSpectrumFiller::Exact, 5).unwrap();
        let scan = eval.scan(&p).unwrap();
        assert_eq!(scan.correlations.len(), 11);
        assert!((scan.at(0) - 1.0).abs() < 1e-9);
        assert!(scan.shifts().filter(|&s| s != 0).all(|s| scan.at(s) < scan.at(0)));
        assert_eq!(scan.lines_used, 3);
    }
}
