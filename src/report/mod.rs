//! Reporting utilities: dispersion comparisons and line identification.

pub mod format;

pub use format::*;

use crate::domain::{Calibration, LineSpectrumFiller, ModelParams, Strategy};
use crate::error::CalibResult;
use crate::math::Polynomial;
use crate::models::{LineModel, PlacedLine, place_lines};

/// Difference between two dispersions, expressed in pixels of the second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispersionChange {
    pub rms_px: f64,
    pub max_px: f64,
}

/// Everything the terminal summary prints about one calibration.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub n_pixels: usize,
    pub catalogue_source: String,
    pub catalogue_lines: usize,
    pub requested: Strategy,
    pub used: Strategy,
    pub filler: LineSpectrumFiller,
    pub model: ModelParams,
    pub guess: Polynomial,
    pub calibration: Calibration,
    pub baseline_correlation: f64,
    /// Guess → calibration.
    pub change: DispersionChange,
    pub lines_on_detector: usize,
    pub grid_evaluated: Option<usize>,
}

/// Per-pixel wavelength difference `to - from`, divided by the local
/// dispersion of `to`.
///
/// Pixels where `to` is not increasing are skipped.
pub fn dispersion_change(from: &Polynomial, to: &Polynomial, n_pixels: usize) -> DispersionChange {
    let mut sum_sq = 0.0;
    let mut max_px: f64 = 0.0;
    let mut n = 0usize;
    for i in 0..n_pixels {
        let x = i as f64;
        let (wl, slope) = to.eval_with_derivative(x);
        if !(slope > 0.0) {
            continue;
        }
        let d = (wl - from.eval(x)) / slope;
        sum_sq += d * d;
        max_px = max_px.max(d.abs());
        n += 1;
    }
    let rms_px = if n == 0 { 0.0 } else { (sum_sq / n as f64).sqrt() };
    DispersionChange { rms_px, max_px }
}

/// Catalogue lines whose centres fall on the `n_pixels` detector.
pub fn lines_on_detector(
    dispersion: &Polynomial,
    model: &LineModel<'_>,
    n_pixels: usize,
) -> CalibResult<Vec<PlacedLine>> {
    let last = n_pixels.saturating_sub(1) as f64;
    let placed = place_lines(dispersion, model, n_pixels, 0)?;
    Ok(placed
        .into_iter()
        .filter(|l| (0.0..=last).contains(&l.pixel))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LineCatalogue;

    #[test]
    fn constant_offset_change_in_pixels() {
        let from = Polynomial::new(vec![6000.0, 2.0]);
        let to = Polynomial::new(vec![6003.0, 2.0]);
        let change = dispersion_change(&from, &to, 100);
        assert!((change.rms_px - 1.5).abs() < 1e-12);
        assert!((change.max_px - 1.5).abs() < 1e-12);
    }

    #[test]
    fn identical_dispersions_do_not_move() {
        let p = Polynomial::new(vec![6000.0, 1.3, 1e-4]);
        let change = dispersion_change(&p, &p, 500);
        assert_eq!(change.rms_px, 0.0);
        assert_eq!(change.max_px, 0.0);
    }

    #[test]
    fn only_lines_inside_the_detector_are_listed() {
        let cat = LineCatalogue::from_pairs(&[(5999.0, 1.0), (6010.0, 1.0), (6050.0, 2.0), (6200.0, 1.0)]).unwrap();
        let model = LineModel::new(&cat, ModelParams::default());
        let lines = lines_on_detector(&Polynomial::new(vec![6000.0, 1.0]), &model, 100).unwrap();
        let wls: Vec<f64> = lines.iter().map(|l| l.wavelength).collect();
        assert_eq!(wls, vec![6010.0, 6050.0]);
        assert!((lines[1].pixel - 50.0).abs() < 1e-9);
    }
}
