//! Least-squares polynomial fitting.
//!
//! The grid search repeatedly refits a dispersion polynomial through a handful
//! of `(pixel, wavelength)` anchors. Pixel coordinates run into the thousands, so
//! a raw Vandermonde matrix is badly conditioned once the degree exceeds two.
//! We fit on the normalised abscissa `t = x / scale` and rescale the coefficients
//! afterwards (`c_k = a_k / scale^k`).
//!
//! Implementation choices:
//! - SVD solve (robust for square and tall systems alike; nalgebra's `QR::solve`
//!   is meant for square systems only).
//! - Progressively looser singular-value tolerances before giving up.

use nalgebra::{DMatrix, DVector};

use crate::math::poly::Polynomial;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit a degree-`degree` polynomial through `(xs[i], ys[i])`.
///
/// With exactly `degree + 1` distinct abscissae this is interpolation.
pub fn fit_polynomial(xs: &[f64], ys: &[f64], degree: usize) -> Option<Polynomial> {
    if xs.len() != ys.len() || xs.len() < degree + 1 {
        return None;
    }
    let scale = xs.iter().fold(0.0_f64, |a, x| a.max(x.abs())).max(1.0);

    let n = xs.len();
    let mut design = DMatrix::<f64>::zeros(n, degree + 1);
    for (i, &x) in xs.iter().enumerate() {
        let t = x / scale;
        let mut tk = 1.0;
        for k in 0..=degree {
            design[(i, k)] = tk;
            tk *= t;
        }
    }
    let rhs = DVector::from_column_slice(ys);

    let a = solve_least_squares(&design, &rhs)?;
    let mut inv_scale_k = 1.0;
    let coeffs = a
        .iter()
        .map(|&ak| {
            let ck = ak * inv_scale_k;
            inv_scale_k /= scale;
            ck
        })
        .collect();
    Some(Polynomial::new(coeffs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn interpolates_cubic_dispersion_through_anchors() {
        let truth = Polynomial::new(vec![4000.0, 2.1, -3e-5, 4e-9]);
        let xs = [0.0, 1365.0, 2730.0, 4095.0];
        let ys: Vec<f64> = xs.iter().map(|&x| truth.eval(x)).collect();
        let fit = fit_polynomial(&xs, &ys, 3).unwrap();
        for &x in &[0.0, 1000.0, 2048.0, 4095.0] {
            assert!((fit.eval(x) - truth.eval(x)).abs() < 1e-6);
        }
    }
}
