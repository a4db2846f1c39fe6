//! Dispersion-relation checks and inversion (wavelength → pixel).

use log::warn;

use crate::error::{CalibError, CalibResult};
use crate::math::{Polynomial, solve_all_roots};

/// Bisection steps used when the closed-form inversion cannot be trusted.
const BISECT_ITER: usize = 200;

/// Verify that `p` is strictly increasing on `[x_min, x_max]`.
///
/// The derivative must be positive at `x_min` and have no real root inside the
/// interval. If the root solver itself fails the derivative is sampled at every
/// pixel instead.
pub fn check_increasing(p: &Polynomial, x_min: f64, x_max: f64) -> CalibResult<()> {
    let d = p.derivative();
    let slope = d.eval(x_min);
    if !(slope > 0.0) {
        return Err(CalibError::IllegalInput(format!(
            "dispersion is not increasing at x = {x_min} (slope {slope})"
        )));
    }
    if d.degree() == 0 {
        return Ok(());
    }

    match solve_all_roots(&d) {
        Ok(roots) => {
            if let Some(&r) = roots.real().iter().find(|&&r| r > x_min && r < x_max) {
                return Err(CalibError::IllegalInput(format!(
                    "dispersion turns over at x = {r:.3} inside [{x_min}, {x_max}]"
                )));
            }
        }
        Err(err) => {
            warn!("derivative roots unavailable ({err}); sampling the slope instead");
            let n = (x_max - x_min).ceil().max(1.0) as usize;
            for i in 0..=n {
                let x = (x_min + i as f64).min(x_max);
                if !(d.eval(x) > 0.0) {
                    return Err(CalibError::IllegalInput(format!(
                        "dispersion is not increasing at x = {x}"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Pixel coordinate `x` in `[x_min, x_max]` with `p(x) = wavelength`.
///
/// `p` must be increasing on the interval (see [`check_increasing`]) and
/// `wavelength` must lie between `p(x_min)` and `p(x_max)`. One Newton step from
/// `guess` picks the branch; the exact value comes from the root solver.
pub fn invert_dispersion(p: &Polynomial, wavelength: f64, guess: f64, x_min: f64, x_max: f64) -> f64 {
    let (value, slope) = p.eval_with_derivative(guess);
    let mut seed = guess;
    if slope > 0.0 {
        seed = (guess + (wavelength - value) / slope).clamp(x_min, x_max);
    }

    if p.degree() == 1 {
        return (wavelength - p.coeff(0)) / p.coeff(1);
    }

    let mut shifted = p.clone();
    shifted.set_coeff(0, p.coeff(0) - wavelength);
    if let Ok(roots) = solve_all_roots(&shifted) {
        let nearest = roots
            .real()
            .iter()
            .copied()
            .filter(|r| *r >= x_min - 0.5 && *r <= x_max + 0.5)
            .min_by(|a, b| (a - seed).abs().total_cmp(&(b - seed).abs()));
        if let Some(x) = nearest {
            return polish(p, wavelength, x);
        }
    }
    bisect(p, wavelength, x_min, x_max)
}

/// Two Newton corrections against rounding in the closed-form roots.
fn polish(p: &Polynomial, wavelength: f64, mut x: f64) -> f64 {
    for _ in 0..2 {
        let (value, slope) = p.eval_with_derivative(x);
        if !(slope > 0.0) {
            break;
        }
        let next = x - (value - wavelength) / slope;
        if !next.is_finite() {
            break;
        }
        x = next;
    }
    x
}

fn bisect(p: &Polynomial, wavelength: f64, mut lo: f64, mut hi: f64) -> f64 {
    for _ in 0..BISECT_ITER {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        if p.eval(mid) < wavelength {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_turnover_inside_range() {
        // p'(x) = 1 - 0.002x vanishes at x = 500.
        let p = Polynomial::new(vec![5000.0, 1.0, -0.001]);
        assert!(check_increasing(&p, 0.0, 400.0).is_ok());
        assert!(matches!(
            check_increasing(&p, 0.0, 1023.0),
            Err(CalibError::IllegalInput(_))
        ));
    }

    #[test]
    fn rejects_decreasing_dispersion() {
        let p = Polynomial::new(vec![5000.0, -1.0]);
        assert!(matches!(
            check_increasing(&p, 0.0, 100.0),
            Err(CalibError::IllegalInput(_))
        ));
    }

    #[test]
    fn inversion_recovers_pixel() {
        let p = Polynomial::new(vec![6000.0, 1.5, 1e-4, 2e-9]);
        for &x in &[-3.0, 0.0, 17.25, 511.5, 1023.0] {
            let wl = p.eval(x);
            let got = invert_dispersion(&p, wl, x + 2.0, -20.0, 1040.0);
            assert!((got - x).abs() < 1e-6, "x={x} got={got}");
        }
    }
}
