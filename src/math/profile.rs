//! Instrumental line profile: a top-hat slit of width `w` convolved with a
//! Gaussian of standard deviation `σ`, integrated over unit-width pixels.
//!
//! With `E(x) = ∫ erf(x / (σ√2)) dx = x·erf(x / (σ√2)) + σ·√(2/π)·exp(-x² / 2σ²)`
//! the flux falling into a pixel whose centre lies `d` pixels from the line is
//!
//! ```text
//! P(d) = [E(d + ½ + w/2) - E(d - ½ + w/2) - E(d + ½ - w/2) + E(d - ½ - w/2)] / (2w)
//! ```
//!
//! which sums to one over all pixels. Linear parts of the Gaussian CDF cancel
//! exactly in the second difference, so only the `erf` antiderivative is needed.

use std::f64::consts::{FRAC_2_PI, SQRT_2};

use statrs::function::erf::erf;

/// `σ = FWHM · SIG_PER_FWHM` for a Gaussian.
pub const SIG_PER_FWHM: f64 = 0.424_660_900_144_009_5;

/// Standard deviation of a Gaussian with the given FWHM.
pub fn sigma_from_fwhm(fwhm: f64) -> f64 {
    fwhm * SIG_PER_FWHM
}

/// Default truncation radius (pixels) for a slit/FWHM pair: half the slit plus 5σ.
pub fn default_truncation(slit_width: f64, fwhm: f64) -> f64 {
    0.5 * slit_width + 5.0 * sigma_from_fwhm(fwhm)
}

/// Antiderivative of `erf(x / (σ√2))`.
pub fn erf_antideriv(x: f64, sigma: f64) -> f64 {
    x * erf(x / (sigma * SQRT_2)) + sigma * FRAC_2_PI.sqrt() * (-0.5 * x * x / (sigma * sigma)).exp()
}

/// Fraction of a unit line falling into the pixel centred `d` pixels away.
pub fn pixel_profile(d: f64, slit_width: f64, sigma: f64) -> f64 {
    let hw = 0.5 * slit_width;
    let value = erf_antideriv(d + 0.5 + hw, sigma) - erf_antideriv(d - 0.5 + hw, sigma)
        - erf_antideriv(d + 0.5 - hw, sigma)
        + erf_antideriv(d - 0.5 - hw, sigma);
    (value / (2.0 * slit_width)).max(0.0)
}

/// Symmetric pixel kernel `[P(0), P(1), ..., P(n-1)]` with `n = 1 + ⌊truncation⌋`.
pub fn profile_kernel(slit_width: f64, fwhm: f64, truncation: f64) -> Vec<f64> {
    let sigma = sigma_from_fwhm(fwhm);
    let n = 1 + truncation.max(0.0).floor() as usize;
    (0..n).map(|d| pixel_profile(d as f64, slit_width, sigma)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_integrates_to_one() {
        for &(w, fwhm) in &[(1.0, 1.0), (2.0, 2.5), (0.3, 4.0), (5.0, 0.8)] {
            let sigma = sigma_from_fwhm(fwhm);
            for &offset in &[0.0, 0.3, 0.5] {
                let total: f64 = (-60..=60)
                    .map(|k| pixel_profile(k as f64 - offset, w, sigma))
                    .sum();
                assert!((total - 1.0).abs() < 1e-9, "w={w} fwhm={fwhm} total={total}");
            }
        }
    }

    #[test]
    fn profile_is_symmetric_and_peaked() {
        let sigma = sigma_from_fwhm(2.0);
        let p0 = pixel_profile(0.0, 2.0, sigma);
        let p1 = pixel_profile(1.0, 2.0, sigma);
        let m1 = pixel_profile(-1.0, 2.0, sigma);
        assert!((p1 - m1).abs() < 1e-14);
        assert!(p0 > p1);
    }

    #[test]
    fn kernel_length_follows_truncation() {
        let k = profile_kernel(2.0, 2.0, 4.7);
        assert_eq!(k.len(), 5);
        assert!(k.windows(2).all(|w| w[0] >= w[1]));
    }
}
