//! Univariate polynomials with `f64` coefficients.
//!
//! A dispersion relation is stored as `p(x) = Σ c_k x^k` with `c_0` first. The
//! calibration code mutates polynomials in place (shifting, setting individual
//! coefficients) and duplicates them before any destructive operation.

use nalgebra::Complex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

impl Polynomial {
    /// Build from coefficients `c_0..c_d`. An empty slice is the zero polynomial.
    pub fn new(coeffs: Vec<f64>) -> Self {
        if coeffs.is_empty() {
            return Self::zero();
        }
        Self { coeffs }
    }

    pub fn zero() -> Self {
        Self { coeffs: vec![0.0] }
    }

    /// Build `leading · Π (x - r) · Π (x² - 2·re·x + re² + im²)`.
    pub fn from_roots(real: &[f64], complex_pairs: &[(f64, f64)], leading: f64) -> Self {
        let mut coeffs = vec![leading];
        for &r in real {
            coeffs = multiply(&coeffs, &[-r, 1.0]);
        }
        for &(re, im) in complex_pairs {
            coeffs = multiply(&coeffs, &[re * re + im * im, -2.0 * re, 1.0]);
        }
        Self { coeffs }
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    /// Coefficient of `x^k` (zero past the stored length).
    pub fn coeff(&self, k: usize) -> f64 {
        self.coeffs.get(k).copied().unwrap_or(0.0)
    }

    /// Set the coefficient of `x^k`, growing the storage if needed.
    pub fn set_coeff(&mut self, k: usize, value: f64) {
        if k >= self.coeffs.len() {
            self.coeffs.resize(k + 1, 0.0);
        }
        self.coeffs[k] = value;
    }

    /// Degree: index of the highest non-zero coefficient (0 for constants and zero).
    pub fn degree(&self) -> usize {
        self.coeffs.iter().rposition(|&c| c != 0.0).unwrap_or(0)
    }

    /// Copy without trailing zero high-order coefficients.
    pub fn trimmed(&self) -> Self {
        Self {
            coeffs: self.coeffs[..=self.degree()].to_vec(),
        }
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }

    /// Evaluate `p(x)` and `p'(x)` in one Horner pass.
    pub fn eval_with_derivative(&self, x: f64) -> (f64, f64) {
        let mut value = 0.0;
        let mut deriv = 0.0;
        for &c in self.coeffs.iter().rev() {
            deriv = deriv * x + value;
            value = value * x + c;
        }
        (value, deriv)
    }

    pub fn eval_complex(&self, z: Complex<f64>) -> Complex<f64> {
        self.coeffs
            .iter()
            .rev()
            .fold(Complex::new(0.0, 0.0), |acc, &c| acc * z + Complex::new(c, 0.0))
    }

    pub fn derivative(&self) -> Self {
        if self.coeffs.len() <= 1 {
            return Self::zero();
        }
        let coeffs = self
            .coeffs
            .iter()
            .enumerate()
            .skip(1)
            .map(|(k, &c)| c * k as f64)
            .collect();
        Self { coeffs }
    }

    /// `q(x) = p(x + s)` (Taylor shift).
    pub fn shifted(&self, s: f64) -> Self {
        let mut a = self.coeffs.clone();
        let n = a.len() - 1;
        for k in 0..n {
            for j in (k..n).rev() {
                a[j] += s * a[j + 1];
            }
        }
        Self { coeffs: a }
    }

    /// Quotient of `p(x) / (x - root)`; the remainder is dropped.
    pub fn deflate(&self, root: f64) -> Self {
        let trimmed = self.trimmed();
        let a = &trimmed.coeffs;
        let n = a.len() - 1;
        if n == 0 {
            return Self::zero();
        }
        let mut q = vec![0.0; n];
        q[n - 1] = a[n];
        for k in (1..n).rev() {
            q[k - 1] = a[k] + root * q[k];
        }
        Self { coeffs: q }
    }
}

fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_and_derivative_agree_with_expansion() {
        // p(x) = 1 + 2x + 3x^2
        let p = Polynomial::new(vec![1.0, 2.0, 3.0]);
        let (v, d) = p.eval_with_derivative(2.0);
        assert_eq!(v, 17.0);
        assert_eq!(d, 14.0);
        assert_eq!(p.derivative().coeffs(), &[2.0, 6.0]);
    }

    #[test]
    fn shifted_matches_composition() {
        let p = Polynomial::new(vec![6000.0, 1.5, 2e-4, -1e-8]);
        let q = p.shifted(3.25);
        for &x in &[0.0, 10.0, 511.0, 1023.0] {
            let expected = p.eval(x + 3.25);
            assert!((q.eval(x) - expected).abs() < 1e-8 * expected.abs());
        }
    }

    #[test]
    fn deflate_removes_a_known_root() {
        let p = Polynomial::from_roots(&[1.0, -2.0, 4.0], &[], 2.0);
        let q = p.deflate(4.0);
        assert_eq!(q.degree(), 2);
        assert!(q.eval(1.0).abs() < 1e-12);
        assert!(q.eval(-2.0).abs() < 1e-12);
        assert!((q.coeff(2) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn degree_ignores_trailing_zeros() {
        let p = Polynomial::new(vec![1.0, 0.0, 0.0]);
        assert_eq!(p.degree(), 0);
        assert_eq!(p.trimmed().coeffs(), &[1.0]);
        let mut p = p;
        p.set_coeff(3, 1.0);
        assert_eq!(p.degree(), 3);
    }
}
