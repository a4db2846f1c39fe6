//! All roots of a univariate polynomial.
//!
//! Output layout (`RootSet`): the real roots in ascending order, followed by one
//! `(re, im)` pair per complex-conjugate pair with `im > 0`. The total number of
//! stored values always equals the degree.
//!
//! Strategy:
//! - zero roots are factored out first (`c_0 = c_1 = ... = 0`)
//! - degrees 1..=4 are solved in closed form
//! - higher degrees locate one real root, deflate, and recurse
//!
//! Numerical notes:
//! - The textbook discriminant test is unreliable near multiple roots. For the
//!   quadratic and the cubic we therefore evaluate every algebraically applicable
//!   branch and keep the one whose roots have the smallest residual `|p(x)|`.
//! - Branches whose residuals are equal to within rounding are ranked by how
//!   many real roots they give, so an exact double root never comes back as a
//!   complex pair with an imaginary part of order `sqrt(eps)`. The same test is
//!   applied to every finished solution: a pair whose real part is already a
//!   root to working precision is a double real root.
//! - Where a root can be computed either directly or as "constant term divided by
//!   the product of the others" we compute both and keep the one with the smaller
//!   residual, which sidesteps cancellation in either formula.
//! - The quartic goes through a resolvent cubic whose largest real root is
//!   positive whenever the depressed linear term is non-zero, giving two real
//!   quadratic factors.

use std::f64::consts::PI;

use log::warn;
use nalgebra::Complex;

use crate::error::{CalibError, CalibResult};
use crate::math::poly::Polynomial;

/// Iteration cap for a single Newton run in the deflation phase.
const NEWTON_MAX_ITER: usize = 100;

/// Iteration cap for the bracketed (bisection + Newton) search.
const BRACKET_MAX_ITER: usize = 300;

/// Number of extra seeded guesses tried before giving up on a real root.
const MAX_SEED_RETRIES: usize = 4;

/// Residuals within this many rounding units of each other are treated as equal.
const ROUNDING_SLACK: f64 = 64.0;

/// Roots of a polynomial in the packed real-then-complex layout.
#[derive(Debug, Clone, PartialEq)]
pub struct RootSet {
    values: Vec<f64>,
    n_real: usize,
}

impl RootSet {
    /// Number of real roots (counted with multiplicity).
    pub fn n_real(&self) -> usize {
        self.n_real
    }

    /// Degree of the solved polynomial.
    pub fn degree(&self) -> usize {
        self.values.len()
    }

    /// Real roots, ascending.
    pub fn real(&self) -> &[f64] {
        &self.values[..self.n_real]
    }

    /// Complex-conjugate pairs as `(re, im)` with `im > 0`.
    pub fn complex_pairs(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.values[self.n_real..].chunks_exact(2).map(|c| (c[0], c[1]))
    }

    /// The packed layout.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

/// Solve `p(x) = 0` for all `degree(p)` roots.
pub fn solve_all_roots(poly: &Polynomial) -> CalibResult<RootSet> {
    let mut values = vec![0.0; poly.degree()];
    let n_real = solve_all_roots_into(poly, &mut values)?;
    Ok(RootSet { values, n_real })
}

/// Solve into a caller buffer whose length must equal the degree.
///
/// Returns the number of real roots written at the front of `roots`.
pub fn solve_all_roots_into(poly: &Polynomial, roots: &mut [f64]) -> CalibResult<usize> {
    let degree = poly.degree();
    if degree == 0 {
        return Err(CalibError::DataNotFound(
            "a polynomial of degree 0 has no roots".to_string(),
        ));
    }
    if roots.len() != degree {
        return Err(CalibError::IncompatibleInput(format!(
            "root buffer has length {} but the polynomial has degree {degree}",
            roots.len()
        )));
    }

    let split = solve(&poly.trimmed())?;
    debug_assert_eq!(split.real.len() + 2 * split.complex.len(), degree);

    let n_real = split.real.len();
    roots[..n_real].copy_from_slice(&split.real);
    for (i, &(re, im)) in split.complex.iter().enumerate() {
        roots[n_real + 2 * i] = re;
        roots[n_real + 2 * i + 1] = im;
    }
    Ok(n_real)
}

/// Working representation: real roots and complex pairs kept apart.
#[derive(Debug, Clone, Default)]
struct Split {
    real: Vec<f64>,
    complex: Vec<(f64, f64)>,
}

impl Split {
    fn reals(real: Vec<f64>) -> Self {
        Self {
            real,
            complex: Vec::new(),
        }
    }

    fn translate(mut self, offset: f64) -> Self {
        for r in &mut self.real {
            *r += offset;
        }
        for c in &mut self.complex {
            c.0 += offset;
        }
        self
    }

    fn merge(mut self, other: Split) -> Self {
        self.real.extend(other.real);
        self.complex.extend(other.complex);
        self
    }

    fn sorted(mut self) -> Self {
        self.real.sort_by(f64::total_cmp);
        self.complex
            .sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        self
    }
}

/// A candidate solution together with its worst residual.
struct Branch {
    split: Split,
    residual: f64,
    /// Rounding error expected when evaluating the polynomial at these roots.
    noise: f64,
}

impl Branch {
    fn new(poly: &Polynomial, split: Split) -> Self {
        let residual = max_residual(poly, &split);
        let noise = split
            .real
            .iter()
            .map(|x| x.abs())
            .chain(split.complex.iter().map(|&(re, im)| re.hypot(im)))
            .map(|m| rounding_noise(poly, m))
            .fold(0.0, f64::max);
        Self { split, residual, noise }
    }
}

/// Keep the most real branch among those whose residual is indistinguishable
/// from the best one; smaller residuals, then earlier branches, break ties.
fn pick(branches: Vec<Branch>) -> Split {
    let best = branches
        .iter()
        .map(|b| b.residual)
        .filter(|r| !r.is_nan())
        .fold(f64::INFINITY, f64::min);

    let mut chosen: Option<Branch> = None;
    let mut first: Option<Branch> = None;
    for b in branches {
        if !(b.residual <= ROUNDING_SLACK * best.max(b.noise)) {
            if first.is_none() {
                first = Some(b);
            }
            continue;
        }
        let replace = match &chosen {
            None => true,
            Some(cur) => {
                let (n, m) = (b.split.real.len(), cur.split.real.len());
                n > m || (n == m && b.residual < cur.residual)
            }
        };
        if replace {
            chosen = Some(b);
        }
    }
    chosen.or(first).map(|b| b.split).unwrap_or_default()
}

fn max_residual(poly: &Polynomial, split: &Split) -> f64 {
    let real = split.real.iter().map(|&x| poly.eval(x).abs());
    let complex = split
        .complex
        .iter()
        .map(|&(re, im)| poly.eval_complex(Complex::new(re, im)).norm());
    real.chain(complex).fold(0.0, f64::max)
}

/// `Σ |c_k| m^k`, the scale of the terms summed when evaluating at `|x| = m`.
fn term_scale(poly: &Polynomial, magnitude: f64) -> f64 {
    poly.coeffs().iter().rev().fold(0.0, |acc, c| acc * magnitude + c.abs())
}

/// Rounding error expected in `p(x)` for `|x| = m`.
fn rounding_noise(poly: &Polynomial, magnitude: f64) -> f64 {
    f64::EPSILON * term_scale(poly, magnitude)
}

/// Replace each complex pair that is a double real root to working precision
/// by that root, twice.
fn settle_near_real_pairs(poly: &Polynomial, split: &mut Split) {
    if split.complex.is_empty() || poly.degree() < 2 {
        return;
    }
    let slope = poly.derivative();
    let mut pairs = Vec::with_capacity(split.complex.len());
    for (re, im) in std::mem::take(&mut split.complex) {
        match double_root_near(poly, &slope, re) {
            Some(x) => split.real.extend([x, x]),
            None => pairs.push((re, im)),
        }
    }
    split.complex = pairs;
}

/// A point near `re` where both `p` and `p'` vanish to working precision.
///
/// A double root of `p` is a simple root of `p'`, so Newton on `p'` pins it
/// down far better than the `sqrt(eps)` accuracy of the pair itself.
fn double_root_near(poly: &Polynomial, slope: &Polynomial, re: f64) -> Option<f64> {
    let mut x = re;
    let mut flatness = slope.eval(x).abs();
    for _ in 0..4 {
        let (d1, d2) = slope.eval_with_derivative(x);
        if d1 == 0.0 || d2 == 0.0 {
            break;
        }
        let next = x - d1 / d2;
        let next_flatness = slope.eval(next).abs();
        if !(next_flatness < flatness) {
            break;
        }
        x = next;
        flatness = next_flatness;
    }

    let m = x.abs();
    let on_root = poly.eval(x).abs() <= ROUNDING_SLACK * rounding_noise(poly, m);
    let flat = flatness <= (ROUNDING_SLACK * f64::EPSILON).sqrt() * term_scale(slope, m);
    (on_root && flat).then_some(x)
}

/// Of two estimates of the same root keep the one with the smaller residual.
fn better_of(poly: &Polynomial, a: f64, b: f64) -> f64 {
    if !b.is_finite() {
        return a;
    }
    if poly.eval(b).abs() < poly.eval(a).abs() { b } else { a }
}

fn sign_nonzero(x: f64) -> f64 {
    if x < 0.0 { -1.0 } else { 1.0 }
}

/// Dispatch a trimmed polynomial (degree >= 1).
fn solve(poly: &Polynomial) -> CalibResult<Split> {
    let c = poly.coeffs();
    let n_zero = c.iter().position(|&v| v != 0.0).unwrap_or(0);
    let reduced = Polynomial::new(c[n_zero..].to_vec());
    let r = reduced.coeffs();

    let mut split = match reduced.degree() {
        0 => Split::default(),
        1 => Split::reals(vec![-r[0] / r[1]]),
        2 => quadratic(r[0], r[1], r[2]),
        3 => cubic(r[0], r[1], r[2], r[3]),
        4 => quartic(&reduced)?,
        _ => deflation(&reduced)?,
    };

    settle_near_real_pairs(&reduced, &mut split);
    split.real.extend(std::iter::repeat_n(0.0, n_zero));
    Ok(split.sorted())
}

/// `c2 x² + c1 x + c0` with `c0 != 0`, `c2 != 0`.
fn quadratic(c0: f64, c1: f64, c2: f64) -> Split {
    let b = c1 / c2;
    let c = c0 / c2;
    let monic = Polynomial::new(vec![c, b, 1.0]);
    let disc = b * b - 4.0 * c;

    let mut branches = Vec::with_capacity(3);

    if disc >= 0.0 {
        // Larger root by formula, smaller one by division (no cancellation).
        let q = -0.5 * (b + sign_nonzero(b) * disc.sqrt());
        if q != 0.0 {
            branches.push(Branch::new(&monic, Split::reals(vec![q, c / q])));
        }
    }

    let xd = -0.5 * b;
    branches.push(Branch::new(&monic, Split::reals(vec![xd, xd])));

    if disc < 0.0 {
        let im = 0.5 * (-disc).sqrt();
        branches.push(Branch::new(
            &monic,
            Split {
                real: Vec::new(),
                complex: vec![(xd, im)],
            },
        ));
    }

    pick(branches)
}

/// `c3 x³ + c2 x² + c1 x + c0` with `c0 != 0`, `c3 != 0`.
fn cubic(c0: f64, c1: f64, c2: f64, c3: f64) -> Split {
    let b = c2 / c3;
    let c = c1 / c3;
    let d = c0 / c3;
    let monic = Polynomial::new(vec![d, c, b, 1.0]);

    // Depressed cubic t³ + p t + q with x = t - s.
    let s = b / 3.0;
    let p = c - b * s;
    let q = d - s * c + 2.0 * s * s * s;

    let mut branches = Vec::with_capacity(4);

    // Three real roots (trigonometric form).
    if p < 0.0 {
        let m = 2.0 * (-p / 3.0).sqrt();
        let arg = (3.0 * q / (p * m)).clamp(-1.0, 1.0);
        let theta = arg.acos() / 3.0;
        let mut x: Vec<f64> = (0..3)
            .map(|k| m * (theta - 2.0 * PI * k as f64 / 3.0).cos() - s)
            .collect();
        // The smallest-magnitude root is the one exposed to cancellation.
        x.sort_by(|a, b| b.abs().total_cmp(&a.abs()));
        let prod = x[0] * x[1];
        if prod != 0.0 {
            x[2] = better_of(&monic, x[2], -d / prod);
        }
        branches.push(Branch::new(&monic, Split::reals(x)));
    }

    // A double root at either end of the depressed cubic: t_d = ±sqrt(-p/3),
    // simple root t_s = -2 t_d.
    if p <= 0.0 {
        let r = (-p / 3.0).sqrt();
        for sign in [1.0, -1.0] {
            let xd = sign * r - s;
            let mut xs = -2.0 * sign * r - s;
            if xd != 0.0 {
                xs = better_of(&monic, xs, -d / (xd * xd));
            }
            branches.push(Branch::new(&monic, Split::reals(vec![xd, xd, xs])));
        }
    }

    // One real root plus a complex pair (Cardano).
    let disc = 0.25 * q * q + p * p * p / 27.0;
    if disc >= 0.0 {
        let u = -sign_nonzero(q) * (0.5 * q.abs() + disc.sqrt()).cbrt();
        let v = if u != 0.0 { -p / (3.0 * u) } else { 0.0 };
        let re = -0.5 * (u + v) - s;
        let im = 0.5 * 3.0_f64.sqrt() * (u - v).abs();
        let mut x1 = u + v - s;
        let modulus2 = re * re + im * im;
        if modulus2 != 0.0 {
            x1 = better_of(&monic, x1, -d / modulus2);
        }
        let split = if im > 0.0 {
            Split {
                real: vec![x1],
                complex: vec![(re, im)],
            }
        } else {
            Split::reals(vec![x1, re, re])
        };
        branches.push(Branch::new(&monic, split));
    }

    pick(branches)
}

/// Quartic with non-zero constant term.
fn quartic(poly: &Polynomial) -> CalibResult<Split> {
    let c = poly.coeffs();
    let lead = c[4];
    let b = c[3] / lead;
    let cc = c[2] / lead;
    let d = c[1] / lead;
    let e = c[0] / lead;
    let monic = Polynomial::new(vec![e, d, cc, b, 1.0]);

    // Depressed quartic y⁴ + p y² + q y + r with x = y - s.
    let s = 0.25 * b;
    let s2 = s * s;
    let p = cc - 6.0 * s2;
    let q = d - 2.0 * s * cc + 8.0 * s2 * s;
    let r = e - s * d + s2 * cc - 3.0 * s2 * s2;

    let depressed = if q == 0.0 {
        biquadratic(p, r)?
    } else if r == 0.0 {
        // y (y³ + p y + q)
        let cubic_part = solve(&Polynomial::new(vec![q, p, 0.0, 1.0]))?;
        Split::reals(vec![0.0]).merge(cubic_part)
    } else {
        match ferrari(p, q, r)? {
            Some(split) => split,
            None => {
                warn!("quartic resolvent gave no positive root; falling back to deflation");
                return deflation(poly);
            }
        }
    };

    let mut split = depressed.translate(-s);
    for x in &mut split.real {
        *x = polish(&monic, *x);
    }
    Ok(split)
}

/// `y⁴ + p y² + r` through `z = y²`.
fn biquadratic(p: f64, r: f64) -> CalibResult<Split> {
    let z = solve(&Polynomial::new(vec![r, p, 1.0]))?;
    let mut out = Split::default();
    for &zr in &z.real {
        if zr >= 0.0 {
            let y = zr.sqrt();
            out.real.push(y);
            out.real.push(-y);
        } else {
            out.complex.push((0.0, (-zr).sqrt()));
        }
    }
    for &(zr, zi) in &z.complex {
        let w = Complex::new(zr, zi).sqrt();
        out.complex.push((w.re, w.im.abs()));
        out.complex.push((-w.re, w.im.abs()));
    }
    Ok(out)
}

/// Factor `y⁴ + p y² + q y + r` (q, r non-zero) into two real quadratics.
///
/// Returns `None` if the resolvent cubic yields no positive root.
fn ferrari(p: f64, q: f64, r: f64) -> CalibResult<Option<Split>> {
    let resolvent = Polynomial::new(vec![-q * q, p * p - 4.0 * r, 2.0 * p, 1.0]);
    let roots = solve(&resolvent)?;
    let Some(m) = roots.real.iter().copied().reduce(f64::max) else {
        return Ok(None);
    };
    if !(m > 0.0) {
        return Ok(None);
    }

    let sq = m.sqrt();
    let t = 0.5 * (p + m - q / sq);
    let u = 0.5 * (p + m + q / sq);
    let first = solve(&Polynomial::new(vec![t, sq, 1.0]))?;
    let second = solve(&Polynomial::new(vec![u, -sq, 1.0]))?;
    Ok(Some(first.merge(second)))
}

/// Degree >= 5: find one real root, deflate, recurse.
fn deflation(poly: &Polynomial) -> CalibResult<Split> {
    let root = find_real_root(poly)?;
    let quotient = poly.deflate(root);
    let mut split = solve(&quotient)?;
    for x in &mut split.real {
        *x = polish(poly, *x);
    }
    split.real.push(root);
    Ok(split)
}

/// Locate one real root: arithmetic-mean guess, geometric-mean guesses,
/// sign-change bracketing, then a few seeded retries.
fn find_real_root(poly: &Polynomial) -> CalibResult<f64> {
    let c = poly.coeffs();
    let n = poly.degree();
    let lead = c[n];

    let mean = -c[n - 1] / (n as f64 * lead);
    let geo = (c[0] / lead).abs().powf(1.0 / n as f64);
    let bound = 1.0
        + c[..n]
            .iter()
            .map(|&ck| (ck / lead).abs())
            .fold(0.0, f64::max);

    let mut last_err = None;
    for guess in [mean, geo, -geo] {
        match newton(poly, guess) {
            Ok(x) => return Ok(polish(poly, x)),
            Err(e) => last_err = Some(e),
        }
    }

    let mut checkpoints = vec![-bound, -geo, mean, geo, bound];
    checkpoints.sort_by(f64::total_cmp);
    checkpoints.dedup();
    for w in checkpoints.windows(2) {
        let (fa, fb) = (poly.eval(w[0]), poly.eval(w[1]));
        if fa == 0.0 {
            return Ok(w[0]);
        }
        if fa.signum() != fb.signum() {
            return Ok(polish(poly, bracketed(poly, w[0], w[1])));
        }
    }

    for k in 1..=MAX_SEED_RETRIES {
        let offset = bound * k as f64 / (MAX_SEED_RETRIES + 1) as f64;
        for guess in [mean + offset, mean - offset] {
            match newton(poly, guess) {
                Ok(x) => return Ok(polish(poly, x)),
                Err(e) => last_err = Some(e),
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        CalibError::Continue(format!("no real root located for a degree {n} polynomial"))
    }))
}

fn newton(poly: &Polynomial, x0: f64) -> CalibResult<f64> {
    let mut x = x0;
    for _ in 0..NEWTON_MAX_ITER {
        let (v, d) = poly.eval_with_derivative(x);
        if v == 0.0 {
            return Ok(x);
        }
        if d == 0.0 {
            return Err(CalibError::DivisionByZero(format!(
                "zero derivative at x={x} during Newton refinement"
            )));
        }
        let dx = v / d;
        x -= dx;
        if !x.is_finite() {
            return Err(CalibError::Continue(format!(
                "Newton refinement from x={x0} diverged"
            )));
        }
        if dx.abs() <= 4.0 * f64::EPSILON * x.abs() + f64::MIN_POSITIVE {
            return Ok(x);
        }
    }
    Err(CalibError::Continue(format!(
        "Newton refinement from x={x0} did not converge in {NEWTON_MAX_ITER} iterations"
    )))
}

/// Bisection safeguarded Newton on a sign-change bracket.
fn bracketed(poly: &Polynomial, a: f64, b: f64) -> f64 {
    let (mut lo, mut hi) = if poly.eval(a) < 0.0 { (a, b) } else { (b, a) };
    let mut x = 0.5 * (lo + hi);
    for _ in 0..BRACKET_MAX_ITER {
        let (v, d) = poly.eval_with_derivative(x);
        if v == 0.0 {
            return x;
        }
        if v < 0.0 {
            lo = x;
        } else {
            hi = x;
        }
        let newton_x = if d != 0.0 { x - v / d } else { f64::NAN };
        let inside = newton_x.is_finite() && (newton_x - lo) * (newton_x - hi) < 0.0;
        let next = if inside { newton_x } else { 0.5 * (lo + hi) };
        if (next - x).abs() <= 4.0 * f64::EPSILON * next.abs() {
            return next;
        }
        x = next;
    }
    x
}

/// A few Newton steps, each kept only if it lowers the residual.
fn polish(poly: &Polynomial, x: f64) -> f64 {
    let mut best = x;
    let mut best_res = poly.eval(x).abs();
    for _ in 0..3 {
        let (v, d) = poly.eval_with_derivative(best);
        if v == 0.0 || d == 0.0 {
            break;
        }
        let cand = best - v / d;
        let res = poly.eval(cand).abs();
        if res < best_res {
            best = cand;
            best_res = res;
        } else {
            break;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_real_roots(set: &RootSet, expected: &[f64], tol: f64) {
        assert_eq!(set.n_real(), expected.len(), "real count: {:?}", set.as_slice());
        for (got, want) in set.real().iter().zip(expected) {
            assert!((got - want).abs() < tol, "root {got} vs {want} ({:?})", set.as_slice());
        }
        for w in set.real().windows(2) {
            assert!(w[0] <= w[1], "real roots must ascend: {:?}", set.real());
        }
    }

    fn assert_small_residuals(poly: &Polynomial, set: &RootSet, eps: f64) {
        let scale = poly.coeffs().iter().fold(0.0_f64, |a, c| a.max(c.abs()));
        for &x in set.real() {
            assert!(poly.eval(x).abs() < eps * scale, "p({x}) = {}", poly.eval(x));
        }
        for (re, im) in set.complex_pairs() {
            assert!(im > 0.0);
            let v = poly.eval_complex(Complex::new(re, im)).norm();
            assert!(v < eps * scale, "|p({re}+{im}i)| = {v}");
        }
    }

    #[test]
    fn degree_zero_has_no_roots() {
        let err = solve_all_roots(&Polynomial::new(vec![3.0])).unwrap_err();
        assert!(matches!(err, CalibError::DataNotFound(_)));
    }

    #[test]
    fn buffer_length_must_match_degree() {
        let p = Polynomial::new(vec![1.0, 2.0, 1.0]);
        let mut buf = [0.0; 3];
        let err = solve_all_roots_into(&p, &mut buf).unwrap_err();
        assert!(matches!(err, CalibError::IncompatibleInput(_)));
    }

    #[test]
    fn linear_root() {
        let set = solve_all_roots(&Polynomial::new(vec![-6.0, 2.0])).unwrap();
        assert_real_roots(&set, &[3.0], 1e-15);
    }

    #[test]
    fn quadratic_real_complex_and_double() {
        let p = Polynomial::from_roots(&[-3.0, 7.5], &[], 2.0);
        assert_real_roots(&solve_all_roots(&p).unwrap(), &[-3.0, 7.5], 1e-12);

        let p = Polynomial::from_roots(&[], &[(1.5, 0.25)], -1.0);
        let set = solve_all_roots(&p).unwrap();
        assert_eq!(set.n_real(), 0);
        let (re, im) = set.complex_pairs().next().unwrap();
        assert!((re - 1.5).abs() < 1e-12 && (im - 0.25).abs() < 1e-12);

        let p = Polynomial::from_roots(&[0.5, 0.5], &[], 1.0);
        let set = solve_all_roots(&p).unwrap();
        assert_real_roots(&set, &[0.5, 0.5], 1e-15);
    }

    #[test]
    fn quadratic_with_widely_separated_roots_keeps_small_root() {
        let p = Polynomial::from_roots(&[1e-6, 1e6], &[], 1.0);
        let set = solve_all_roots(&p).unwrap();
        assert!((set.real()[0] - 1e-6).abs() < 1e-18);
        assert!((set.real()[1] - 1e6).abs() < 1e-6);
    }

    #[test]
    fn cubic_branches() {
        let p = Polynomial::from_roots(&[-2.0, 0.5, 4.0], &[], 3.0);
        assert_real_roots(&solve_all_roots(&p).unwrap(), &[-2.0, 0.5, 4.0], 1e-10);

        let p = Polynomial::from_roots(&[2.0], &[(-1.0, 3.0)], 1.0);
        let set = solve_all_roots(&p).unwrap();
        assert_real_roots(&set, &[2.0], 1e-10);
        let (re, im) = set.complex_pairs().next().unwrap();
        assert!((re + 1.0).abs() < 1e-10 && (im - 3.0).abs() < 1e-10);

        let p = Polynomial::from_roots(&[1.0, 1.0, -2.5], &[], 1.0);
        let set = solve_all_roots(&p).unwrap();
        assert_real_roots(&set, &[-2.5, 1.0, 1.0], 1e-7);
        assert_small_residuals(&p, &set, 1e-12);

        let p = Polynomial::from_roots(&[3.0, 3.0, -6.5], &[], 1.0);
        assert_real_roots(&solve_all_roots(&p).unwrap(), &[-6.5, 3.0, 3.0], 1e-7);

        // Triple root.
        let p = Polynomial::from_roots(&[0.75, 0.75, 0.75], &[], 1.0);
        let set = solve_all_roots(&p).unwrap();
        assert_eq!(set.n_real(), 3);
        assert_small_residuals(&p, &set, 1e-12);
    }

    #[test]
    fn quartic_cases() {
        let p = Polynomial::from_roots(&[-3.0, -1.0, 2.0, 5.0], &[], 1.5);
        assert_real_roots(&solve_all_roots(&p).unwrap(), &[-3.0, -1.0, 2.0, 5.0], 1e-9);

        let p = Polynomial::from_roots(&[-1.0, 4.0], &[(2.0, 1.0)], 1.0);
        let set = solve_all_roots(&p).unwrap();
        assert_real_roots(&set, &[-1.0, 4.0], 1e-9);
        assert_small_residuals(&p, &set, 1e-10);

        let p = Polynomial::from_roots(&[], &[(1.0, 2.0), (-0.5, 0.5)], 1.0);
        let set = solve_all_roots(&p).unwrap();
        assert_eq!(set.n_real(), 0);
        assert_eq!(set.complex_pairs().count(), 2);
        assert_small_residuals(&p, &set, 1e-10);
    }

    #[test]
    fn double_roots_stay_real() {
        let p = Polynomial::from_roots(&[-1.75, -1.75, 8.25, -2.0], &[], 1.0);
        assert_real_roots(&solve_all_roots(&p).unwrap(), &[-2.0, -1.75, -1.75, 8.25], 1e-7);

        let p = Polynomial::from_roots(&[0.5, 0.5], &[(-1.0, 2.0)], 3.0);
        let set = solve_all_roots(&p).unwrap();
        assert_real_roots(&set, &[0.5, 0.5], 1e-7);
        assert_eq!(set.complex_pairs().count(), 1);
        assert_small_residuals(&p, &set, 1e-10);

        let doubles = [-3.0, -1.75, 0.25, 1.0, 2.5];
        let others = [-6.5, -2.0, 0.75, 4.0, 8.25];
        for &d in &doubles {
            for &a in &others {
                let p = Polynomial::from_roots(&[d, d, a], &[], 1.0);
                let mut want = vec![d, d, a];
                want.sort_by(f64::total_cmp);
                assert_real_roots(&solve_all_roots(&p).unwrap(), &want, 1e-6);

                for &b in others.iter().filter(|&&b| b != a) {
                    let p = Polynomial::from_roots(&[d, d, a, b], &[], 1.0);
                    let mut want = vec![d, d, a, b];
                    want.sort_by(f64::total_cmp);
                    assert_real_roots(&solve_all_roots(&p).unwrap(), &want, 1e-6);
                }
            }
        }
    }

    #[test]
    fn a_real_root_under_a_complex_pair_is_not_merged() {
        // (x - 2)((x - 2)² + 1): p(2) = 0 but p'(2) = 1.
        let p = Polynomial::from_roots(&[2.0], &[(2.0, 1.0)], 1.0);
        let set = solve_all_roots(&p).unwrap();
        assert_real_roots(&set, &[2.0], 1e-10);
        let (re, im) = set.complex_pairs().next().unwrap();
        assert!((re - 2.0).abs() < 1e-10 && (im - 1.0).abs() < 1e-10);
    }

    #[test]
    fn quartic_special_forms() {
        // Depressed biquadratic: y⁴ - 5y² + 4.
        let p = Polynomial::new(vec![4.0, 0.0, -5.0, 0.0, 1.0]);
        assert_real_roots(&solve_all_roots(&p).unwrap(), &[-2.0, -1.0, 1.0, 2.0], 1e-12);

        // Depressed constant term zero: roots {-s, ...} after the shift.
        let p = Polynomial::from_roots(&[0.0, 1.0, 2.0, -3.0], &[], 1.0).shifted(-1.0);
        let set = solve_all_roots(&p).unwrap();
        assert_real_roots(&set, &[-2.0, 1.0, 2.0, 3.0], 1e-10);
    }

    #[test]
    fn zero_roots_are_factored_out() {
        // x² (x - 3)
        let p = Polynomial::new(vec![0.0, 0.0, -3.0, 1.0]);
        assert_real_roots(&solve_all_roots(&p).unwrap(), &[0.0, 0.0, 3.0], 1e-15);
    }

    #[test]
    fn degree_six_by_deflation() {
        let roots = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let p = Polynomial::from_roots(&roots, &[], 1.0);
        let set = solve_all_roots(&p).unwrap();
        assert_real_roots(&set, &roots, 1e-6);
    }

    #[test]
    fn degree_six_with_a_double_root() {
        let roots = [1.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let p = Polynomial::from_roots(&roots, &[], 1.0);
        let set = solve_all_roots(&p).unwrap();
        assert_real_roots(&set, &roots, 1e-5);
    }

    #[test]
    fn degree_five_mixed_roots() {
        let p = Polynomial::from_roots(&[-4.0, 0.5, 3.0], &[(1.0, 1.0)], 2.0);
        let set = solve_all_roots(&p).unwrap();
        assert_real_roots(&set, &[-4.0, 0.5, 3.0], 1e-7);
        assert_small_residuals(&p, &set, 1e-8);
    }
}
