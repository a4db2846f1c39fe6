//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed flux / shift correlations: `o`
//! - model spectrum or dispersion curve: `-` line
//! - best shift: `*`

use crate::domain::SolutionFile;
use crate::math::Polynomial;

/// Overlay the observed spectrum and a model, both scaled to `[0, 1]`.
///
/// Long spectra are binned to the plot width (maximum per column), which keeps
/// narrow lines visible.
pub fn render_spectrum_plot(
    observed: &[f64],
    model: Option<&[f64]>,
    dispersion: Option<&Polynomial>,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let n = observed.len();

    let obs_cols = normalise(&bin_max(observed, width));
    let mut grid = vec![vec![' '; width]; height];

    if let Some(model) = model {
        let model_cols = normalise(&bin_max(model, width));
        let curve: Vec<(f64, f64)> = model_cols
            .iter()
            .enumerate()
            .map(|(c, &v)| (c as f64, v))
            .collect();
        draw_curve(&mut grid, &curve, 0.0, (width - 1) as f64, 0.0, 1.0);
    }
    for (c, &v) in obs_cols.iter().enumerate() {
        let y = map_y(v, 0.0, 1.0, height);
        grid[y][c] = 'o';
    }

    let mut out = String::new();
    let last = n.saturating_sub(1);
    match dispersion {
        Some(p) => out.push_str(&format!(
            "Plot: pixel=[0, {last}] | wavelength=[{:.2}, {:.2}] | flux normalised\n",
            p.eval(0.0),
            p.eval(last as f64)
        )),
        None => out.push_str(&format!("Plot: pixel=[0, {last}] | flux normalised\n")),
    }
    push_grid(&mut out, grid);
    out
}

/// Correlation versus integer shift; the best shift is marked `*`.
pub fn render_shift_plot(curve: &[(i64, f64)], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let mut out = String::new();

    let (Some(&(s_min, _)), Some(&(s_max, _))) = (curve.first(), curve.last()) else {
        out.push_str("Plot: no shift curve\n");
        return out;
    };
    let (r_min, r_max) = value_range(curve.iter().map(|&(_, r)| r)).unwrap_or((-1.0, 1.0));
    let (r_min, r_max) = pad_range(r_min, r_max, 0.05);
    let best = curve
        .iter()
        .enumerate()
        .fold(0usize, |b, (i, &(_, r))| if r > curve[b].1 { i } else { b });

    let mut grid = vec![vec![' '; width]; height];
    let (x0, x1) = if s_max > s_min { (s_min as f64, s_max as f64) } else { (s_min as f64 - 1.0, s_min as f64 + 1.0) };
    for (i, &(s, r)) in curve.iter().enumerate() {
        let x = map_x(s as f64, x0, x1, width);
        let y = map_y(r, r_min, r_max, height);
        grid[y][x] = if i == best { '*' } else { 'o' };
    }

    out.push_str(&format!(
        "Plot: shift=[{s_min}, {s_max}] px | r=[{r_min:.3}, {r_max:.3}] | best shift {}\n",
        curve[best].0
    ));
    push_grid(&mut out, grid);
    out
}

/// Render the dispersion curve stored in a solution file.
pub fn render_solution_plot(solution: &SolutionFile, width: usize, height: usize) -> String {
    let points: Vec<(f64, f64)> = solution
        .grid
        .pixel
        .iter()
        .zip(solution.grid.wavelength.iter())
        .map(|(&x, &w)| (x, w))
        .collect();
    render_curve_plot(&points, width, height)
}

fn render_curve_plot(points: &[(f64, f64)], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (x_min, x_max) = value_range(points.iter().map(|&(x, _)| x)).unwrap_or((0.0, 1.0));
    let (w_min, w_max) = value_range(points.iter().map(|&(_, w)| w)).unwrap_or((0.0, 1.0));
    let (w_min, w_max) = pad_range(w_min, w_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];
    draw_curve(&mut grid, points, x_min, x_max, w_min, w_max);

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: pixel=[{x_min:.1}, {x_max:.1}] | wavelength=[{w_min:.2}, {w_max:.2}]\n"
    ));
    push_grid(&mut out, grid);
    out
}

fn push_grid(out: &mut String, grid: Vec<Vec<char>>) {
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
}

/// Maximum of each of `width` equal pixel bins.
fn bin_max(values: &[f64], width: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let cols = width.min(n);
    (0..cols)
        .map(|c| {
            let lo = c * n / cols;
            let hi = ((c + 1) * n / cols).max(lo + 1);
            values[lo..hi].iter().copied().fold(f64::NEG_INFINITY, f64::max)
        })
        .collect()
}

fn normalise(values: &[f64]) -> Vec<f64> {
    match value_range(values.iter().copied()) {
        Some((lo, hi)) => values.iter().map(|v| (v - lo) / (hi - lo)).collect(),
        None => vec![0.0; values.len()],
    }
}

fn value_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min.is_finite() && max.is_finite() && max > min {
        Some((min, max))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_min: f64, x_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        let xx = map_x(x, x_min, x_max, width);
        let yy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, xx, yy, '-');
        } else {
            grid[yy][xx] = '-';
        }
        prev = Some((xx, yy));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispersion_plot_golden_snapshot_small() {
        let txt = render_curve_plot(&[(0.0, 5000.0), (9.0, 5009.0)], 10, 5);
        let expected = concat!(
            "Plot: pixel=[0.0, 9.0] | wavelength=[4999.55, 5009.45]\n",
            "        --\n",
            "      --  \n",
            "    --    \n",
            "  --      \n",
            "--        \n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn shift_plot_marks_best() {
        let curve = [(-2, 0.1), (-1, 0.3), (0, 0.9), (1, 0.4), (2, 0.2)];
        let txt = render_shift_plot(&curve, 10, 5);
        assert!(txt.starts_with("Plot: shift=[-2, 2] px"));
        assert!(txt.contains("best shift 0"));
        assert_eq!(txt.matches('*').count(), 1);
        assert_eq!(txt.lines().count(), 6);
    }

    #[test]
    fn spectrum_plot_bins_long_spectra() {
        let mut observed = vec![0.0; 1000];
        observed[500] = 10.0;
        let txt = render_spectrum_plot(&observed, Some(observed.as_slice()), None, 20, 6);
        let rows: Vec<&str> = txt.lines().collect();
        assert_eq!(rows.len(), 7);
        // The peak column is on the top row.
        assert_eq!(rows[1].find('o'), Some(10));
        assert!(rows.iter().skip(1).all(|r| r.chars().count() == 20));
    }
}
