//! Read/write dispersion solution JSON files.
//!
//! A solution file is the portable result of a calibration:
//! - the dispersion coefficients and the correlation they reached
//! - the run settings (strategy, filler, line-spread parameters)
//! - a sampled pixel → wavelength grid for quick plotting
//!
//! The schema is defined by `domain::SolutionFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{LineSpectrumFiller, ModelParams, SolutionFile, Strategy, WavelengthGrid};
use crate::error::AppError;
use crate::math::Polynomial;

/// Inputs to a solution file besides the polynomial itself.
#[derive(Debug, Clone, Copy)]
pub struct SolutionMeta {
    pub strategy: Strategy,
    pub n_pixels: usize,
    pub correlation: f64,
    pub baseline_correlation: f64,
    pub model: ModelParams,
    pub filler: LineSpectrumFiller,
}

/// Assemble a solution with a grid of `grid_points` samples.
pub fn build_solution(polynomial: &Polynomial, meta: &SolutionMeta, grid_points: usize) -> SolutionFile {
    SolutionFile {
        tool: "wavecal".to_string(),
        created: Utc::now(),
        strategy: meta.strategy,
        n_pixels: meta.n_pixels,
        coefficients: polynomial.coeffs().to_vec(),
        correlation: meta.correlation,
        baseline_correlation: meta.baseline_correlation,
        model: meta.model,
        filler: meta.filler,
        grid: build_grid(polynomial, meta.n_pixels, grid_points),
    }
}

/// Write a solution JSON file.
pub fn write_solution_json(path: &Path, solution: &SolutionFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create solution JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, solution)
        .map_err(|e| AppError::new(2, format!("Failed to write solution JSON: {e}")))?;
    Ok(())
}

/// Read a solution JSON file.
pub fn read_solution_json(path: &Path) -> Result<SolutionFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open solution JSON '{}': {e}", path.display())))?;
    let solution: SolutionFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid solution JSON: {e}")))?;
    if solution.coefficients.is_empty() {
        return Err(AppError::new(2, "Solution JSON has no coefficients."));
    }
    Ok(solution)
}

impl SolutionFile {
    pub fn polynomial(&self) -> Polynomial {
        Polynomial::new(self.coefficients.clone())
    }
}

fn build_grid(polynomial: &Polynomial, n_pixels: usize, n: usize) -> WavelengthGrid {
    let n = n.max(2);
    let last = n_pixels.saturating_sub(1).max(1) as f64;
    let pixel: Vec<f64> = (0..n).map(|i| last * i as f64 / (n as f64 - 1.0)).collect();
    let wavelength = pixel.iter().map(|&x| polynomial.eval(x)).collect();
    WavelengthGrid { pixel, wavelength }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solution_survives_a_file_round_trip() {
        let p = Polynomial::new(vec![6000.0, 1.5, 1e-4]);
        let meta = SolutionMeta {
            strategy: Strategy::Continuous,
            n_pixels: 1024,
            correlation: 0.93,
            baseline_correlation: 0.41,
            model: ModelParams::default(),
            filler: LineSpectrumFiller::Exact,
        };
        let solution = build_solution(&p, &meta, 11);
        assert_eq!(solution.grid.pixel[10], 1023.0);

        let path = std::env::temp_dir().join(format!("wavecal-{}-solution.json", std::process::id()));
        write_solution_json(&path, &solution).unwrap();
        let back = read_solution_json(&path).unwrap();
        assert_eq!(back.polynomial(), p);
        assert_eq!(back.strategy, Strategy::Continuous);
        let _ = std::fs::remove_file(path);
    }
}
