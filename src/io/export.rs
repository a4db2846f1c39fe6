//! Export the per-pixel calibration table to CSV.
//!
//! One row per pixel: `pixel,wavelength,observed,model`. Meant to be easy to
//! consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::AppError;
use crate::math::Polynomial;

/// Write the calibration table.
///
/// `model` must have the same length as `observed`.
pub fn write_table_csv(
    path: &Path,
    dispersion: &Polynomial,
    observed: &[f64],
    model: &[f64],
) -> Result<(), AppError> {
    if model.len() != observed.len() {
        return Err(AppError::new(
            2,
            format!("Model has {} pixels, observation {}.", model.len(), observed.len()),
        ));
    }
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writeln!(file, "pixel,wavelength,observed,model")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for (i, (obs, m)) in observed.iter().zip(model).enumerate() {
        writeln!(file, "{i},{:.6},{obs:.6},{m:.6}", dispersion.eval(i as f64))
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_one_row_per_pixel() {
        let path = std::env::temp_dir().join(format!("wavecal-{}-table.csv", std::process::id()));
        let p = Polynomial::new(vec![5000.0, 2.0]);
        write_table_csv(&path, &p, &[1.0, 2.0, 3.0], &[0.5, 0.5, 0.5]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "1,5002.000000,2.000000,0.500000");
        let _ = std::fs::remove_file(path);
    }
}
