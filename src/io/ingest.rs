//! CSV ingest for observed spectra and line catalogues.
//!
//! Accepted layouts:
//!
//! - spectrum: one column (`flux`) or two (`pixel,flux`)
//! - catalogue: two columns (`wavelength,intensity`); a single `wavelength`
//!   column is read with unit intensity
//!
//! A header row is optional: the first row is treated as a header when its
//! first field does not parse as a number. Spectrum rows must all be valid
//! (skipping one would shift every following pixel); catalogue rows are
//! validated one by one and bad rows are reported and skipped.

use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{CatalogueLine, LineCatalogue};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct SpectrumData {
    pub flux: Vec<f64>,
    pub rows_read: usize,
}

#[derive(Debug, Clone)]
pub struct CatalogueData {
    pub catalogue: LineCatalogue,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load an observed spectrum.
pub fn load_spectrum(path: &Path) -> Result<SpectrumData, AppError> {
    let rows = read_rows(path)?;

    let mut flux = Vec::with_capacity(rows.len());
    let mut last_pixel: Option<f64> = None;
    for (line, record) in &rows {
        let (pixel, value) = match record.len() {
            1 => (None, parse_field(record, 0, "flux")),
            n if n >= 2 => (Some(parse_field(record, 0, "pixel")), parse_field(record, 1, "flux")),
            _ => (None, Err("empty row".to_string())),
        };
        let value = value.map_err(|e| AppError::new(2, format!("Spectrum line {line}: {e}")))?;
        if let Some(pixel) = pixel {
            let pixel = pixel.map_err(|e| AppError::new(2, format!("Spectrum line {line}: {e}")))?;
            if let Some(prev) = last_pixel {
                if pixel <= prev {
                    return Err(AppError::new(
                        2,
                        format!("Spectrum line {line}: pixel {pixel} does not follow {prev}"),
                    ));
                }
            }
            last_pixel = Some(pixel);
        }
        flux.push(value);
    }

    if flux.len() < 2 {
        return Err(AppError::new(
            2,
            format!("Spectrum '{}' has {} usable pixel(s); need at least 2.", path.display(), flux.len()),
        ));
    }
    Ok(SpectrumData {
        rows_read: rows.len(),
        flux,
    })
}

/// Load, sort and validate a line catalogue.
pub fn load_catalogue(path: &Path) -> Result<CatalogueData, AppError> {
    let rows = read_rows(path)?;

    let mut lines = Vec::with_capacity(rows.len());
    let mut row_errors = Vec::new();
    for (line, record) in &rows {
        match parse_line(record) {
            Ok(l) => lines.push(l),
            Err(message) => row_errors.push(RowError { line: *line, message }),
        }
    }
    if lines.is_empty() {
        return Err(AppError::new(
            3,
            format!("Catalogue '{}' contains no usable lines.", path.display()),
        ));
    }

    lines.sort_by(|a, b| a.wavelength.total_cmp(&b.wavelength));
    let catalogue = LineCatalogue::new(lines)
        .map_err(|e| AppError::new(2, format!("Catalogue '{}': {}", path.display(), e.message())))?;
    Ok(CatalogueData {
        catalogue,
        row_errors,
        rows_read: rows.len(),
    })
}

/// Data rows with their 1-based file line numbers (header skipped).
fn read_rows(path: &Path) -> Result<Vec<(usize, StringRecord)>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(file);

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| AppError::new(2, format!("CSV parse error in '{}': {e}", path.display())))?;
        let line = record.position().map_or(idx + 1, |p| p.line() as usize);
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        if rows.is_empty() && idx == 0 && is_header(&record) {
            continue;
        }
        rows.push((line, record));
    }
    Ok(rows)
}

fn is_header(record: &StringRecord) -> bool {
    record
        .get(0)
        .map(|f| f.trim_start_matches('\u{feff}').parse::<f64>().is_err())
        .unwrap_or(false)
}

fn parse_field(record: &StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    let raw = record.get(idx).ok_or_else(|| format!("missing {name}"))?;
    let v: f64 = raw
        .trim_start_matches('\u{feff}')
        .parse()
        .map_err(|_| format!("invalid {name} '{raw}'"))?;
    if !v.is_finite() {
        return Err(format!("non-finite {name}"));
    }
    Ok(v)
}

fn parse_line(record: &StringRecord) -> Result<CatalogueLine, String> {
    let wavelength = parse_field(record, 0, "wavelength")?;
    if wavelength <= 0.0 {
        return Err(format!("wavelength must be > 0, got {wavelength}"));
    }
    let intensity = if record.len() >= 2 {
        parse_field(record, 1, "intensity")?
    } else {
        1.0
    };
    Ok(CatalogueLine {
        wavelength,
        intensity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_csv(name: &str, body: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("wavecal-{}-{name}", std::process::id()));
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn spectrum_with_header_and_pixels() {
        let path = temp_csv("spec2.csv", "pixel,flux\n0,1.5\n1,2.5\n2,0.5\n");
        let data = load_spectrum(&path).unwrap();
        assert_eq!(data.flux, vec![1.5, 2.5, 0.5]);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn spectrum_single_column_without_header() {
        let path = temp_csv("spec1.csv", "3\n4\n5\n6\n");
        let data = load_spectrum(&path).unwrap();
        assert_eq!(data.flux.len(), 4);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn spectrum_rejects_bad_rows() {
        let path = temp_csv("specbad.csv", "flux\n1\nx\n3\n");
        let err = load_spectrum(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn catalogue_is_sorted_and_bad_rows_reported() {
        let path = temp_csv("cat.csv", "wavelength,intensity\n6402.2,200\nabc,1\n5852.5,500\n");
        let data = load_catalogue(&path).unwrap();
        assert_eq!(data.catalogue.len(), 2);
        assert_eq!(data.catalogue.lines()[0].wavelength, 5852.5);
        assert_eq!(data.row_errors.len(), 1);
        assert_eq!(data.row_errors[0].line, 3);
        let _ = std::fs::remove_file(path);
    }
}
