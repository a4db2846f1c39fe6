//! Synthetic line spectra.
//!
//! A model spectrum is built from a catalogue, a dispersion hypothesis and the
//! slit ⊗ Gaussian line-spread function:
//!
//! - every catalogue line whose wavelength maps into the buffer is located in
//!   pixel space (lines are visited in wavelength order, so the previous line's
//!   position seeds the next inversion)
//! - its intensity (optionally `ln(1 + I)`) is deposited with the profile
//!
//! Buffers may be larger than the observed spectrum: a buffer oversized by
//! `2·half_window` covers pixel coordinates `-half_window..n + half_window`, so
//! every integer shift of the same model can be read as a window into it.

use crate::domain::{LineCatalogue, LineSpectrumFiller, ModelParams};
use crate::error::{CalibError, CalibResult};
use crate::math::{Polynomial, pixel_profile, profile_kernel, sigma_from_fwhm};
use crate::models::dispersion::{check_increasing, invert_dispersion};

/// Catalogue plus line-spread parameters: everything the filler needs besides
/// the dispersion.
#[derive(Debug, Clone, Copy)]
pub struct LineModel<'a> {
    pub catalogue: &'a LineCatalogue,
    pub params: ModelParams,
}

impl<'a> LineModel<'a> {
    pub fn new(catalogue: &'a LineCatalogue, params: ModelParams) -> Self {
        Self { catalogue, params }
    }
}

/// A catalogue line placed on the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedLine {
    pub wavelength: f64,
    pub intensity: f64,
    /// Pixel coordinate of the line centre.
    pub pixel: f64,
}

impl LineSpectrumFiller {
    /// Fill `spectrum` with the model for `dispersion`.
    ///
    /// Buffer index `j` corresponds to pixel coordinate `j - half_window`.
    /// Returns the number of lines deposited.
    pub fn fill(
        self,
        spectrum: &mut [f64],
        dispersion: &Polynomial,
        model: &LineModel<'_>,
        half_window: usize,
    ) -> CalibResult<usize> {
        if spectrum.is_empty() {
            return Err(CalibError::NullInput("model spectrum buffer is empty".to_string()));
        }
        if spectrum.len() <= 2 * half_window {
            return Err(CalibError::IncompatibleInput(format!(
                "model buffer of {} pixels cannot hold a ±{half_window} shift window",
                spectrum.len()
            )));
        }

        let lines = place_lines(dispersion, model, spectrum.len(), half_window)?;
        let params = &model.params;
        let origin = half_window as f64;

        spectrum.fill(0.0);
        if self.is_fast() {
            let last = spectrum.len() as isize - 1;
            for line in &lines {
                let c = line.pixel + origin;
                let j0 = c.floor();
                let frac = c - j0;
                let j0 = j0 as isize;
                let weight = self.weight(line.intensity);
                if (0..=last).contains(&j0) {
                    spectrum[j0 as usize] += weight * (1.0 - frac);
                }
                if (0..=last).contains(&(j0 + 1)) {
                    spectrum[(j0 + 1) as usize] += weight * frac;
                }
            }
            let kernel = profile_kernel(params.slit_width, params.fwhm, params.truncation);
            convolve_symmetric(spectrum, &kernel);
        } else {
            let sigma = sigma_from_fwhm(params.fwhm);
            let last = spectrum.len() as f64 - 1.0;
            for line in &lines {
                let c = line.pixel + origin;
                let lo = (c - params.truncation).ceil().max(0.0);
                let hi = (c + params.truncation).floor().min(last);
                if hi < lo {
                    continue;
                }
                let weight = self.weight(line.intensity);
                for j in lo as usize..=hi as usize {
                    spectrum[j] += weight * pixel_profile(j as f64 - c, params.slit_width, sigma);
                }
            }
        }
        Ok(lines.len())
    }

    fn weight(self, intensity: f64) -> f64 {
        if self.is_log() { intensity.ln_1p() } else { intensity }
    }
}

/// Build an `n_pixels` model spectrum (no shift padding).
pub fn fill_line_spectrum_model(
    dispersion: &Polynomial,
    n_pixels: usize,
    model: &LineModel<'_>,
    filler: LineSpectrumFiller,
) -> CalibResult<Vec<f64>> {
    let mut spectrum = vec![0.0; n_pixels];
    filler.fill(&mut spectrum, dispersion, model, 0)?;
    Ok(spectrum)
}

/// Locate every positive-intensity catalogue line that can contribute to a
/// buffer of `len` pixels starting at coordinate `-half_window`.
///
/// Fails `IllegalInput` if the dispersion is not increasing over the
/// contributing range and `DataNotFound` if no line falls inside it.
pub fn place_lines(
    dispersion: &Polynomial,
    model: &LineModel<'_>,
    len: usize,
    half_window: usize,
) -> CalibResult<Vec<PlacedLine>> {
    model.params.validate()?;
    if model.catalogue.is_empty() {
        return Err(CalibError::NullInput("line catalogue is empty".to_string()));
    }

    let trunc = model.params.truncation;
    let x_min = -(half_window as f64) - trunc;
    let x_max = (len as f64 - 1.0 - half_window as f64) + trunc;
    check_increasing(dispersion, x_min, x_max)?;

    let wl_min = dispersion.eval(x_min);
    let wl_max = dispersion.eval(x_max);
    let range = model.catalogue.range_indices(wl_min, wl_max);

    let mut placed = Vec::with_capacity(range.len());
    let mut guess = x_min;
    for line in &model.catalogue.lines()[range] {
        if line.intensity <= 0.0 {
            continue;
        }
        let pixel = invert_dispersion(dispersion, line.wavelength, guess, x_min, x_max);
        guess = pixel;
        placed.push(PlacedLine {
            wavelength: line.wavelength,
            intensity: line.intensity,
            pixel,
        });
    }

    if placed.is_empty() {
        return Err(CalibError::DataNotFound(format!(
            "no catalogue lines with positive intensity between {wl_min:.3} and {wl_max:.3}"
        )));
    }
    Ok(placed)
}

/// In-place convolution with a symmetric kernel given as `[k(0), k(1), ...]`.
fn convolve_symmetric(data: &mut [f64], kernel: &[f64]) {
    let src = data.to_vec();
    let n = src.len();
    for (j, out) in data.iter_mut().enumerate() {
        let mut acc = kernel[0] * src[j];
        for (d, &k) in kernel.iter().enumerate().skip(1) {
            if j >= d {
                acc += k * src[j - d];
            }
            if j + d < n {
                acc += k * src[j + d];
            }
        }
        *out = acc;
    }
}
