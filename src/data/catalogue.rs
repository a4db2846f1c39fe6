//! Built-in Ne/Ar arc-lamp line list.
//!
//! Air wavelengths in Å with rough relative intensities, covering the red part
//! of the optical range (5850–8530 Å) where neon and argon lamps dominate.

use crate::domain::LineCatalogue;
use crate::error::CalibResult;

/// `(wavelength, intensity)` sorted by wavelength.
const NE_AR_LINES: &[(f64, f64)] = &[
    (5852.488, 500.0),
    (5881.895, 100.0),
    (5944.834, 100.0),
    (5975.534, 60.0),
    (6029.997, 100.0),
    (6074.338, 100.0),
    (6096.163, 300.0),
    (6143.063, 100.0),
    (6163.594, 100.0),
    (6217.281, 100.0),
    (6266.495, 100.0),
    (6304.789, 60.0),
    (6334.428, 100.0),
    (6382.991, 100.0),
    (6402.246, 200.0),
    (6506.528, 150.0),
    (6532.882, 60.0),
    (6598.953, 150.0),
    (6678.276, 90.0),
    (6717.043, 20.0),
    (6929.467, 100.0),
    (6965.431, 400.0),
    (7032.413, 100.0),
    (7067.218, 400.0),
    (7147.042, 150.0),
    (7173.938, 10.0),
    (7245.167, 100.0),
    (7272.936, 150.0),
    (7383.980, 250.0),
    (7438.899, 50.0),
    (7503.869, 700.0),
    (7514.652, 500.0),
    (7635.106, 600.0),
    (7723.761, 150.0),
    (7948.176, 500.0),
    (8006.157, 300.0),
    (8014.786, 400.0),
    (8103.693, 400.0),
    (8115.311, 900.0),
    (8264.522, 400.0),
    (8408.210, 500.0),
    (8424.648, 600.0),
    (8521.442, 400.0),
];

/// The built-in neon/argon catalogue.
pub fn ne_ar_catalogue() -> CalibResult<LineCatalogue> {
    LineCatalogue::from_pairs(NE_AR_LINES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalogue_is_valid() {
        let cat = ne_ar_catalogue().unwrap();
        assert_eq!(cat.len(), NE_AR_LINES.len());
        assert!(cat.lines().iter().all(|l| l.intensity > 0.0));
    }
}
