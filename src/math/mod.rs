//! Numeric kernels: polynomials and their roots, the instrumental line profile,
//! and least squares.

pub mod ols;
pub mod poly;
pub mod profile;
pub mod roots;

pub use ols::*;
pub use poly::Polynomial;
pub use profile::*;
pub use roots::{RootSet, solve_all_roots, solve_all_roots_into};
