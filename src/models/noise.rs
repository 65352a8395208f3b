//! Covariance factors from a flat parameter vector
//!
//! An external optimizer searches over an unconstrained vector `psi`. The
//! builder lays it out as
//!
//! ```text
//! psi = [ √H entries | √Q block 1 entries | ... | √Q block r/p entries ]
//! ```
//!
//! where `√H` is a `p x p` lower-triangular matrix and `√Q` is block
//! diagonal with `r/p` lower-triangular `p x p` blocks. Each triangle is
//! filled row by row: `(0,0), (1,0), (1,1), (2,0), ...`.
//!
//! Any real `psi` yields factors whose Gram products are symmetric positive
//! semi-definite. A zero diagonal entry makes the covariance singular; that
//! is not caught here.

use nalgebra::{DMatrix, RealField};

use crate::filters::FilterKind;
use crate::types::covariance::{CovarianceFactors, StateSpaceCovariance};
use crate::{KalmanError, Result};

/// Noise covariance in the form a filter variant consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum NoiseCovariance<T: RealField> {
    /// Square-root factors for the square-root filter
    Factors(CovarianceFactors<T>),
    /// Full matrices for the covariance filter
    Full(StateSpaceCovariance<T>),
}

/// Number of free entries of a `p x p` lower triangle.
#[inline]
pub fn triangle_len(p: usize) -> usize {
    p * (p + 1) / 2
}

/// Number of entries `psi` must have for dimensions `p` and `r`.
///
/// Fails unless `p > 0` and `r` is a multiple of `p`.
pub fn parameter_count(p: usize, r: usize) -> Result<usize> {
    if p == 0 || r % p != 0 {
        return Err(KalmanError::DisturbanceNotMultiple { p, r });
    }
    Ok(triangle_len(p) + (r / p) * triangle_len(p))
}

/// Fills a `p x p` lower triangle row by row from `params`.
///
/// `params` must hold exactly [`triangle_len(p)`](triangle_len) entries.
pub(crate) fn lower_triangular<T: RealField + Copy>(params: &[T], p: usize) -> DMatrix<T> {
    let mut lower = DMatrix::zeros(p, p);
    let mut k = 0;
    for i in 0..p {
        for j in 0..=i {
            lower[(i, j)] = params[k];
            k += 1;
        }
    }
    lower
}

/// Builds `√H` and `√Q` from `psi`.
pub fn covariance_factors<T: RealField + Copy>(
    psi: &[T],
    p: usize,
    r: usize,
) -> Result<CovarianceFactors<T>> {
    let expected = parameter_count(p, r)?;
    if psi.len() != expected {
        return Err(KalmanError::ParameterCount {
            expected,
            found: psi.len(),
        });
    }

    let block = triangle_len(p);
    let sqrt_h = lower_triangular(&psi[..block], p);

    let mut sqrt_q = DMatrix::zeros(r, r);
    for (b, params) in psi[block..].chunks_exact(block).enumerate() {
        sqrt_q
            .view_mut((b * p, b * p), (p, p))
            .copy_from(&lower_triangular(params, p));
    }

    Ok(CovarianceFactors { sqrt_h, sqrt_q })
}

/// Builds the noise covariance for the given filter variant.
///
/// The square-root variant gets the factors as they are; the covariance
/// variant gets their Gram products.
pub fn statespace_covariance<T: RealField + Copy>(
    psi: &[T],
    p: usize,
    r: usize,
    kind: FilterKind,
) -> Result<NoiseCovariance<T>> {
    let factors = covariance_factors(psi, p, r)?;
    Ok(match kind {
        FilterKind::SquareRoot => NoiseCovariance::Factors(factors),
        FilterKind::Covariance => NoiseCovariance::Full(factors.to_covariance()),
    })
}
