//! Dense matrix transforms shared by the filters and the smoother
//!
//! Runtime-sized building blocks of the Kalman recursions. The square-root
//! recursions only need three primitives: the Gram product, the generalized
//! inverse and the orthogonal triangularization of a stacked matrix. The
//! predicted-form helpers at the bottom serve the conventional filter.

use nalgebra::{DMatrix, RealField};

use crate::{KalmanError, Result};

// ============================================================================
// Shape Checks
// ============================================================================

/// Fails with [`KalmanError::DimensionMismatch`] unless `m` is `expected`.
#[inline]
pub fn check_shape<T: RealField>(
    what: &'static str,
    m: &DMatrix<T>,
    expected: (usize, usize),
) -> Result<()> {
    if m.shape() == expected {
        Ok(())
    } else {
        Err(KalmanError::DimensionMismatch {
            what,
            expected,
            found: m.shape(),
        })
    }
}

// ============================================================================
// Square-Root Primitives
// ============================================================================

/// Gram product `M * Mᵗ`, the full matrix a square-root factor represents.
#[inline]
pub fn gram<T: RealField + Copy>(factor: &DMatrix<T>) -> DMatrix<T> {
    factor * factor.transpose()
}

/// Moore-Penrose inverse with singular values below `eps` treated as zero.
///
/// Rank-deficient input is not an error: the result is the best-effort
/// generalized inverse.
pub fn pinv<T: RealField + Copy>(m: &DMatrix<T>, eps: T) -> Result<DMatrix<T>> {
    m.clone()
        .pseudo_inverse(eps)
        .map_err(|_| KalmanError::NumericalInstability)
}

/// Concatenates blocks with equal row counts left to right.
pub fn hstack<T: RealField + Copy>(blocks: &[&DMatrix<T>]) -> DMatrix<T> {
    let rows = blocks.first().map_or(0, |b| b.nrows());
    let cols = blocks.iter().map(|b| b.ncols()).sum();

    let mut out = DMatrix::zeros(rows, cols);
    let mut offset = 0;
    for block in blocks {
        out.view_mut((0, offset), (rows, block.ncols()))
            .copy_from(*block);
        offset += block.ncols();
    }
    out
}

/// Lower-triangular `L` (rows x rows) with `L * Lᵗ = U * Uᵗ`.
///
/// Factorizing `Uᵗ = Q * R` gives an orthogonal `G = Q` with `U * G = Rᵗ`,
/// i.e. the transformed matrix is block lower-triangular and the trailing
/// columns vanish. Columns are sign-normalized so the diagonal is
/// non-negative; the product `L * Lᵗ` is unaffected, and consecutive factors
/// of a converging recursion compare elementwise.
pub fn triangularize<T: RealField + Copy>(stacked: &DMatrix<T>) -> DMatrix<T> {
    let rows = stacked.nrows();
    let r = stacked.transpose().qr().r();
    let k = r.nrows().min(rows);

    let mut lower = DMatrix::zeros(rows, rows);
    lower
        .view_mut((0, 0), (rows, k))
        .copy_from(&r.rows(0, k).transpose());

    for j in 0..k {
        if lower[(j, j)] < T::zero() {
            lower.column_mut(j).neg_mut();
        }
    }
    lower
}

// ============================================================================
// Predicted-Form Kalman Helpers
// ============================================================================

/// Computes the innovation covariance.
///
/// F = Z * P * Z^T + H
pub fn innovation_covariance<T: RealField + Copy>(
    state_cov: &DMatrix<T>,
    obs_matrix: &DMatrix<T>,
    obs_noise: &DMatrix<T>,
) -> DMatrix<T> {
    obs_matrix * state_cov * obs_matrix.transpose() + obs_noise
}

/// Computes the predicted-form Kalman gain.
///
/// K = T * P * Z^T * F^{-1}
///
/// The gain maps the innovation at `t` straight into the prediction for
/// `t + 1`: `a[t+1] = T * a[t] + K * v[t]`.
pub fn predicted_gain<T: RealField + Copy>(
    state_cov: &DMatrix<T>,
    obs_matrix: &DMatrix<T>,
    transition: &DMatrix<T>,
    innovation_cov_inv: &DMatrix<T>,
) -> DMatrix<T> {
    transition * state_cov * obs_matrix.transpose() * innovation_cov_inv
}

/// Propagates the predicted state covariance in Joseph form.
///
/// P_next = L * P * L^T + K * H * K^T + R * Q * R^T, with L = T - K * Z
pub fn joseph_propagate<T: RealField + Copy>(
    state_cov: &DMatrix<T>,
    l: &DMatrix<T>,
    kalman_gain: &DMatrix<T>,
    obs_noise: &DMatrix<T>,
    disturbance_cov: &DMatrix<T>,
) -> DMatrix<T> {
    let term1 = l * state_cov * l.transpose();
    let term2 = kalman_gain * obs_noise * kalman_gain.transpose();

    term1 + term2 + disturbance_cov
}
