//! Noise covariances and their square-root factors
//!
//! [`StateSpaceCovariance`] holds the full observation-noise covariance `H`
//! and state-disturbance covariance `Q`. The square-root filter never touches
//! them directly; it consumes the lower-triangular [`CovarianceFactors`]
//! `√H`, `√Q` with `√H √Hᵗ = H` and `√Q √Qᵗ = Q`.

use nalgebra::{Cholesky, DMatrix, RealField};

use super::system::Dimensions;
use super::transforms::{check_shape, gram};
use crate::{KalmanError, Result};

/// Full observation-noise and state-disturbance covariances.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSpaceCovariance<T: RealField> {
    /// Observation-noise covariance (p x p)
    pub h: DMatrix<T>,
    /// State-disturbance covariance (r x r)
    pub q: DMatrix<T>,
}

impl<T: RealField + Copy> StateSpaceCovariance<T> {
    /// Creates a covariance pair.
    ///
    /// The caller should ensure both matrices are symmetric positive
    /// semi-definite; [`factorize`](Self::factorize) requires them to be
    /// positive definite.
    pub fn new(h: DMatrix<T>, q: DMatrix<T>) -> Result<Self> {
        check_shape("H", &h, (h.nrows(), h.nrows()))?;
        check_shape("Q", &q, (q.nrows(), q.nrows()))?;
        Ok(Self { h, q })
    }

    /// Computes the Cholesky factors `√H`, `√Q`.
    ///
    /// Fails with [`KalmanError::NotPositiveDefinite`] when either matrix
    /// cannot be factorized.
    pub fn factorize(&self) -> Result<CovarianceFactors<T>> {
        let sqrt_h = Cholesky::new(self.h.clone())
            .ok_or(KalmanError::NotPositiveDefinite { what: "H" })?
            .l();
        let sqrt_q = Cholesky::new(self.q.clone())
            .ok_or(KalmanError::NotPositiveDefinite { what: "Q" })?
            .l();

        Ok(CovarianceFactors { sqrt_h, sqrt_q })
    }
}

/// Square-root factors `√H` (p x p) and `√Q` (r x r).
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceFactors<T: RealField> {
    /// Observation-noise factor
    pub sqrt_h: DMatrix<T>,
    /// State-disturbance factor
    pub sqrt_q: DMatrix<T>,
}

impl<T: RealField + Copy> CovarianceFactors<T> {
    /// Creates a factor pair. Both factors must be square.
    pub fn new(sqrt_h: DMatrix<T>, sqrt_q: DMatrix<T>) -> Result<Self> {
        check_shape("sqrtH", &sqrt_h, (sqrt_h.nrows(), sqrt_h.nrows()))?;
        check_shape("sqrtQ", &sqrt_q, (sqrt_q.nrows(), sqrt_q.nrows()))?;
        Ok(Self { sqrt_h, sqrt_q })
    }

    /// Reconstructs `H = √H √Hᵗ`.
    #[inline]
    pub fn h(&self) -> DMatrix<T> {
        gram(&self.sqrt_h)
    }

    /// Reconstructs `Q = √Q √Qᵗ`.
    #[inline]
    pub fn q(&self) -> DMatrix<T> {
        gram(&self.sqrt_q)
    }

    /// Reconstructs the full covariance pair.
    pub fn to_covariance(&self) -> StateSpaceCovariance<T> {
        StateSpaceCovariance {
            h: self.h(),
            q: self.q(),
        }
    }

    /// Checks the factors against model dimensions.
    pub fn check_dims(&self, dims: &Dimensions) -> Result<()> {
        check_shape("sqrtH", &self.sqrt_h, (dims.p, dims.p))?;
        check_shape("sqrtQ", &self.sqrt_q, (dims.r, dims.r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    #[test]
    fn test_factorize_round_trip() {
        let cov = StateSpaceCovariance::new(
            dmatrix![4.0, 2.0; 2.0, 3.0_f64],
            dmatrix![0.5_f64],
        )
        .unwrap();
        let factors = cov.factorize().unwrap();

        assert!((factors.h() - &cov.h).abs().max() < 1e-12);
        assert!((factors.q()[(0, 0)] - 0.5).abs() < 1e-12);
        // Cholesky factor is lower triangular
        assert_eq!(factors.sqrt_h[(0, 1)], 0.0);
    }

    #[test]
    fn test_factorize_rejects_indefinite() {
        let cov = StateSpaceCovariance::new(
            dmatrix![1.0_f64],
            dmatrix![1.0, 2.0; 2.0, 1.0_f64],
        )
        .unwrap();

        assert_eq!(
            cov.factorize(),
            Err(KalmanError::NotPositiveDefinite { what: "Q" })
        );
    }

    #[test]
    fn test_non_square_rejected() {
        let err = StateSpaceCovariance::new(DMatrix::<f64>::zeros(2, 1), dmatrix![1.0]);
        assert!(err.is_err());
    }

    #[test]
    fn test_check_dims() {
        let factors = CovarianceFactors::new(dmatrix![1.0_f64], dmatrix![1.0_f64]).unwrap();
        let dims = Dimensions {
            n: 10,
            p: 1,
            m: 2,
            r: 2,
        };
        assert!(factors.check_dims(&dims).is_err());
    }
}
