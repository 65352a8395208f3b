//! Kalman filtering and smoothing
//!
//! - [`sqrt_kalman::sqrt_kalman_filter`]: square-root filter with steady-state detection
//! - [`smoother::sqrt_kalman_smoother`]: square-root fixed-interval smoother
//! - [`kalman::kalman_filter`]: conventional covariance filter
//!
//! All filters use the same predicted form, `a[t+1] = T a[t] + K[t] v[t]`,
//! and the same diffuse start `a[1] = 0`, `P[1] = c² I`.

use nalgebra::RealField;
use num_traits::Float;

pub mod kalman;
pub mod smoother;
pub mod sqrt_kalman;

/// Which filter variant drives a computation.
///
/// Selected once by the caller; the covariance builder and the likelihood
/// extractor dispatch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    /// Propagate square-root factors
    #[default]
    SquareRoot,
    /// Propagate full covariance matrices
    Covariance,
}

/// Configuration shared by the filters and the smoother.
#[derive(Debug, Clone)]
pub struct FilterConfig<T: RealField> {
    /// Steady-state tolerance on the relative change of the covariance factor
    pub tol: T,
    /// Scale `c` of the diffuse initial factor `√P[1] = c I`
    pub diffuse_scale: T,
    /// Singular values below this are dropped by the generalized inverse
    pub pinv_eps: T,
    /// Freeze the gain once the covariance factor converges
    pub detect_steady_state: bool,
}

impl<T: RealField + Float> Default for FilterConfig<T> {
    fn default() -> Self {
        Self {
            tol: nalgebra::convert(1e-5),
            diffuse_scale: nalgebra::convert(1e6),
            pinv_eps: nalgebra::convert(1e-12),
            detect_steady_state: true,
        }
    }
}

impl<T: RealField + Float> FilterConfig<T> {
    /// Sets the steady-state tolerance.
    pub fn with_tol(mut self, tol: T) -> Self {
        self.tol = tol;
        self
    }

    /// Sets the diffuse initial scale.
    pub fn with_diffuse_scale(mut self, scale: T) -> Self {
        self.diffuse_scale = scale;
        self
    }

    /// Sets the generalized-inverse cutoff.
    pub fn with_pinv_eps(mut self, eps: T) -> Self {
        self.pinv_eps = eps;
        self
    }

    /// Runs the full recursion at every step.
    pub fn without_steady_state(mut self) -> Self {
        self.detect_steady_state = false;
        self
    }
}
