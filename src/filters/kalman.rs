//! Conventional covariance Kalman filter
//!
//! Propagates full covariance matrices with the same predicted form, diffuse
//! start and steady-state freezing as the square-root filter:
//!
//! - v = y - Z * a (innovation)
//! - F = Z * P * Z^T + H (innovation covariance)
//! - K = T * P * Z^T * F^{-1} (Kalman gain)
//! - a_next = T * a + K * v
//! - P_next = L * P * L^T + K * H * K^T + R * Q * R^T, L = T - K * Z (Joseph form)
//!
//! It is the [`FilterKind::Covariance`](super::FilterKind::Covariance)
//! variant and a reference for the square-root recursion. The square-root
//! filter should be preferred for long series: this one can lose symmetry
//! and definiteness to rounding.

use alloc::vec::Vec;

use nalgebra::{DMatrix, DVector, RealField};
use num_traits::Float;

use super::sqrt_kalman::is_steady;
use super::FilterConfig;
use crate::types::covariance::StateSpaceCovariance;
use crate::types::system::StateSpaceModel;
use crate::types::transforms::{
    check_shape, innovation_covariance, joseph_propagate, pinv, predicted_gain,
};
use crate::Result;

/// Output of the covariance filter.
///
/// Same indexing as [`SquareRootFilter`](super::sqrt_kalman::SquareRootFilter):
/// `a` and `p` carry one extra trailing prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanFilterOutput<T: RealField> {
    /// Predicted state means `a[t]` (n + 1 entries)
    pub a: Vec<DVector<T>>,
    /// Predicted state covariances `P[t]` (n + 1 entries)
    pub p: Vec<DMatrix<T>>,
    /// Innovations `v[t]`
    pub v: Vec<DVector<T>>,
    /// Innovation covariances `F[t]`
    pub f: Vec<DMatrix<T>>,
    /// Kalman gains `K[t]`
    pub k: Vec<DMatrix<T>>,
    /// Whether the filter reached steady state
    pub steady_state: bool,
    /// First step of the steady-state regime, `n` if never reached
    pub tsteady: usize,
}

/// Runs the covariance Kalman filter.
///
/// The diffuse start is `P[0] = c² I`, matching `√P[0] = c I` of the
/// square-root filter.
pub fn kalman_filter<T: RealField + Float + Copy>(
    model: &StateSpaceModel<T>,
    cov: &StateSpaceCovariance<T>,
    config: &FilterConfig<T>,
) -> Result<KalmanFilterOutput<T>> {
    let dims = model.dims();
    check_shape("H", &cov.h, (dims.p, dims.p))?;
    check_shape("Q", &cov.q, (dims.r, dims.r))?;
    let n = dims.n;
    let m = dims.m;

    let transition = model.transition();
    let loading = model.disturbance_loading();
    let rqr = loading * &cov.q * loading.transpose();

    let mut a: Vec<DVector<T>> = Vec::with_capacity(n + 1);
    let mut p: Vec<DMatrix<T>> = Vec::with_capacity(n + 1);
    let mut v: Vec<DVector<T>> = Vec::with_capacity(n);
    let mut f: Vec<DMatrix<T>> = Vec::with_capacity(n);
    let mut k: Vec<DMatrix<T>> = Vec::with_capacity(n);

    let c = config.diffuse_scale;
    a.push(DVector::zeros(m));
    p.push(DMatrix::from_diagonal_element(m, m, c * c));

    let freeze_allowed = config.detect_steady_state && !model.system().z.is_time_varying();
    let mut steady: Option<usize> = None;

    for t in 0..n {
        let z = model.z(t);
        let innovation = model.observation(t) - z * &a[t];

        if let Some(ts) = steady {
            let frozen_gain = k[ts].clone();
            let frozen_f = f[ts].clone();
            let frozen_p = p[ts].clone();

            a.push(transition * &a[t] + &frozen_gain * &innovation);
            p.push(frozen_p);
            v.push(innovation);
            f.push(frozen_f);
            k.push(frozen_gain);
            continue;
        }

        let innovation_cov = innovation_covariance(&p[t], z, &cov.h);
        let innovation_cov_inv = pinv(&innovation_cov, config.pinv_eps)?;
        let gain = predicted_gain(&p[t], z, transition, &innovation_cov_inv);
        let l = transition - &gain * z;
        let p_next = joseph_propagate(&p[t], &l, &gain, &cov.h, &rqr);

        let converged = freeze_allowed && is_steady(&p_next, &p[t], config.tol);

        a.push(transition * &a[t] + &gain * &innovation);
        if converged {
            let frozen = p[t].clone();
            p.push(frozen);
            steady = Some(t);
            tracing::debug!(tsteady = t, "covariance filter reached steady state");
        } else {
            p.push(p_next);
        }
        v.push(innovation);
        f.push(innovation_cov);
        k.push(gain);
    }

    Ok(KalmanFilterOutput {
        a,
        p,
        v,
        f,
        k,
        steady_state: steady.is_some(),
        tsteady: steady.unwrap_or(n),
    })
}
