//! Square-root Kalman filter
//!
//! Propagates lower-triangular factors of the predicted state covariance
//! instead of the covariance itself. Each step stacks
//!
//! ```text
//! U = [ Z √P   √H   0    ]
//!     [ T √P   0    R √Q ]
//! ```
//!
//! and triangularizes it with an orthogonal transform, `U G = U*`. Because
//! `U* U*ᵗ = U Uᵗ`, the blocks of `U*` are
//!
//! ```text
//! U* = [ √F    0        0 ]
//!      [ U2*   √P_next  0 ]
//! ```
//!
//! with `F = Z P Zᵗ + H`, `U2* √Fᵗ = T P Zᵗ` and the next predicted
//! covariance factor in the lower right. The gain is `K = U2* √F⁺`.
//!
//! For time-invariant systems the factor converges; once two consecutive
//! factors agree within the configured tolerance the filter freezes `√F`,
//! `K` and `√P` and only propagates the means.

use alloc::vec::Vec;

use nalgebra::{DMatrix, DVector, RealField};
use num_traits::Float;

use super::FilterConfig;
use crate::types::covariance::{CovarianceFactors, StateSpaceCovariance};
use crate::types::system::StateSpaceModel;
use crate::types::transforms::{pinv, triangularize};
use crate::Result;

// ============================================================================
// Filter Output
// ============================================================================

/// Output of the square-root filter.
///
/// Index `t` is the zero-based time step. Predicted quantities (`a`,
/// `sqrt_p`) have one more entry than the series: the last one is the
/// one-step-ahead prediction past the data.
#[derive(Debug, Clone, PartialEq)]
pub struct SquareRootFilter<T: RealField> {
    /// Predicted state means `a[t]` (n + 1 entries)
    pub a: Vec<DVector<T>>,
    /// Innovations `v[t] = y[t] - Z[t] a[t]`
    pub v: Vec<DVector<T>>,
    /// Predicted state covariance factors `√P[t]` (n + 1 entries)
    pub sqrt_p: Vec<DMatrix<T>>,
    /// Innovation covariance factors `√F[t]`
    pub sqrt_f: Vec<DMatrix<T>>,
    /// Kalman gains `K[t]`
    pub k: Vec<DMatrix<T>>,
    /// Cross terms `U2*[t]` with `K[t] = U2*[t] √F[t]⁺`
    pub u2star: Vec<DMatrix<T>>,
    /// Whether the filter reached steady state
    pub steady_state: bool,
    /// First step of the steady-state regime, `n` if never reached
    pub tsteady: usize,
}

impl<T: RealField + Copy> SquareRootFilter<T> {
    /// Number of filtered time steps.
    #[inline]
    pub fn len(&self) -> usize {
        self.v.len()
    }

    /// Returns true if no step was filtered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.v.is_empty()
    }
}

/// Result of one full square-root update.
#[derive(Debug, Clone)]
struct SqrtStep<T: RealField> {
    sqrt_f: DMatrix<T>,
    u2star: DMatrix<T>,
    sqrt_p_next: DMatrix<T>,
    gain: DMatrix<T>,
}

/// Triangularizes the stacked matrix for one step and extracts its blocks.
fn sqrt_step<T: RealField + Copy>(
    z: &DMatrix<T>,
    transition: &DMatrix<T>,
    r_sqrt_q: &DMatrix<T>,
    sqrt_h: &DMatrix<T>,
    sqrt_p: &DMatrix<T>,
    pinv_eps: T,
) -> Result<SqrtStep<T>> {
    let p = z.nrows();
    let m = sqrt_p.nrows();
    let r = r_sqrt_q.ncols();

    let mut u = DMatrix::zeros(p + m, m + p + r);
    u.view_mut((0, 0), (p, m)).copy_from(&(z * sqrt_p));
    u.view_mut((0, m), (p, p)).copy_from(sqrt_h);
    u.view_mut((p, 0), (m, m)).copy_from(&(transition * sqrt_p));
    u.view_mut((p, m + p), (m, r)).copy_from(r_sqrt_q);

    let ustar = triangularize(&u);
    let sqrt_f = ustar.view((0, 0), (p, p)).into_owned();
    let u2star = ustar.view((p, 0), (m, p)).into_owned();
    let sqrt_p_next = ustar.view((p, p), (m, m)).into_owned();
    let gain = &u2star * pinv(&sqrt_f, pinv_eps)?;

    Ok(SqrtStep {
        sqrt_f,
        u2star,
        sqrt_p_next,
        gain,
    })
}

// ============================================================================
// Steady-State Detection
// ============================================================================

/// Returns true if the covariance factor has stopped moving.
///
/// The test is the largest elementwise relative change
/// `|(next - prev) / next|` against `tol`. Entries that are exactly zero in
/// both factors (the structural zeros above the diagonal) are skipped. An
/// entry of `next` close to zero amplifies the ratio and can hold off
/// convergence; that is reported at debug level and not compensated.
pub fn is_steady<T: RealField + Float + Copy>(
    sqrt_p_next: &DMatrix<T>,
    sqrt_p_prev: &DMatrix<T>,
    tol: T,
) -> bool {
    let mut max_change = T::zero();
    for (&next, &prev) in sqrt_p_next.iter().zip(sqrt_p_prev.iter()) {
        if next == T::zero() && prev == T::zero() {
            continue;
        }
        if Float::abs(next) < Float::sqrt(<T as Float>::epsilon()) {
            tracing::debug!("relative steady-state test divides by a near-zero factor entry");
        }
        let change = Float::abs((next - prev) / next);
        if Float::is_nan(change) {
            return false;
        }
        max_change = Float::max(max_change, change);
    }
    max_change < tol
}

// ============================================================================
// Filter
// ============================================================================

/// Runs the square-root Kalman filter.
///
/// Starts from the diffuse prior `a[0] = 0`, `√P[0] = c I` with
/// `c = config.diffuse_scale`. Rank-deficient innovation covariances are
/// handled by the generalized inverse and do not fail.
///
/// # Errors
/// [`KalmanError::DimensionMismatch`](crate::KalmanError::DimensionMismatch)
/// if the factors do not conform with the model.
pub fn sqrt_kalman_filter<T: RealField + Float + Copy>(
    model: &StateSpaceModel<T>,
    factors: &CovarianceFactors<T>,
    config: &FilterConfig<T>,
) -> Result<SquareRootFilter<T>> {
    let dims = model.dims();
    factors.check_dims(&dims)?;
    let n = dims.n;
    let m = dims.m;

    let transition = model.transition();
    let r_sqrt_q = model.disturbance_loading() * &factors.sqrt_q;

    let mut a: Vec<DVector<T>> = Vec::with_capacity(n + 1);
    let mut sqrt_p: Vec<DMatrix<T>> = Vec::with_capacity(n + 1);
    let mut v: Vec<DVector<T>> = Vec::with_capacity(n);
    let mut sqrt_f: Vec<DMatrix<T>> = Vec::with_capacity(n);
    let mut k: Vec<DMatrix<T>> = Vec::with_capacity(n);
    let mut u2star: Vec<DMatrix<T>> = Vec::with_capacity(n);

    a.push(DVector::zeros(m));
    sqrt_p.push(DMatrix::from_diagonal_element(m, m, config.diffuse_scale));

    // A changing Z keeps the Riccati recursion from settling
    let freeze_allowed = config.detect_steady_state && !model.system().z.is_time_varying();
    let mut steady: Option<usize> = None;

    for t in 0..n {
        let z = model.z(t);
        let innovation = model.observation(t) - z * &a[t];

        if let Some(ts) = steady {
            let frozen_gain = k[ts].clone();
            let frozen_sqrt_f = sqrt_f[ts].clone();
            let frozen_u2star = u2star[ts].clone();
            let frozen_sqrt_p = sqrt_p[ts].clone();

            a.push(transition * &a[t] + &frozen_gain * &innovation);
            sqrt_p.push(frozen_sqrt_p);
            v.push(innovation);
            sqrt_f.push(frozen_sqrt_f);
            k.push(frozen_gain);
            u2star.push(frozen_u2star);
            continue;
        }

        let step = sqrt_step(
            z,
            transition,
            &r_sqrt_q,
            &factors.sqrt_h,
            &sqrt_p[t],
            config.pinv_eps,
        )?;

        let converged =
            freeze_allowed && is_steady(&step.sqrt_p_next, &sqrt_p[t], config.tol);

        a.push(transition * &a[t] + &step.gain * &innovation);
        if converged {
            // Freeze at the factor the gain was computed from
            let frozen = sqrt_p[t].clone();
            sqrt_p.push(frozen);
            steady = Some(t);
            tracing::debug!(tsteady = t, "square-root filter reached steady state");
        } else {
            sqrt_p.push(step.sqrt_p_next);
        }
        v.push(innovation);
        sqrt_f.push(step.sqrt_f);
        k.push(step.gain);
        u2star.push(step.u2star);

        tracing::trace!(t, "square-root filter step");
    }

    Ok(SquareRootFilter {
        a,
        v,
        sqrt_p,
        sqrt_f,
        k,
        u2star,
        steady_state: steady.is_some(),
        tsteady: steady.unwrap_or(n),
    })
}

/// Runs the square-root filter from full covariances.
///
/// `H` and `Q` are Cholesky-factorized first.
///
/// # Errors
/// [`KalmanError::NotPositiveDefinite`](crate::KalmanError::NotPositiveDefinite)
/// if either covariance cannot be factorized.
pub fn sqrt_kalman_filter_cov<T: RealField + Float + Copy>(
    model: &StateSpaceModel<T>,
    cov: &StateSpaceCovariance<T>,
    config: &FilterConfig<T>,
) -> Result<SquareRootFilter<T>> {
    let factors = cov.factorize()?;
    sqrt_kalman_filter(model, &factors, config)
}
