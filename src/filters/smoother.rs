//! Square-root fixed-interval smoother
//!
//! Backward pass over a completed [`SquareRootFilter`]. With `L[t] = T - K[t]
//! Z[t]` the smoothing recursion
//!
//! ```text
//! r[t-1] = Zᵗ F⁻¹ v[t] + Lᵗ r[t]
//! N[t-1] = Zᵗ F⁻¹ Z + Lᵗ N[t] L
//! α[t]   = a[t] + P[t] r[t-1]
//! V[t]   = P[t] - P[t] N[t-1] P[t]
//! ```
//!
//! starts from `r[n] = 0`, `N[n] = 0`. `N` is carried as a factor: since
//! `N[t-1] = M Mᵗ` with `M = [Zᵗ √F⁻ᵗ  Lᵗ √N[t]]`, the next factor is the
//! triangularization of `M`.
//!
//! Steps at or after the filter's steady-state point reuse the frozen `√F`,
//! `K` and `P`; the generalized inverse and Gram product are formed once for
//! that whole stretch. Earlier steps use the per-step filter output.

use alloc::vec::Vec;

use nalgebra::{DMatrix, DVector, RealField};
use num_traits::Float;

use super::sqrt_kalman::{sqrt_kalman_filter, SquareRootFilter};
use super::FilterConfig;
use crate::types::covariance::CovarianceFactors;
use crate::types::system::StateSpaceModel;
use crate::types::transforms::{gram, hstack, pinv, triangularize};
use crate::{KalmanError, Result};

/// Output of the square-root smoother.
///
/// `r` and `sqrt_n` have n + 1 entries: index `t` holds `r[t]`, the
/// quantity produced by the step at `t` (one-based `r[t-1]` of the
/// recursion above), and the last entry is the zero boundary value.
#[derive(Debug, Clone, PartialEq)]
pub struct SquareRootSmoother<T: RealField> {
    /// Smoothed state means `α[t]`
    pub alpha: Vec<DVector<T>>,
    /// Smoothed state covariances `V[t]`
    pub v: Vec<DMatrix<T>>,
    /// Smoothing vectors (n + 1 entries, last is zero)
    pub r: Vec<DVector<T>>,
    /// Smoothing covariance factors `√N` (n + 1 entries, last is zero)
    pub sqrt_n: Vec<DMatrix<T>>,
}

/// Quantities produced by one backward step.
#[derive(Debug, Clone)]
struct BackwardStep<T: RealField> {
    r: DVector<T>,
    sqrt_n: DMatrix<T>,
    alpha: DVector<T>,
    v: DMatrix<T>,
}

/// Inputs of one backward step that do not depend on the recursion state.
struct StepInputs<'a, T: RealField> {
    z: &'a DMatrix<T>,
    l: &'a DMatrix<T>,
    sqrt_f_inv: &'a DMatrix<T>,
    innovation: &'a DVector<T>,
    a: &'a DVector<T>,
    p: &'a DMatrix<T>,
}

fn backward_step<T: RealField + Copy>(
    inputs: StepInputs<'_, T>,
    r_next: &DVector<T>,
    sqrt_n_next: &DMatrix<T>,
) -> BackwardStep<T> {
    let StepInputs {
        z,
        l,
        sqrt_f_inv,
        innovation,
        a,
        p,
    } = inputs;

    // Zᵗ √F⁻ᵗ, so that Zᵗ F⁻¹ = (Zᵗ √F⁻ᵗ)(√F⁻¹)
    let zt_sqrt_f_inv = z.transpose() * sqrt_f_inv.transpose();

    let r = &zt_sqrt_f_inv * (sqrt_f_inv * innovation) + l.transpose() * r_next;
    let sqrt_n = triangularize(&hstack(&[&zt_sqrt_f_inv, &(l.transpose() * sqrt_n_next)]));

    let n = gram(&sqrt_n);
    let alpha = a + p * &r;
    let v = p - p * n * p;

    BackwardStep {
        r,
        sqrt_n,
        alpha,
        v,
    }
}

/// Runs the square-root smoother over a completed filter.
///
/// # Errors
/// [`KalmanError::DimensionMismatch`] if `filter` was not produced from
/// `model`.
pub fn sqrt_kalman_smoother<T: RealField + Float + Copy>(
    model: &StateSpaceModel<T>,
    filter: &SquareRootFilter<T>,
    config: &FilterConfig<T>,
) -> Result<SquareRootSmoother<T>> {
    let dims = model.dims();
    let n = dims.n;
    let m = dims.m;
    if filter.len() != n || filter.a.len() != n + 1 || filter.sqrt_p.len() != n + 1 {
        return Err(KalmanError::DimensionMismatch {
            what: "filter output",
            expected: (n, 1),
            found: (filter.len(), 1),
        });
    }

    let transition = model.transition();
    let tsteady = filter.tsteady.min(n);

    // Collected backwards, reversed at the end
    let mut r: Vec<DVector<T>> = Vec::with_capacity(n + 1);
    let mut sqrt_n: Vec<DMatrix<T>> = Vec::with_capacity(n + 1);
    let mut alpha: Vec<DVector<T>> = Vec::with_capacity(n);
    let mut v: Vec<DMatrix<T>> = Vec::with_capacity(n);

    r.push(DVector::zeros(m));
    sqrt_n.push(DMatrix::zeros(m, m));

    let mut push = |step: BackwardStep<T>| {
        r.push(step.r);
        sqrt_n.push(step.sqrt_n);
        alpha.push(step.alpha);
        v.push(step.v);
    };

    if tsteady < n {
        tracing::debug!(tsteady, "smoothing steady-state regime");

        let p_steady = gram(&filter.sqrt_p[tsteady]);
        let sqrt_f_inv = pinv(&filter.sqrt_f[tsteady], config.pinv_eps)?;
        let gain = &filter.k[tsteady];

        let mut r_next = DVector::zeros(m);
        let mut sqrt_n_next = DMatrix::zeros(m, m);
        for t in (tsteady..n).rev() {
            let z = model.z(t);
            let l = transition - gain * z;
            let step = backward_step(
                StepInputs {
                    z,
                    l: &l,
                    sqrt_f_inv: &sqrt_f_inv,
                    innovation: &filter.v[t],
                    a: &filter.a[t],
                    p: &p_steady,
                },
                &r_next,
                &sqrt_n_next,
            );
            r_next = step.r.clone();
            sqrt_n_next = step.sqrt_n.clone();
            push(step);
        }

        smooth_transient(model, filter, config, tsteady, r_next, sqrt_n_next, &mut push)?;
    } else {
        smooth_transient(
            model,
            filter,
            config,
            n,
            DVector::zeros(m),
            DMatrix::zeros(m, m),
            &mut push,
        )?;
    }

    r.reverse();
    sqrt_n.reverse();
    alpha.reverse();
    v.reverse();

    Ok(SquareRootSmoother {
        alpha,
        v,
        r,
        sqrt_n,
    })
}

/// Backward steps `end - 1` down to `0` with per-step filter quantities.
fn smooth_transient<T, F>(
    model: &StateSpaceModel<T>,
    filter: &SquareRootFilter<T>,
    config: &FilterConfig<T>,
    end: usize,
    mut r_next: DVector<T>,
    mut sqrt_n_next: DMatrix<T>,
    push: &mut F,
) -> Result<()>
where
    T: RealField + Float + Copy,
    F: FnMut(BackwardStep<T>),
{
    let transition = model.transition();

    for t in (0..end).rev() {
        let z = model.z(t);
        let sqrt_f_inv = pinv(&filter.sqrt_f[t], config.pinv_eps)?;
        let l = transition - &filter.u2star[t] * &sqrt_f_inv * z;
        let p = gram(&filter.sqrt_p[t]);

        let step = backward_step(
            StepInputs {
                z,
                l: &l,
                sqrt_f_inv: &sqrt_f_inv,
                innovation: &filter.v[t],
                a: &filter.a[t],
                p: &p,
            },
            &r_next,
            &sqrt_n_next,
        );
        r_next = step.r.clone();
        sqrt_n_next = step.sqrt_n.clone();
        push(step);

        tracing::trace!(t, "square-root smoother step");
    }
    Ok(())
}

/// Runs the square-root filter followed by the smoother.
pub fn smooth<T: RealField + Float + Copy>(
    model: &StateSpaceModel<T>,
    factors: &CovarianceFactors<T>,
    config: &FilterConfig<T>,
) -> Result<(SquareRootFilter<T>, SquareRootSmoother<T>)> {
    let filter = sqrt_kalman_filter(model, factors, config)?;
    let smoother = sqrt_kalman_smoother(model, &filter, config)?;
    Ok((filter, smoother))
}
