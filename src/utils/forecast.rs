//! Out-of-sample prediction
//!
//! Continues the prediction recursion past the end of the series without
//! observations, so the gain term drops out:
//!
//! ```text
//! a[n+h+1]  = T a[n+h]
//! √P[n+h+1] = tria([T √P[n+h]   R √Q])
//! ```
//!
//! and each step reports `Z a` with covariance `Z P Zᵗ + H`, carried as the
//! factor `tria([Z √P  √H])`. The loading of the last time step is used
//! throughout.

use alloc::vec::Vec;

use nalgebra::{DMatrix, DVector, RealField};

use crate::filters::sqrt_kalman::SquareRootFilter;
use crate::types::covariance::CovarianceFactors;
use crate::types::system::StateSpaceModel;
use crate::types::transforms::{gram, hstack, triangularize};
use crate::{KalmanError, Result};

/// Predicted observations past the end of the series.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast<T: RealField> {
    /// Observation means, one per step ahead
    pub mean: Vec<DVector<T>>,
    /// Observation covariances, one per step ahead
    pub covariance: Vec<DMatrix<T>>,
}

/// Forecasts `horizon` steps past the last observation.
///
/// # Errors
/// [`KalmanError::ZeroHorizon`] if `horizon` is zero, and
/// [`KalmanError::DimensionMismatch`] if the filter or the factors do not
/// belong to `model`.
pub fn forecast<T: RealField + Copy>(
    model: &StateSpaceModel<T>,
    factors: &CovarianceFactors<T>,
    filter: &SquareRootFilter<T>,
    horizon: usize,
) -> Result<Forecast<T>> {
    if horizon == 0 {
        return Err(KalmanError::ZeroHorizon);
    }
    let dims = model.dims();
    factors.check_dims(&dims)?;
    if filter.len() != dims.n {
        return Err(KalmanError::DimensionMismatch {
            what: "filter output",
            expected: (dims.n, 1),
            found: (filter.len(), 1),
        });
    }

    let z = model.system().z.last().ok_or(KalmanError::EmptySeries)?;
    let transition = model.transition();
    let r_sqrt_q = model.disturbance_loading() * &factors.sqrt_q;

    let mut a = filter.a[dims.n].clone();
    let mut sqrt_p = filter.sqrt_p[dims.n].clone();

    let mut mean = Vec::with_capacity(horizon);
    let mut covariance = Vec::with_capacity(horizon);
    for h in 0..horizon {
        mean.push(z * &a);
        let sqrt_f = triangularize(&hstack(&[&(z * &sqrt_p), &factors.sqrt_h]));
        covariance.push(gram(&sqrt_f));

        if h + 1 < horizon {
            a = transition * &a;
            sqrt_p = triangularize(&hstack(&[&(transition * &sqrt_p), &r_sqrt_q]));
        }
    }

    Ok(Forecast { mean, covariance })
}
