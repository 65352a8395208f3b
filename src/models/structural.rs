//! Structural time-series models
//!
//! Common component models expressed as [`StateSpaceModel`]s. For a
//! `p`-variate series every component is replicated per observation
//! coordinate with a Kronecker product against `I_p`, so each disturbance
//! block is `p x p` and the covariance factor builder applies directly.

use alloc::vec::Vec;

use nalgebra::{DMatrix, DVector, RealField};

use crate::types::system::{StateSpaceModel, SystemMatrices};
use crate::{KalmanError, Result};

fn observation_dim<T: RealField>(y: &[DVector<T>]) -> Result<usize> {
    y.first().map(|obs| obs.len()).ok_or(KalmanError::EmptySeries)
}

/// Local level (random walk plus noise).
///
/// `y[t] = μ[t] + ε[t]`, `μ[t+1] = μ[t] + η[t]`. `m = r = p`.
pub fn local_level<T: RealField + Copy>(y: Vec<DVector<T>>) -> Result<StateSpaceModel<T>> {
    let p = observation_dim(&y)?;
    let identity = DMatrix::<T>::identity(p, p);
    StateSpaceModel::new(
        y,
        SystemMatrices::new(identity.clone(), identity.clone(), identity),
    )
}

/// Local linear trend.
///
/// Level and slope both receive a disturbance. `m = r = 2p`.
pub fn linear_trend<T: RealField + Copy>(y: Vec<DVector<T>>) -> Result<StateSpaceModel<T>> {
    let p = observation_dim(&y)?;
    let identity = DMatrix::<T>::identity(p, p);

    let z = DMatrix::from_row_slice(1, 2, &[T::one(), T::zero()]).kronecker(&identity);
    let t = trend_block::<T>().kronecker(&identity);
    let r = DMatrix::identity(2 * p, 2 * p);

    StateSpaceModel::new(y, SystemMatrices::new(z, t, r))
}

/// Basic structural model: local linear trend plus dummy seasonal of
/// period `s`.
///
/// The seasonal component keeps `s - 1` lags and sums to zero over a
/// period up to its disturbance. Level, slope and the current seasonal
/// term are disturbed, so `m = (s + 1) p` and `r = 3p`.
///
/// # Errors
/// [`KalmanError::InvalidSeasonality`] if `s < 2`.
pub fn structural<T: RealField + Copy>(y: Vec<DVector<T>>, s: usize) -> Result<StateSpaceModel<T>> {
    if s < 2 {
        return Err(KalmanError::InvalidSeasonality(s));
    }
    let p = observation_dim(&y)?;
    let identity = DMatrix::<T>::identity(p, p);
    let states = s + 1;

    let mut z_pattern = DMatrix::zeros(1, states);
    z_pattern[(0, 0)] = T::one();
    z_pattern[(0, 2)] = T::one();

    let mut t_pattern = DMatrix::zeros(states, states);
    t_pattern.view_mut((0, 0), (2, 2)).copy_from(&trend_block::<T>());
    // Seasonal: γ[t+1] = -(γ[t] + ... + γ[t-s+2]), older lags shift down
    for j in 2..states {
        t_pattern[(2, j)] = -T::one();
    }
    for i in 3..states {
        t_pattern[(i, i - 1)] = T::one();
    }

    let mut r_pattern = DMatrix::zeros(states, 3);
    for i in 0..3 {
        r_pattern[(i, i)] = T::one();
    }

    StateSpaceModel::new(
        y,
        SystemMatrices::new(
            z_pattern.kronecker(&identity),
            t_pattern.kronecker(&identity),
            r_pattern.kronecker(&identity),
        ),
    )
}

/// `[[1, 1], [0, 1]]`: level picks up the slope.
fn trend_block<T: RealField + Copy>() -> DMatrix<T> {
    DMatrix::from_row_slice(2, 2, &[T::one(), T::one(), T::zero(), T::one()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use nalgebra::dvector;

    fn series(len: usize, p: usize) -> Vec<DVector<f64>> {
        (0..len).map(|i| DVector::from_element(p, i as f64)).collect()
    }

    #[test]
    fn test_local_level_dims() {
        let model = local_level(series(10, 2)).unwrap();
        let dims = model.dims();
        assert_eq!((dims.n, dims.p, dims.m, dims.r), (10, 2, 2, 2));
        assert_eq!(model.transition(), &DMatrix::identity(2, 2));
    }

    #[test]
    fn test_linear_trend_matrices() {
        let model = linear_trend(vec![dvector![1.0], dvector![2.0]]).unwrap();
        let dims = model.dims();
        assert_eq!((dims.m, dims.r), (2, 2));
        assert_eq!(model.z(0), &DMatrix::from_row_slice(1, 2, &[1.0, 0.0]));
        assert_eq!(
            model.transition(),
            &DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0])
        );
    }

    #[test]
    fn test_structural_seasonal_block() {
        let model = structural(series(12, 1), 4).unwrap();
        let dims = model.dims();
        assert_eq!((dims.m, dims.r), (5, 3));

        let t = model.transition();
        // Seasonal row sums the previous s - 1 terms with a minus sign
        assert_eq!(t[(2, 2)], -1.0);
        assert_eq!(t[(2, 3)], -1.0);
        assert_eq!(t[(2, 4)], -1.0);
        assert_eq!(t[(3, 2)], 1.0);
        assert_eq!(t[(4, 3)], 1.0);
        assert_eq!(t[(4, 4)], 0.0);

        let z = model.z(0);
        assert_eq!(z[(0, 0)], 1.0);
        assert_eq!(z[(0, 1)], 0.0);
        assert_eq!(z[(0, 2)], 1.0);
    }

    #[test]
    fn test_structural_multivariate_disturbance_is_multiple() {
        let model = structural(series(8, 2), 3).unwrap();
        let dims = model.dims();
        assert_eq!((dims.m, dims.r), (8, 6));
        assert_eq!(dims.r % dims.p, 0);
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(
            structural(series(5, 1), 1).unwrap_err(),
            KalmanError::InvalidSeasonality(1)
        );
        assert_eq!(
            local_level::<f64>(Vec::new()).unwrap_err(),
            KalmanError::EmptySeries
        );
    }
}
