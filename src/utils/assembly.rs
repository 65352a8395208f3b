//! Filter and smoother result assembly
//!
//! Expands square-root output into full covariance matrices by Gram
//! products, and adds the filtered (updated) estimates
//!
//! ```text
//! att[t] = a[t] + P[t] Zᵗ F⁻¹ v[t]
//! Ptt[t] = P[t] - P[t] Zᵗ F⁻¹ Z P[t]
//! ```
//!
//! which the predicted-form recursions never form themselves.

use alloc::vec::Vec;

use nalgebra::{DMatrix, DVector, RealField};
use num_traits::Float;

use crate::filters::kalman::KalmanFilterOutput;
use crate::filters::smoother::SquareRootSmoother;
use crate::filters::sqrt_kalman::SquareRootFilter;
use crate::filters::FilterConfig;
use crate::types::system::StateSpaceModel;
use crate::types::transforms::{gram, pinv};
use crate::{KalmanError, Result};

/// Filter output with full covariance matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredState<T: RealField> {
    /// Predicted state means (n + 1 entries)
    pub a: Vec<DVector<T>>,
    /// Predicted state covariances (n + 1 entries)
    pub p: Vec<DMatrix<T>>,
    /// Innovations
    pub v: Vec<DVector<T>>,
    /// Innovation covariances
    pub f: Vec<DMatrix<T>>,
    /// Kalman gains
    pub k: Vec<DMatrix<T>>,
    /// Filtered state means
    pub att: Vec<DVector<T>>,
    /// Filtered state covariances
    pub ptt: Vec<DMatrix<T>>,
    /// Whether the filter reached steady state
    pub steady_state: bool,
    /// First step of the steady-state regime, `n` if never reached
    pub tsteady: usize,
}

impl<T: RealField + Float + Copy> FilteredState<T> {
    /// Expands square-root filter output.
    pub fn from_sqrt(
        model: &StateSpaceModel<T>,
        filter: &SquareRootFilter<T>,
        config: &FilterConfig<T>,
    ) -> Result<Self> {
        check_len(model, filter.len())?;

        let p: Vec<DMatrix<T>> = filter.sqrt_p.iter().map(gram).collect();
        let f: Vec<DMatrix<T>> = filter.sqrt_f.iter().map(gram).collect();

        let mut att = Vec::with_capacity(filter.len());
        let mut ptt = Vec::with_capacity(filter.len());
        for t in 0..filter.len() {
            // F⁺ = √F⁺ᵗ √F⁺
            let w = pinv(&filter.sqrt_f[t], config.pinv_eps)?;
            let f_inv = w.transpose() * w;
            let (mean, cov) = update(&filter.a[t], &p[t], model.z(t), &filter.v[t], &f_inv);
            att.push(mean);
            ptt.push(cov);
        }

        Ok(Self {
            a: filter.a.clone(),
            p,
            v: filter.v.clone(),
            f,
            k: filter.k.clone(),
            att,
            ptt,
            steady_state: filter.steady_state,
            tsteady: filter.tsteady,
        })
    }

    /// Wraps covariance filter output.
    pub fn from_covariance(
        model: &StateSpaceModel<T>,
        filter: &KalmanFilterOutput<T>,
        config: &FilterConfig<T>,
    ) -> Result<Self> {
        check_len(model, filter.v.len())?;

        let mut att = Vec::with_capacity(filter.v.len());
        let mut ptt = Vec::with_capacity(filter.v.len());
        for t in 0..filter.v.len() {
            let f_inv = pinv(&filter.f[t], config.pinv_eps)?;
            let (mean, cov) = update(&filter.a[t], &filter.p[t], model.z(t), &filter.v[t], &f_inv);
            att.push(mean);
            ptt.push(cov);
        }

        Ok(Self {
            a: filter.a.clone(),
            p: filter.p.clone(),
            v: filter.v.clone(),
            f: filter.f.clone(),
            k: filter.k.clone(),
            att,
            ptt,
            steady_state: filter.steady_state,
            tsteady: filter.tsteady,
        })
    }
}

/// Smoother output with full covariance matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedState<T: RealField> {
    /// Smoothed state means
    pub alpha: Vec<DVector<T>>,
    /// Smoothed state covariances
    pub v: Vec<DMatrix<T>>,
    /// Smoothing covariances `N` (n + 1 entries, last is zero)
    pub n: Vec<DMatrix<T>>,
}

impl<T: RealField + Copy> From<&SquareRootSmoother<T>> for SmoothedState<T> {
    fn from(smoother: &SquareRootSmoother<T>) -> Self {
        Self {
            alpha: smoother.alpha.clone(),
            v: smoother.v.clone(),
            n: smoother.sqrt_n.iter().map(gram).collect(),
        }
    }
}

fn check_len<T: RealField + Copy>(model: &StateSpaceModel<T>, len: usize) -> Result<()> {
    let n = model.dims().n;
    if len != n {
        return Err(KalmanError::DimensionMismatch {
            what: "filter output",
            expected: (n, 1),
            found: (len, 1),
        });
    }
    Ok(())
}

fn update<T: RealField + Copy>(
    a: &DVector<T>,
    p: &DMatrix<T>,
    z: &DMatrix<T>,
    v: &DVector<T>,
    f_inv: &DMatrix<T>,
) -> (DVector<T>, DMatrix<T>) {
    let pzt = p * z.transpose();
    let mean = a + &pzt * (f_inv * v);
    let cov = p - &pzt * f_inv * pzt.transpose();
    (mean, cov)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::kalman::kalman_filter;
    use crate::filters::smoother::smooth;
    use crate::filters::sqrt_kalman::sqrt_kalman_filter;
    use crate::types::covariance::CovarianceFactors;
    use crate::types::system::SystemMatrices;
    use nalgebra::{dmatrix, dvector};

    fn local_level(y: &[f64]) -> StateSpaceModel<f64> {
        let series = y.iter().map(|&v| dvector![v]).collect();
        StateSpaceModel::new(
            series,
            SystemMatrices::new(dmatrix![1.0], dmatrix![1.0], dmatrix![1.0]),
        )
        .unwrap()
    }

    fn factors() -> CovarianceFactors<f64> {
        CovarianceFactors::new(dmatrix![1.0], dmatrix![0.5_f64.sqrt()]).unwrap()
    }

    #[test]
    fn test_gram_expansion() {
        let model = local_level(&[1.0, 2.0, 1.5]);
        let config = FilterConfig::default();
        let filter = sqrt_kalman_filter(&model, &factors(), &config).unwrap();
        let state = FilteredState::from_sqrt(&model, &filter, &config).unwrap();

        assert_eq!(state.p.len(), 4);
        for t in 0..3 {
            let sf = filter.sqrt_f[t][(0, 0)];
            assert!((state.f[t][(0, 0)] - sf * sf).abs() < 1e-9 * sf * sf);
        }
    }

    #[test]
    fn test_first_update_follows_observation() {
        // Diffuse prior: the first filtered mean is essentially y[0]
        let model = local_level(&[3.0, 2.0]);
        let config = FilterConfig::default();
        let filter = sqrt_kalman_filter(&model, &factors(), &config).unwrap();
        let state = FilteredState::from_sqrt(&model, &filter, &config).unwrap();

        assert!((state.att[0][0] - 3.0).abs() < 1e-6);
        // P[0] - P[0]² / (P[0] + 1) cancels at the diffuse scale
        assert!((state.ptt[0][(0, 0)] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_covariance_variant_matches() {
        let model = local_level(&[1.0, 2.0, 1.5, 1.8, 2.4, 2.0]);
        let config = FilterConfig::default().without_steady_state();
        let sqrt = FilteredState::from_sqrt(
            &model,
            &sqrt_kalman_filter(&model, &factors(), &config).unwrap(),
            &config,
        )
        .unwrap();
        let full = FilteredState::from_covariance(
            &model,
            &kalman_filter(&model, &factors().to_covariance(), &config).unwrap(),
            &config,
        )
        .unwrap();

        for t in 1..6 {
            assert!((sqrt.att[t][0] - full.att[t][0]).abs() < 1e-6);
            assert!((sqrt.ptt[t][(0, 0)] - full.ptt[t][(0, 0)]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_smoothed_state_from_smoother() {
        let model = local_level(&[1.0, 2.0, 1.5, 1.8]);
        let (_, smoother) = smooth(&model, &factors(), &FilterConfig::default()).unwrap();
        let state = SmoothedState::from(&smoother);

        assert_eq!(state.n.len(), 5);
        assert_eq!(state.n[4][(0, 0)], 0.0);
        assert!(state.n.iter().all(|n| n[(0, 0)] >= 0.0));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let config = FilterConfig::default();
        let short = local_level(&[1.0]);
        let filter = sqrt_kalman_filter(&short, &factors(), &config).unwrap();
        let long = local_level(&[1.0, 2.0]);
        assert!(FilteredState::from_sqrt(&long, &filter, &config).is_err());
    }
}
