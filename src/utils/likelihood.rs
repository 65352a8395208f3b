//! Likelihood ingredients for external parameter search
//!
//! An optimizer evaluates the Gaussian log-likelihood from the innovations
//! and their covariances,
//!
//! ```text
//! log L = -½ Σ (p log 2π + log|F[t]| + v[t]ᵗ F[t]⁻¹ v[t])
//! ```
//!
//! This module only produces `v[t]` and `F[t]` for a candidate parameter
//! vector; it never evaluates the sum.

use alloc::vec::Vec;

use nalgebra::{DMatrix, DVector, RealField};
use num_traits::Float;

use crate::filters::kalman::kalman_filter;
use crate::filters::sqrt_kalman::sqrt_kalman_filter;
use crate::filters::{FilterConfig, FilterKind};
use crate::models::{statespace_covariance, NoiseCovariance};
use crate::types::system::StateSpaceModel;
use crate::types::transforms::gram;
use crate::Result;

/// Innovations and full innovation covariances of one filter run.
#[derive(Debug, Clone, PartialEq)]
pub struct LikelihoodInputs<T: RealField> {
    /// Innovations `v[t]`
    pub innovations: Vec<DVector<T>>,
    /// Innovation covariances `F[t]`
    pub innovation_covariances: Vec<DMatrix<T>>,
}

impl<T: RealField> LikelihoodInputs<T> {
    /// Number of time steps.
    #[inline]
    pub fn len(&self) -> usize {
        self.innovations.len()
    }

    /// Returns true if there are no time steps.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.innovations.is_empty()
    }
}

/// Builds the noise covariance from `psi`, runs the filter selected by
/// `kind` and returns its innovations with full covariances.
///
/// The square-root variant reconstructs `F[t] = √F[t] √F[t]ᵗ`.
///
/// # Errors
/// Fails if `psi` does not fit the model dimensions.
pub fn log_likelihood_inputs<T: RealField + Float + Copy>(
    psi: &[T],
    model: &StateSpaceModel<T>,
    kind: FilterKind,
    config: &FilterConfig<T>,
) -> Result<LikelihoodInputs<T>> {
    let dims = model.dims();

    let inputs = match statespace_covariance(psi, dims.p, dims.r, kind)? {
        NoiseCovariance::Factors(factors) => {
            let filter = sqrt_kalman_filter(model, &factors, config)?;
            LikelihoodInputs {
                innovation_covariances: filter.sqrt_f.iter().map(gram).collect(),
                innovations: filter.v,
            }
        }
        NoiseCovariance::Full(cov) => {
            let filter = kalman_filter(model, &cov, config)?;
            LikelihoodInputs {
                innovations: filter.v,
                innovation_covariances: filter.f,
            }
        }
    };

    tracing::trace!(kind = ?kind, steps = inputs.len(), "likelihood inputs");
    Ok(inputs)
}
