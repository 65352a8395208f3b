//! sqrtkf: Square-Root Kalman Filtering and Smoothing for Rust
//!
//! A square-root implementation of the Kalman filter and fixed-interval
//! smoother for linear Gaussian state-space models
//!
//! ```text
//! y[t]   = Z[t] α[t] + ε[t],     ε[t] ~ N(0, H)
//! α[t+1] = T α[t] + R η[t],      η[t] ~ N(0, Q)
//! ```
//!
//! Covariances are carried as lower-triangular factors (`P = √P √Pᵗ`) and
//! updated through orthogonal triangularization of stacked matrices, so the
//! reconstructed covariances stay symmetric positive semi-definite no matter
//! how many steps are run.
//!
//! # Features
//!
//! - **Square-root filter** with steady-state detection: once the covariance
//!   factor stops moving the gain is frozen and only the means are updated
//! - **Square-root smoother** with separate steady and transient regimes
//! - **Covariance factor builder** mapping a flat parameter vector to the
//!   noise factors, for use inside an external maximum-likelihood search
//! - **no_std Support**: Works with `alloc` only
//!
//! # Example
//!
//! ```
//! use nalgebra::DVector;
//! use sqrtkf::prelude::*;
//!
//! let y: Vec<DVector<f64>> = [1.0, 2.0, 1.5, 1.8, 2.2]
//!     .iter()
//!     .map(|&v| DVector::from_element(1, v))
//!     .collect();
//! let model = local_level(y).unwrap();
//!
//! // psi = [√H, √Q]
//! let factors = covariance_factors(&[1.0, 0.5_f64.sqrt()], 1, 1).unwrap();
//! let config = FilterConfig::default();
//!
//! let filter = sqrt_kalman_filter(&model, &factors, &config).unwrap();
//! let smoother = sqrt_kalman_smoother(&model, &filter, &config).unwrap();
//! assert_eq!(smoother.alpha.len(), 5);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod types;
pub mod models;
pub mod filters;
pub mod utils;

pub mod prelude {
    pub use crate::types::covariance::*;
    pub use crate::types::system::*;
    pub use crate::models::*;
    pub use crate::filters::kalman::*;
    pub use crate::filters::smoother::*;
    pub use crate::filters::sqrt_kalman::*;
    pub use crate::filters::{FilterConfig, FilterKind};
    pub use crate::utils::*;
    pub use crate::{KalmanError, Result};
}

/// Error types for the library
#[derive(Debug, Clone, PartialEq)]
pub enum KalmanError {
    /// A matrix or vector does not conform with the model dimensions
    DimensionMismatch {
        /// Name of the offending quantity
        what: &'static str,
        /// Expected `(rows, cols)`
        expected: (usize, usize),
        /// Actual `(rows, cols)`
        found: (usize, usize),
    },
    /// Parameter vector has the wrong length for the requested dimensions
    ParameterCount {
        /// Number of parameters the dimensions call for
        expected: usize,
        /// Number of parameters supplied
        found: usize,
    },
    /// Disturbance dimension is not a multiple of the observation dimension
    DisturbanceNotMultiple {
        /// Observation dimension
        p: usize,
        /// Disturbance dimension
        r: usize,
    },
    /// Triangular factorization of a covariance matrix failed
    NotPositiveDefinite {
        /// Name of the covariance matrix
        what: &'static str,
    },
    /// Observation series has no time points
    EmptySeries,
    /// Forecast requested for zero steps
    ZeroHorizon,
    /// Seasonal period too short for a structural model
    InvalidSeasonality(usize),
    /// Numerical computation became unstable
    NumericalInstability,
}

#[cfg(feature = "std")]
impl std::error::Error for KalmanError {}

impl ::core::fmt::Display for KalmanError {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        match self {
            KalmanError::DimensionMismatch {
                what,
                expected,
                found,
            } => write!(
                f,
                "Dimension mismatch in {}: expected {}x{}, found {}x{}",
                what, expected.0, expected.1, found.0, found.1
            ),
            KalmanError::ParameterCount { expected, found } => write!(
                f,
                "Expected {} free parameters, found {}",
                expected, found
            ),
            KalmanError::DisturbanceNotMultiple { p, r } => write!(
                f,
                "Disturbance dimension {} is not a multiple of observation dimension {}",
                r, p
            ),
            KalmanError::NotPositiveDefinite { what } => {
                write!(f, "Covariance {} is not positive definite", what)
            }
            KalmanError::EmptySeries => write!(f, "Observation series is empty"),
            KalmanError::ZeroHorizon => write!(f, "Forecast horizon must be positive"),
            KalmanError::InvalidSeasonality(s) => {
                write!(f, "Seasonal period must be at least 2, got {}", s)
            }
            KalmanError::NumericalInstability => write!(f, "Numerical instability detected"),
        }
    }
}

pub type Result<T> = ::core::result::Result<T, KalmanError>;
