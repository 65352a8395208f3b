//! Linear Gaussian state-space systems
//!
//! A [`StateSpaceModel`] couples an observation series with the system
//! matrices of
//!
//! ```text
//! y[t]   = Z[t] α[t] + ε[t]
//! α[t+1] = T α[t] + R η[t]
//! ```
//!
//! and is validated once on construction, so the recursions never see
//! non-conformable inputs.

use alloc::vec::Vec;

use nalgebra::{DMatrix, DVector, RealField};

use super::transforms::check_shape;
use crate::{KalmanError, Result};

// ============================================================================
// Dimensions
// ============================================================================

/// Problem dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    /// Number of time points
    pub n: usize,
    /// Observation dimension
    pub p: usize,
    /// State dimension
    pub m: usize,
    /// State-disturbance dimension
    pub r: usize,
}

// ============================================================================
// Observation Loading
// ============================================================================

/// The observation matrix `Z`, either fixed or one matrix per time step.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservationLoading<T: RealField> {
    /// Same `p x m` matrix at every step
    Constant(DMatrix<T>),
    /// One `p x m` matrix per time step
    TimeVarying(Vec<DMatrix<T>>),
}

impl<T: RealField> ObservationLoading<T> {
    /// Returns `Z[t]`.
    ///
    /// # Panics
    /// Panics if `t` is out of range for a time-varying loading.
    #[inline]
    pub fn at(&self, t: usize) -> &DMatrix<T> {
        match self {
            ObservationLoading::Constant(z) => z,
            ObservationLoading::TimeVarying(zs) => &zs[t],
        }
    }

    /// Returns the loading of the last time step.
    #[inline]
    pub fn last(&self) -> Option<&DMatrix<T>> {
        match self {
            ObservationLoading::Constant(z) => Some(z),
            ObservationLoading::TimeVarying(zs) => zs.last(),
        }
    }

    /// Returns true if `Z` changes over time.
    #[inline]
    pub fn is_time_varying(&self) -> bool {
        matches!(self, ObservationLoading::TimeVarying(_))
    }
}

// ============================================================================
// System Matrices
// ============================================================================

/// System matrices `Z`, `T`, `R` of a state-space model.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemMatrices<T: RealField> {
    /// Observation loading (p x m)
    pub z: ObservationLoading<T>,
    /// State transition (m x m)
    pub t: DMatrix<T>,
    /// State-disturbance loading (m x r)
    pub r: DMatrix<T>,
}

impl<T: RealField> SystemMatrices<T> {
    /// Creates time-invariant system matrices.
    pub fn new(z: DMatrix<T>, t: DMatrix<T>, r: DMatrix<T>) -> Self {
        Self {
            z: ObservationLoading::Constant(z),
            t,
            r,
        }
    }

    /// Creates system matrices with one observation matrix per time step.
    pub fn time_varying(z: Vec<DMatrix<T>>, t: DMatrix<T>, r: DMatrix<T>) -> Self {
        Self {
            z: ObservationLoading::TimeVarying(z),
            t,
            r,
        }
    }
}

// ============================================================================
// State-Space Model
// ============================================================================

/// An observation series together with conformable system matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSpaceModel<T: RealField> {
    y: Vec<DVector<T>>,
    system: SystemMatrices<T>,
    dims: Dimensions,
}

impl<T: RealField + Copy> StateSpaceModel<T> {
    /// Creates a model, checking that `y`, `Z`, `T` and `R` are conformable.
    ///
    /// `p` is taken from the first observation, `m` from `T` and `r` from
    /// the columns of `R`.
    pub fn new(y: Vec<DVector<T>>, system: SystemMatrices<T>) -> Result<Self> {
        let n = y.len();
        let p = y.first().ok_or(KalmanError::EmptySeries)?.len();
        let m = system.t.nrows();
        let r = system.r.ncols();

        if p == 0 {
            return Err(KalmanError::DimensionMismatch {
                what: "y",
                expected: (1, 1),
                found: (0, 1),
            });
        }
        if m == 0 {
            return Err(KalmanError::DimensionMismatch {
                what: "T",
                expected: (1, 1),
                found: (0, 0),
            });
        }

        for obs in &y {
            if obs.len() != p {
                return Err(KalmanError::DimensionMismatch {
                    what: "y",
                    expected: (p, 1),
                    found: (obs.len(), 1),
                });
            }
        }

        check_shape("T", &system.t, (m, m))?;
        check_shape("R", &system.r, (m, r))?;
        match &system.z {
            ObservationLoading::Constant(z) => check_shape("Z", z, (p, m))?,
            ObservationLoading::TimeVarying(zs) => {
                if zs.len() != n {
                    return Err(KalmanError::DimensionMismatch {
                        what: "Z (time steps)",
                        expected: (n, 1),
                        found: (zs.len(), 1),
                    });
                }
                for z in zs {
                    check_shape("Z", z, (p, m))?;
                }
            }
        }

        Ok(Self {
            y,
            system,
            dims: Dimensions { n, p, m, r },
        })
    }

    /// Creates a model from an `n x p` matrix whose rows are observations.
    pub fn from_rows(y: &DMatrix<T>, system: SystemMatrices<T>) -> Result<Self> {
        let series = y.row_iter().map(|row| row.transpose()).collect();
        Self::new(series, system)
    }

    /// Returns the problem dimensions.
    #[inline]
    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    /// Returns `y[t]`.
    #[inline]
    pub fn observation(&self, t: usize) -> &DVector<T> {
        &self.y[t]
    }

    /// Returns the system matrices.
    #[inline]
    pub fn system(&self) -> &SystemMatrices<T> {
        &self.system
    }

    /// Returns `Z[t]`.
    #[inline]
    pub fn z(&self, t: usize) -> &DMatrix<T> {
        self.system.z.at(t)
    }

    /// Returns the transition matrix `T`.
    #[inline]
    pub fn transition(&self) -> &DMatrix<T> {
        &self.system.t
    }

    /// Returns the disturbance loading `R`.
    #[inline]
    pub fn disturbance_loading(&self) -> &DMatrix<T> {
        &self.system.r
    }
}
