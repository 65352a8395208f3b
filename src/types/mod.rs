//! Core types: the state-space system, noise covariances and dense helpers

pub mod covariance;
pub mod system;
pub mod transforms;
