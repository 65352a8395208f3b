//! Model construction
//!
//! Noise covariance factors from a flat parameter vector and constructors
//! for common structural models.

mod noise;
mod structural;

pub use noise::*;
pub use structural::*;
