//! Post-processing of filter output
//!
//! Full-matrix assembly, likelihood ingredients and forecasting.

mod assembly;
mod forecast;
mod likelihood;

pub use assembly::*;
pub use forecast::*;
pub use likelihood::*;
