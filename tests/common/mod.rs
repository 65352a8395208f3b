//! Common test helpers for filter and smoother integration tests

#![allow(dead_code)]

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use sqrtkf::filters::kalman::KalmanFilterOutput;
use sqrtkf::prelude::*;

/// Scalar observations as a series of 1-vectors
pub fn scalar_series(values: &[f64]) -> Vec<DVector<f64>> {
    values.iter().map(|&v| DVector::from_element(1, v)).collect()
}

/// The 20-point series of the local-level scenario
pub fn scenario_series() -> Vec<DVector<f64>> {
    scalar_series(&[
        1.0, 2.0, 1.5, 1.8, 2.2, 2.6, 2.1, 1.7, 1.9, 2.4, 2.8, 3.1, 2.7, 2.9, 3.3, 3.0, 2.6, 2.8,
        3.2, 3.5,
    ])
}

/// Scalar factors for `H = h`, `Q = q`
pub fn scalar_factors(h: f64, q: f64) -> CovarianceFactors<f64> {
    CovarianceFactors::new(
        DMatrix::from_element(1, 1, h.sqrt()),
        DMatrix::from_element(1, 1, q.sqrt()),
    )
    .unwrap()
}

/// Simulates a `p`-variate local level with independent unit-scale
/// components
pub fn simulate_local_level(n: usize, p: usize, h: f64, q: f64, seed: u64) -> Vec<DVector<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let obs_noise = Normal::new(0.0, h.sqrt()).unwrap();
    let state_noise = Normal::new(0.0, q.sqrt()).unwrap();

    let mut level = DVector::from_fn(p, |_, _| rng.random_range(-1.0..1.0));
    let mut y = Vec::with_capacity(n);
    for _ in 0..n {
        y.push(level.map(|l| l + obs_noise.sample(&mut rng)));
        level = level.map(|l| l + state_noise.sample(&mut rng));
    }
    y
}

/// Random parameter vector of the right length for `p`, `r`
pub fn random_psi(rng: &mut StdRng, p: usize, r: usize) -> Vec<f64> {
    let len = parameter_count(p, r).unwrap();
    (0..len).map(|_| rng.random_range(-2.0..2.0)).collect()
}

/// Smallest eigenvalue of a symmetric matrix
pub fn min_eigenvalue(m: &DMatrix<f64>) -> f64 {
    m.clone().symmetric_eigen().eigenvalues.min()
}

/// Asserts a Gram product is symmetric positive semi-definite up to rounding
pub fn assert_psd(m: &DMatrix<f64>, what: &str) {
    let scale = m.amax().max(1.0);
    assert!(
        (m - m.transpose()).amax() <= 1e-12 * scale,
        "{} is not symmetric",
        what
    );
    let min = min_eigenvalue(m);
    assert!(min >= -1e-9 * scale, "{} has eigenvalue {}", what, min);
}

/// Gaussian log-likelihood from innovations, skipping the first `skip` steps
pub fn log_likelihood(inputs: &LikelihoodInputs<f64>, skip: usize) -> f64 {
    let mut ll = 0.0;
    for (v, f) in inputs
        .innovations
        .iter()
        .zip(&inputs.innovation_covariances)
        .skip(skip)
    {
        let chol = f.clone().cholesky().unwrap();
        let det: f64 = chol.l().diagonal().iter().map(|d| 2.0 * d.ln()).sum();
        let quad = v.dot(&chol.solve(v));
        ll -= 0.5 * (v.len() as f64 * (2.0 * std::f64::consts::PI).ln() + det + quad);
    }
    ll
}

/// Smoothed means and covariances from the covariance filter, using the
/// plain `r`, `N` recursions
pub fn reference_smoother(
    model: &StateSpaceModel<f64>,
    filter: &KalmanFilterOutput<f64>,
) -> (Vec<DVector<f64>>, Vec<DMatrix<f64>>) {
    let dims = model.dims();
    let mut r = DVector::zeros(dims.m);
    let mut n = DMatrix::zeros(dims.m, dims.m);
    let mut alpha = vec![DVector::zeros(dims.m); dims.n];
    let mut v = vec![DMatrix::zeros(dims.m, dims.m); dims.n];

    for t in (0..dims.n).rev() {
        let z = model.z(t);
        let f_inv = filter.f[t].clone().try_inverse().unwrap();
        let l = model.transition() - &filter.k[t] * z;
        r = z.transpose() * &f_inv * &filter.v[t] + l.transpose() * &r;
        n = z.transpose() * &f_inv * z + l.transpose() * &n * &l;

        let p = &filter.p[t];
        alpha[t] = &filter.a[t] + p * &r;
        v[t] = p - p * &n * p;
    }
    (alpha, v)
}
