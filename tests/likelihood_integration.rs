//! Integration tests for the covariance factor builder and likelihood inputs

mod common;

use rand::rngs::StdRng;
use rand::SeedableRng;

use common::{assert_psd, log_likelihood, random_psi, simulate_local_level};
use sqrtkf::prelude::*;

#[test]
fn test_random_psi_gives_psd_covariances() {
    let mut rng = StdRng::seed_from_u64(42);

    for (p, r) in [(1, 1), (1, 3), (2, 2), (2, 6), (3, 3), (3, 9)] {
        for _ in 0..20 {
            let psi = random_psi(&mut rng, p, r);
            let factors = covariance_factors(&psi, p, r).unwrap();

            assert_eq!(factors.sqrt_h.shape(), (p, p));
            assert_eq!(factors.sqrt_q.shape(), (r, r));
            for i in 0..p {
                for j in i + 1..p {
                    assert_eq!(factors.sqrt_h[(i, j)], 0.0);
                }
            }
            assert_psd(&factors.h(), "H");
            assert_psd(&factors.q(), "Q");
        }
    }
}

#[test]
fn test_q_blocks_are_independent() {
    let mut rng = StdRng::seed_from_u64(8);
    let psi = random_psi(&mut rng, 2, 6);
    let q = covariance_factors(&psi, 2, 6).unwrap().q();

    for i in 0..6 {
        for j in 0..6 {
            if i / 2 != j / 2 {
                assert_eq!(q[(i, j)], 0.0, "Q[{}, {}] couples blocks", i, j);
            }
        }
    }
}

#[test]
fn test_true_parameters_score_higher() {
    let y = simulate_local_level(200, 1, 1.0, 0.5, 99);
    let model = local_level(y).unwrap();
    let config = FilterConfig::default();

    let truth = [1.0, 0.5_f64.sqrt()];
    let wrong = [5.0, 0.1];

    for kind in [FilterKind::SquareRoot, FilterKind::Covariance] {
        let good = log_likelihood_inputs(&truth, &model, kind, &config).unwrap();
        let bad = log_likelihood_inputs(&wrong, &model, kind, &config).unwrap();

        // The first step only carries the diffuse prior
        assert!(log_likelihood(&good, 1) > log_likelihood(&bad, 1));
    }
}

#[test]
fn test_variants_give_same_likelihood() {
    let y = simulate_local_level(60, 2, 0.8, 0.3, 4);
    let model = local_level(y).unwrap();
    let psi = [0.9, 0.1, 0.8, 0.6, -0.1, 0.5];
    let config = FilterConfig::default()
        .with_diffuse_scale(1e3)
        .without_steady_state();

    let sqrt = log_likelihood_inputs(&psi, &model, FilterKind::SquareRoot, &config).unwrap();
    let full = log_likelihood_inputs(&psi, &model, FilterKind::Covariance, &config).unwrap();

    let (a, b) = (log_likelihood(&sqrt, 1), log_likelihood(&full, 1));
    assert!((a - b).abs() < 1e-8 * b.abs(), "{} vs {}", a, b);
}

#[test]
fn test_statespace_covariance_kinds() {
    let psi = [1.0_f64, 0.5, 2.0, 0.3, 0.1, 0.4];
    let factors = match statespace_covariance(&psi, 2, 2, FilterKind::SquareRoot).unwrap() {
        NoiseCovariance::Factors(f) => f,
        NoiseCovariance::Full(_) => panic!("expected factors"),
    };
    let full = match statespace_covariance(&psi, 2, 2, FilterKind::Covariance).unwrap() {
        NoiseCovariance::Full(c) => c,
        NoiseCovariance::Factors(_) => panic!("expected full covariance"),
    };

    assert_eq!(factors.h(), full.h);
    assert_eq!(factors.q(), full.q);
    assert!((full.h[(1, 0)] - 0.5).abs() < 1e-12);
    assert_eq!(full.h.shape(), (2, 2));
}

#[test]
fn test_disturbance_must_be_multiple() {
    let model = linear_trend(simulate_local_level(10, 2, 1.0, 1.0, 1)).unwrap();
    // r = 4, p = 2: fine
    let psi = vec![1.0; parameter_count(2, 4).unwrap()];
    assert!(log_likelihood_inputs(&psi, &model, FilterKind::SquareRoot, &FilterConfig::default()).is_ok());

    assert_eq!(
        statespace_covariance(&[1.0; 6], 2, 3, FilterKind::SquareRoot).unwrap_err(),
        KalmanError::DisturbanceNotMultiple { p: 2, r: 3 }
    );
}
