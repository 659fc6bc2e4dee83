//! Shared helpers for measurement integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use taara_clustering::ParticleCatalogue;

/// Uniform Poisson catalogue with unit weights filling `[0, boxsize)³`.
pub fn poisson_catalogue(n: usize, boxsize: f64, seed: u64) -> ParticleCatalogue {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    let mut z = Vec::with_capacity(n);
    for _ in 0..n {
        x.push(rng.gen::<f64>() * boxsize);
        y.push(rng.gen::<f64>() * boxsize);
        z.push(rng.gen::<f64>() * boxsize);
    }

    let nbar = n as f64 / boxsize.powi(3);
    ParticleCatalogue::from_columns(
        &x,
        &y,
        &z,
        &vec![nbar; n],
        &vec![1.0; n],
        &vec![1.0; n],
    )
    .unwrap()
}

/// Regular lattice catalogue aligned with the mesh nodes.
pub fn lattice_catalogue(n_side: usize, boxsize: f64) -> ParticleCatalogue {
    let step = boxsize / n_side as f64;
    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut z = Vec::new();
    for i in 0..n_side {
        for j in 0..n_side {
            for k in 0..n_side {
                x.push(i as f64 * step);
                y.push(j as f64 * step);
                z.push(k as f64 * step);
            }
        }
    }

    let n = x.len();
    let nbar = n as f64 / boxsize.powi(3);
    ParticleCatalogue::from_columns(
        &x,
        &y,
        &z,
        &vec![nbar; n],
        &vec![1.0; n],
        &vec![1.0; n],
    )
    .unwrap()
}
