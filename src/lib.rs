//! # Taara Clustering
//!
//! Two- and three-point clustering statistics of 3D particle catalogues
//! measured on FFT meshes.
//!
//! ## Overview
//!
//! The library maps weighted point catalogues onto a regular complex mesh,
//! moves fields between configuration and Fourier space, and assembles
//! multipole-decomposed estimators weighted by reduced spherical
//! harmonics:
//!
//! - **Power spectrum / two-point correlation** - shot-noise-subtracted,
//!   window-compensated multipoles on binned wavenumbers or separations
//! - **Bispectrum / three-point correlation** - shell-isolated or
//!   Bessel-weighted legs combined through Wigner couplings
//! - **Window variants** - the same statistics measured from the random
//!   catalogue alone
//! - **Periodic-box variants** - single-pass measurements for simulation
//!   snapshots
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use taara_clustering::{
//!     compute_powspec, alpha_contrast, powspec_norm_from_particles,
//!     Binning, ParameterSet, ParticleCatalogue,
//! };
//!
//! let params = ParameterSet::from_toml_str(r#"
//!     nmesh = [256, 256, 256]
//!     boxsize = [1000.0, 1000.0, 1000.0]
//!     assignment = "TSC"
//!     ell1 = 0
//!     ell_los = 0
//! "#)?;
//! let binning = Binning::from_params(&params);
//!
//! let data = ParticleCatalogue::from_columns(&x, &y, &z, &nz, &ws, &wc)?;
//! let rand = ParticleCatalogue::from_columns(&xr, &yr, &zr, &nzr, &wsr, &wcr)?;
//! let (los_data, los_rand) = (data.compute_los(), rand.compute_los());
//!
//! let alpha = alpha_contrast(&data, &rand);
//! let norm = powspec_norm_from_particles(&rand, alpha)?;
//! let measurement = compute_powspec(
//!     &data, &rand, &los_data, &los_rand, &params, &binning, norm,
//! )?;
//!
//! println!("P_0(k[0]) = {:.6e}", measurement.pk[0].re);
//! ```
//!
//! ## Conventions
//!
//! Meshes are row-major with cell `(i, j, k)` at flat index
//! `(i * nmesh[1] + j) * nmesh[2] + k`. Forward transforms use the
//! negative-exponent convention with the `dV` measure prefactor; inverse
//! transforms carry `1/V`. Wave vectors fold Hermitian-style with the DC
//! mode at the origin cell.

#![warn(missing_docs)]

// Particle catalogues and lines of sight
pub mod catalogue;

// Measurement configuration and binning
pub mod config;

// Estimator orchestration
pub mod estimators;

// Error types
pub mod error;

// Weighted field constructions
pub mod fields;

// Harmonics, Wigner symbols and Bessel functions
pub mod maths;

// Allocation ledger
pub mod memory;

// Mesh fields, assignment and transforms
pub mod mesh;

// Normalisation factors
pub mod normalisation;

// Three-point shell extraction kernels
pub mod threept;

// Two-point statistics kernels
pub mod twopt;

// Re-export commonly used types
pub use catalogue::{alpha_contrast, LineOfSight, Particle, ParticleCatalogue};

pub use config::{Binning, BispecForm, ParameterSet};

pub use error::{ClusteringError, Result};

pub use maths::{reduced_spherical_harmonic, wigner_3j, SphericalBessel};

pub use mesh::{AssignmentScheme, FieldSpace, MeshField};

pub use twopt::TwoPointStatistics;

pub use estimators::{
    compute_3pcf, compute_3pcf_in_box, compute_3pcf_window, compute_bispec,
    compute_bispec_in_box, compute_corrfunc, compute_corrfunc_in_box, compute_corrfunc_window,
    compute_powspec, compute_powspec_in_box, compute_powspec_in_box_recon,
    compute_powspec_window, BispecMeasurements, PowspecMeasurements, ThreePcfMeasurements,
    TwoPcfMeasurements,
};

pub use normalisation::{
    bispec_norm_from_mesh, bispec_norm_from_particles, bispec_norm_in_box,
    powspec_norm_from_mesh, powspec_norm_from_particles, powspec_norm_in_box,
};
