//! Estimator orchestration.
//!
//! Top-level measurement routines assembling the multipole estimates from
//! harmonic-weighted fields, shot-noise amplitudes and Wigner couplings.
//! Each routine returns a plain-data measurement struct carrying bin
//! centres, values and the per-bin count channel.

pub mod threept;
pub mod twopt;

pub use threept::{
    compute_3pcf, compute_3pcf_in_box, compute_3pcf_window, compute_bispec,
    compute_bispec_in_box,
};
pub use twopt::{
    compute_corrfunc, compute_corrfunc_in_box, compute_corrfunc_window, compute_powspec,
    compute_powspec_in_box, compute_powspec_in_box_recon, compute_powspec_window,
};

use num_complex::Complex64;

/// Couplings below this magnitude are skipped.
pub(crate) const COUPLING_CUTOFF: f64 = 1e-10;

/// Binned power spectrum multipole measurement.
#[derive(Clone, Debug)]
pub struct PowspecMeasurements {
    /// Wavenumber bin centres.
    pub kbin: Vec<f64>,
    /// Normalised multipole values per bin.
    pub pk: Vec<Complex64>,
    /// Wave modes contributing per bin; zero marks an empty bin.
    pub nmodes: Vec<u64>,
}

/// Binned two-point correlation multipole measurement.
#[derive(Clone, Debug)]
pub struct TwoPcfMeasurements {
    /// Separation bin centres.
    pub rbin: Vec<f64>,
    /// Normalised multipole values per bin.
    pub xi: Vec<Complex64>,
    /// Cell pairs contributing per bin; zero marks an empty bin.
    pub npairs: Vec<u64>,
}

/// Binned bispectrum multipole measurement.
#[derive(Clone, Debug)]
pub struct BispecMeasurements {
    /// First wavenumber bin centres.
    pub k1bin: Vec<f64>,
    /// Second wavenumber bin centres.
    pub k2bin: Vec<f64>,
    /// Normalised, shot-subtracted multipole values per bin pair.
    pub bk: Vec<Complex64>,
    /// Normalised shot-noise component per bin pair.
    pub shot: Vec<Complex64>,
    /// Wave modes in the first shell per bin pair.
    pub nmodes1: Vec<u64>,
    /// Wave modes in the second shell per bin pair.
    pub nmodes2: Vec<u64>,
}

/// Binned three-point correlation multipole measurement.
#[derive(Clone, Debug)]
pub struct ThreePcfMeasurements {
    /// First separation bin centres.
    pub r1bin: Vec<f64>,
    /// Second separation bin centres.
    pub r2bin: Vec<f64>,
    /// Normalised, shot-subtracted multipole values per bin pair.
    pub zeta: Vec<Complex64>,
    /// Normalised shot-noise component per bin pair.
    pub shot: Vec<Complex64>,
    /// Cell pairs contributing to the shot-noise correlation per bin.
    pub npairs: Vec<u64>,
}
