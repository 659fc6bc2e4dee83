//! Wavenumber and separation binning.
//!
//! Bin centres are an ordered, strictly increasing sequence. Mode and pair
//! deposition first lands in very fine sampling tables (the constants
//! below), then fine slots are reduced onto the requested bins, so user
//! bins may be laid out independently of the wavenumber quantisation the
//! mesh imposes.

use crate::error::{ClusteringError, Result};

use super::ParameterSet;

/// Width of a fine wavenumber sampling slot.
pub const FINE_BIN_WIDTH_K: f64 = 1e-4;

/// Number of fine wavenumber sampling slots.
pub const FINE_BIN_COUNT_K: usize = 100_000;

/// Width of a fine separation sampling slot.
pub const FINE_BIN_WIDTH_R: f64 = 0.5;

/// Number of fine separation sampling slots.
pub const FINE_BIN_COUNT_R: usize = 10_000;

/// Bin centres for wavenumbers and separations.
#[derive(Clone, Debug)]
pub struct Binning {
    /// Wavenumber bin centres.
    pub kbin: Vec<f64>,
    /// Separation bin centres.
    pub rbin: Vec<f64>,
}

impl Binning {
    /// Regular (uniformly spaced) binning from the parameter ranges.
    pub fn from_params(params: &ParameterSet) -> Self {
        Self {
            kbin: linspace(params.kmin, params.kmax, params.num_kbin),
            rbin: linspace(params.rmin, params.rmax, params.num_rbin),
        }
    }

    /// Custom (possibly irregular) bin centres.
    ///
    /// Centres must be strictly increasing and no two neighbours may lie
    /// closer than the fine sampling resolution.
    pub fn from_centres(kbin: Vec<f64>, rbin: Vec<f64>) -> Result<Self> {
        validate_centres(&kbin, FINE_BIN_WIDTH_K, "wavenumber")?;
        validate_centres(&rbin, FINE_BIN_WIDTH_R, "separation")?;
        Ok(Self { kbin, rbin })
    }
}

fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    debug_assert!(num >= 2);
    let step = (stop - start) / (num - 1) as f64;
    (0..num).map(|i| start + i as f64 * step).collect()
}

fn validate_centres(centres: &[f64], fine_width: f64, label: &str) -> Result<()> {
    if centres.len() < 2 {
        return Err(ClusteringError::InvalidConfig(format!(
            "At least two {label} bins are needed."
        )));
    }
    for pair in centres.windows(2) {
        let width = pair[1] - pair[0];
        if width <= 0.0 {
            return Err(ClusteringError::InvalidConfig(format!(
                "{label} bin centres must be strictly increasing."
            )));
        }
        if width < fine_width {
            return Err(ClusteringError::InvalidConfig(format!(
                "{label} bin width {width:.3e} is below the sampling resolution {fine_width:.3e}."
            )));
        }
    }
    Ok(())
}
