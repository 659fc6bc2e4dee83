//! Measurement configuration.
//!
//! An immutable parameter set describing the mesh, the assignment scheme,
//! the multipole degrees and the requested binning, with TOML loading and
//! validation.

mod binning;
pub(crate) mod defaults;

pub use binning::{Binning, FINE_BIN_COUNT_K, FINE_BIN_COUNT_R, FINE_BIN_WIDTH_K, FINE_BIN_WIDTH_R};

use serde::{Deserialize, Serialize};

use crate::error::{ClusteringError, Result};
use crate::mesh::AssignmentScheme;

/// Bin sweep form for three-point measurements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BispecForm {
    /// First and second bins swept together along the diagonal.
    Diag,
    /// First bin fixed at `idx_bin`, second bin swept.
    Full,
}

/// Measurement parameter set.
///
/// Immutable once validated; estimators hold a clone per call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSet {
    /// Mesh cell count per axis.
    #[serde(default = "defaults::nmesh")]
    pub nmesh: [usize; 3],

    /// Physical box extent per axis.
    #[serde(default = "defaults::boxsize")]
    pub boxsize: [f64; 3],

    /// Mass-assignment scheme.
    #[serde(default = "defaults::assignment")]
    pub assignment: AssignmentScheme,

    /// First multipole degree.
    #[serde(default = "defaults::degree")]
    pub ell1: i32,

    /// Second multipole degree.
    #[serde(default = "defaults::degree")]
    pub ell2: i32,

    /// Line-of-sight multipole degree.
    #[serde(default = "defaults::degree")]
    pub ell_los: i32,

    /// Number of wavenumber bins.
    #[serde(default = "defaults::num_kbin")]
    pub num_kbin: usize,

    /// Centre of the lowest wavenumber bin.
    #[serde(default = "defaults::kmin")]
    pub kmin: f64,

    /// Centre of the highest wavenumber bin.
    #[serde(default = "defaults::kmax")]
    pub kmax: f64,

    /// Number of separation bins.
    #[serde(default = "defaults::num_rbin")]
    pub num_rbin: usize,

    /// Centre of the lowest separation bin.
    #[serde(default = "defaults::rmin")]
    pub rmin: f64,

    /// Centre of the highest separation bin.
    #[serde(default = "defaults::rmax")]
    pub rmax: f64,

    /// Bin sweep form for three-point measurements.
    #[serde(default = "default_form")]
    pub form: BispecForm,

    /// Fixed first-bin index for the `full` form.
    #[serde(default = "defaults::idx_bin")]
    pub idx_bin: usize,
}

fn default_form() -> BispecForm {
    BispecForm::Diag
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            nmesh: defaults::nmesh(),
            boxsize: defaults::boxsize(),
            assignment: defaults::assignment(),
            ell1: defaults::degree(),
            ell2: defaults::degree(),
            ell_los: defaults::degree(),
            num_kbin: defaults::num_kbin(),
            kmin: defaults::kmin(),
            kmax: defaults::kmax(),
            num_rbin: defaults::num_rbin(),
            rmin: defaults::rmin(),
            rmax: defaults::rmax(),
            form: default_form(),
            idx_bin: defaults::idx_bin(),
        }
    }
}

impl ParameterSet {
    /// Load and validate a parameter set from a TOML document.
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let params: ParameterSet = toml::from_str(document)
            .map_err(|e| ClusteringError::InvalidConfig(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Total number of mesh cells.
    #[inline]
    pub fn nmesh_tot(&self) -> usize {
        self.nmesh[0] * self.nmesh[1] * self.nmesh[2]
    }

    /// Physical box volume.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.boxsize[0] * self.boxsize[1] * self.boxsize[2]
    }

    /// Volume of a single mesh cell.
    #[inline]
    pub fn cell_volume(&self) -> f64 {
        self.volume() / self.nmesh_tot() as f64
    }

    /// Check the parameter set for internal consistency.
    pub fn validate(&self) -> Result<()> {
        for axis in 0..3 {
            if self.nmesh[axis] == 0 {
                return Err(ClusteringError::InvalidInput(format!(
                    "Mesh cell count must be positive on axis {axis}."
                )));
            }
            if self.boxsize[axis] <= 0.0 {
                return Err(ClusteringError::InvalidInput(format!(
                    "Box extent must be positive on axis {axis}."
                )));
            }
        }

        if self.ell1 < 0 || self.ell2 < 0 || self.ell_los < 0 {
            return Err(ClusteringError::InvalidConfig(
                "Multipole degrees must be non-negative.".to_string(),
            ));
        }

        if self.num_kbin < 2 || self.num_rbin < 2 {
            return Err(ClusteringError::InvalidConfig(
                "At least two bins are needed per dimension.".to_string(),
            ));
        }
        if self.kmax <= self.kmin || self.rmax <= self.rmin {
            return Err(ClusteringError::InvalidConfig(
                "Bin ranges must be increasing.".to_string(),
            ));
        }
        if self.idx_bin >= self.num_kbin.max(self.num_rbin) {
            return Err(ClusteringError::InvalidConfig(format!(
                "Fixed bin index {} lies outside the requested binning.",
                self.idx_bin
            )));
        }

        // Bin widths below the fine-sampling resolution alias.
        let dk = (self.kmax - self.kmin) / (self.num_kbin - 1) as f64;
        if dk < FINE_BIN_WIDTH_K {
            return Err(ClusteringError::InvalidConfig(format!(
                "Wavenumber bin width {dk:.3e} is below the sampling resolution {FINE_BIN_WIDTH_K:.3e}."
            )));
        }
        let dr = (self.rmax - self.rmin) / (self.num_rbin - 1) as f64;
        if dr < FINE_BIN_WIDTH_R {
            return Err(ClusteringError::InvalidConfig(format!(
                "Separation bin width {dr:.3e} is below the sampling resolution {FINE_BIN_WIDTH_R:.3e}."
            )));
        }

        Ok(())
    }
}
