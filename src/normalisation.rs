//! Normalisation factors for measurement amplitudes.
//!
//! The estimators return raw binned sums; these factors scale them to the
//! conventional amplitudes. Particle-based factors sum catalogue columns
//! directly, mesh-based factors integrate the gridded mean density, and
//! periodic-box factors reduce to volume and particle-count ratios.

use crate::catalogue::{LineOfSight, ParticleCatalogue};
use crate::config::ParameterSet;
use crate::error::{ClusteringError, Result};
use crate::mesh::MeshField;

/// Particle-based power spectrum normalisation `1 / (α Σ w² n̄)`.
pub fn powspec_norm_from_particles(catalogue: &ParticleCatalogue, alpha: f64) -> Result<f64> {
    let integral: f64 = catalogue
        .particles()
        .iter()
        .map(|p| p.nz * p.w * p.w)
        .sum();
    if integral <= 0.0 {
        return Err(ClusteringError::InvalidInput(
            "Power spectrum normalisation sum vanished; missing `nz` column?".to_string(),
        ));
    }
    Ok(1.0 / (alpha * integral))
}

/// Particle-based bispectrum normalisation `1 / (α² Σ w³ n̄²)`.
pub fn bispec_norm_from_particles(catalogue: &ParticleCatalogue, alpha: f64) -> Result<f64> {
    let integral: f64 = catalogue
        .particles()
        .iter()
        .map(|p| p.nz * p.nz * p.w.powi(3))
        .sum();
    if integral <= 0.0 {
        return Err(ClusteringError::InvalidInput(
            "Bispectrum normalisation sum vanished; missing `nz` column?".to_string(),
        ));
    }
    Ok(1.0 / (alpha * alpha * integral))
}

/// Mesh-based power spectrum normalisation `1 / ∫ n̄²(x) d³x` from the
/// gridded harmonic-monopole mean density.
pub fn powspec_norm_from_mesh(
    catalogue: &ParticleCatalogue,
    los: &[LineOfSight],
    params: &ParameterSet,
    alpha: f64,
) -> Result<f64> {
    let integral = mean_density_power_integral(catalogue, los, params, alpha, 2)?;
    Ok(1.0 / integral)
}

/// Mesh-based bispectrum normalisation `1 / ∫ n̄³(x) d³x`.
pub fn bispec_norm_from_mesh(
    catalogue: &ParticleCatalogue,
    los: &[LineOfSight],
    params: &ParameterSet,
    alpha: f64,
) -> Result<f64> {
    let integral = mean_density_power_integral(catalogue, los, params, alpha, 3)?;
    Ok(1.0 / integral)
}

/// Periodic-box power spectrum normalisation `V / N²`.
pub fn powspec_norm_in_box(num_particles: usize, volume: f64) -> f64 {
    volume / (num_particles as f64) / (num_particles as f64)
}

/// Periodic-box bispectrum normalisation `V² / N³`.
pub fn bispec_norm_in_box(num_particles: usize, volume: f64) -> f64 {
    volume * volume / (num_particles as f64).powi(3)
}

fn mean_density_power_integral(
    catalogue: &ParticleCatalogue,
    los: &[LineOfSight],
    params: &ParameterSet,
    alpha: f64,
    power: i32,
) -> Result<f64> {
    let mut mean_density = MeshField::new(params)?;
    mean_density.ylm_weighted_mean_density(catalogue, los, alpha, 0, 0)?;

    let dv = params.cell_volume();
    let integral: f64 = mean_density
        .cells()
        .iter()
        .map(|cell| cell.re.powi(power) * dv)
        .sum();
    if integral <= 0.0 {
        return Err(ClusteringError::InvalidInput(
            "Mesh normalisation integral vanished; is the catalogue empty?".to_string(),
        ));
    }
    Ok(integral)
}
