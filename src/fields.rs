//! Weighted field constructions.
//!
//! Builders that turn data and random catalogues into the density
//! fluctuation, mean-density and shot-noise companion fields consumed by
//! the estimators. Harmonic weights are evaluated on each particle's line
//! of sight; the random catalogue is brought to the data weight scale by
//! the `alpha` contrast.

use num_complex::Complex64;

use crate::catalogue::{LineOfSight, Particle, ParticleCatalogue};
use crate::error::{ClusteringError, Result};
use crate::maths::reduced_spherical_harmonic;
use crate::mesh::MeshField;

/// Per-particle harmonic weights `Y_ℓm(los) * w^power`, optionally
/// conjugated.
fn ylm_weights(
    particles: &[Particle],
    los: &[LineOfSight],
    ell: i32,
    m: i32,
    conjugate: bool,
    weight_power: i32,
) -> Result<Vec<Complex64>> {
    if particles.len() != los.len() {
        return Err(ClusteringError::InvalidInput(format!(
            "Particle and line-of-sight counts differ: {} vs {}.",
            particles.len(),
            los.len()
        )));
    }

    let mut weights = Vec::new();
    weights.try_reserve_exact(particles.len())?;
    for (particle, los) in particles.iter().zip(los) {
        let mut ylm = reduced_spherical_harmonic(ell, m, los.pos);
        if conjugate {
            ylm = ylm.conj();
        }
        weights.push(ylm * particle.w.powi(weight_power));
    }
    Ok(weights)
}

fn unit_weights(n: usize) -> Result<Vec<Complex64>> {
    let mut weights = Vec::new();
    weights.try_reserve_exact(n)?;
    weights.resize(n, Complex64::new(1.0, 0.0));
    Ok(weights)
}

impl MeshField {
    /// Harmonic-weighted density fluctuation `δn_LM`.
    ///
    /// Assigns `Y_ℓm(r̂) w` over the data catalogue, the same over the
    /// random catalogue into a scratch field, and subtracts `alpha` times
    /// the random field.
    pub fn ylm_weighted_fluctuation(
        &mut self,
        data: &ParticleCatalogue,
        rand: &ParticleCatalogue,
        los_data: &[LineOfSight],
        los_rand: &[LineOfSight],
        alpha: f64,
        ell: i32,
        m: i32,
    ) -> Result<()> {
        let weights = ylm_weights(data.particles(), los_data, ell, m, false, 1)?;
        self.assign(data.particles(), &weights)?;

        let mut scratch = MeshField::new(self.params())?;
        let weights = ylm_weights(rand.particles(), los_rand, ell, m, false, 1)?;
        scratch.assign(rand.particles(), &weights)?;

        for (cell, rand_cell) in self.cells_mut().iter_mut().zip(scratch.cells()) {
            *cell -= *rand_cell * alpha;
        }
        Ok(())
    }

    /// Harmonic-weighted mean density `n̄_LM` from the random catalogue.
    pub fn ylm_weighted_mean_density(
        &mut self,
        rand: &ParticleCatalogue,
        los_rand: &[LineOfSight],
        alpha: f64,
        ell: i32,
        m: i32,
    ) -> Result<()> {
        let weights = ylm_weights(rand.particles(), los_rand, ell, m, false, 1)?;
        self.assign(rand.particles(), &weights)?;

        for cell in self.cells_mut() {
            *cell *= alpha;
        }
        Ok(())
    }

    /// Shot-noise companion field for bispectrum measurements.
    ///
    /// Conjugated harmonic, squared particle weights, and the random
    /// contribution added with `alpha²` rather than subtracted.
    pub fn ylm_weighted_shotnoise_fields(
        &mut self,
        data: &ParticleCatalogue,
        rand: &ParticleCatalogue,
        los_data: &[LineOfSight],
        los_rand: &[LineOfSight],
        alpha: f64,
        ell: i32,
        m: i32,
    ) -> Result<()> {
        let weights = ylm_weights(data.particles(), los_data, ell, m, true, 2)?;
        self.assign(data.particles(), &weights)?;

        let mut scratch = MeshField::new(self.params())?;
        let weights = ylm_weights(rand.particles(), los_rand, ell, m, true, 2)?;
        scratch.assign(rand.particles(), &weights)?;

        let alpha2 = alpha * alpha;
        for (cell, rand_cell) in self.cells_mut().iter_mut().zip(scratch.cells()) {
            *cell += *rand_cell * alpha2;
        }
        Ok(())
    }

    /// Shot-noise companion of the mean density for three-point window
    /// measurements.
    ///
    /// Conjugated harmonic, squared weights, scaled by `alpha²`.
    pub fn ylm_weighted_mean_density_shotnoise(
        &mut self,
        rand: &ParticleCatalogue,
        los_rand: &[LineOfSight],
        alpha: f64,
        ell: i32,
        m: i32,
    ) -> Result<()> {
        let weights = ylm_weights(rand.particles(), los_rand, ell, m, true, 2)?;
        self.assign(rand.particles(), &weights)?;

        let alpha2 = alpha * alpha;
        for cell in self.cells_mut() {
            *cell *= alpha2;
        }
        Ok(())
    }

    /// Density fluctuation in a periodic box: unit weights minus the
    /// global mean `N/V`.
    pub fn box_fluctuation(&mut self, data: &ParticleCatalogue) -> Result<()> {
        let weights = unit_weights(data.len())?;
        self.assign(data.particles(), &weights)?;

        let mean = data.len() as f64 / self.params().volume();
        for cell in self.cells_mut() {
            cell.re -= mean;
        }
        Ok(())
    }

    /// Density fluctuation in a periodic box for reconstruction:
    /// unit-weight data minus `alpha` times unit-weight randoms.
    pub fn box_fluctuation_recon(
        &mut self,
        data: &ParticleCatalogue,
        rand: &ParticleCatalogue,
        alpha: f64,
    ) -> Result<()> {
        let weights = unit_weights(data.len())?;
        self.assign(data.particles(), &weights)?;

        let mut scratch = MeshField::new(self.params())?;
        let weights = unit_weights(rand.len())?;
        scratch.assign(rand.particles(), &weights)?;

        for (cell, rand_cell) in self.cells_mut().iter_mut().zip(scratch.cells()) {
            *cell -= *rand_cell * alpha;
        }
        Ok(())
    }

    /// Plain density in a periodic box (no mean subtraction), used as the
    /// bispectrum reference field.
    pub fn box_density(&mut self, data: &ParticleCatalogue) -> Result<()> {
        let weights = unit_weights(data.len())?;
        self.assign(data.particles(), &weights)
    }

    /// Survey-volume normalisation `N_rand² / ∫ n̄²(x) d³x` from a
    /// unit-weight assignment of the random catalogue.
    pub fn survey_volume_norm(&mut self, rand: &ParticleCatalogue) -> Result<f64> {
        let weights = unit_weights(rand.len())?;
        self.assign(rand.particles(), &weights)?;

        let dv = self.params().cell_volume();
        let integral: f64 = self.cells().iter().map(|c| c.re * c.re * dv).sum();
        if integral <= 0.0 {
            return Err(ClusteringError::InvalidInput(
                "Survey-volume integral vanished; is the random catalogue empty?".to_string(),
            ));
        }

        Ok(rand.len() as f64 * rand.len() as f64 / integral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParameterSet;
    use crate::mesh::AssignmentScheme;
    use approx::assert_relative_eq;

    fn test_params() -> ParameterSet {
        ParameterSet {
            nmesh: [8, 8, 8],
            boxsize: [100.0, 100.0, 100.0],
            assignment: AssignmentScheme::Cic,
            ..Default::default()
        }
    }

    fn uniform_catalogue(n_side: usize) -> ParticleCatalogue {
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut z = Vec::new();
        let step = 100.0 / n_side as f64;
        // Lattice sites coincide with mesh nodes so CIC deposits without
        // boundary splitting and the gridded density is exactly uniform.
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
        ParticleCatalogue::from_columns(&x, &y, &z, &vec![1e-4; n], &vec![1.0; n], &vec![1.0; n])
            .unwrap()
    }

    #[test]
    fn test_monopole_fluctuation_cancels_matched_catalogues() {
        // With alpha = 1 and identical catalogues the fluctuation vanishes.
        let params = test_params();
        let catalogue = uniform_catalogue(4);
        let los = catalogue.compute_los();

        let mut field = MeshField::new(&params).unwrap();
        field
            .ylm_weighted_fluctuation(&catalogue, &catalogue, &los, &los, 1.0, 0, 0)
            .unwrap();

        for cell in field.cells() {
            assert!(cell.norm() < 1e-10);
        }
    }

    #[test]
    fn test_mean_density_scales_with_alpha() {
        let params = test_params();
        let catalogue = uniform_catalogue(4);
        let los = catalogue.compute_los();

        let mut full = MeshField::new(&params).unwrap();
        full.ylm_weighted_mean_density(&catalogue, &los, 1.0, 0, 0)
            .unwrap();
        let mut half = MeshField::new(&params).unwrap();
        half.ylm_weighted_mean_density(&catalogue, &los, 0.5, 0, 0)
            .unwrap();

        for (a, b) in full.cells().iter().zip(half.cells()) {
            assert_relative_eq!(a.re, 2.0 * b.re, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_shotnoise_fields_add_random_contribution() {
        // Identical catalogues with alpha = 1: data and random terms add,
        // giving twice the single-catalogue w² field.
        let params = test_params();
        let catalogue = uniform_catalogue(4);
        let los = catalogue.compute_los();

        let mut combined = MeshField::new(&params).unwrap();
        combined
            .ylm_weighted_shotnoise_fields(&catalogue, &catalogue, &los, &los, 1.0, 0, 0)
            .unwrap();

        let mut single = MeshField::new(&params).unwrap();
        let weights = ylm_weights(catalogue.particles(), &los, 0, 0, true, 2).unwrap();
        single.assign(catalogue.particles(), &weights).unwrap();

        for (c, s) in combined.cells().iter().zip(single.cells()) {
            assert_relative_eq!(c.re, 2.0 * s.re, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_box_fluctuation_sums_to_zero() {
        let params = test_params();
        let catalogue = uniform_catalogue(4);

        let mut field = MeshField::new(&params).unwrap();
        field.box_fluctuation(&catalogue).unwrap();

        let total: f64 = field.cells().iter().map(|c| c.re).sum();
        assert_relative_eq!(total * params.cell_volume(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_box_fluctuation_recon_cancels_matched_catalogues() {
        let params = test_params();
        let catalogue = uniform_catalogue(4);

        let mut field = MeshField::new(&params).unwrap();
        field
            .box_fluctuation_recon(&catalogue, &catalogue, 1.0)
            .unwrap();

        for cell in field.cells() {
            assert!(cell.norm() < 1e-10);
        }
    }

    #[test]
    fn test_survey_volume_norm_uniform_catalogue() {
        // A uniform catalogue fills the box, so the integral is N²/V and
        // the normalisation reduces to the box volume.
        let params = test_params();
        let catalogue = uniform_catalogue(8);

        let mut field = MeshField::new(&params).unwrap();
        let norm = field.survey_volume_norm(&catalogue).unwrap();
        assert_relative_eq!(norm, params.volume(), max_relative = 1e-10);
    }

    #[test]
    fn test_mismatched_los_rejected() {
        let params = test_params();
        let catalogue = uniform_catalogue(2);
        let mut los = catalogue.compute_los();
        los.pop();

        let mut field = MeshField::new(&params).unwrap();
        let result =
            field.ylm_weighted_fluctuation(&catalogue, &catalogue, &los, &los, 1.0, 0, 0);
        assert!(matches!(result, Err(ClusteringError::InvalidInput(_))));
    }
}
