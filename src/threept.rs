//! Shell extraction kernels for three-point measurements.
//!
//! Bispectrum and three-point correlation estimators need real-space
//! fields obtained by isolating (or Bessel-weighting) wavenumber content
//! of a Fourier-space density, compensating the assignment window and
//! inverse-transforming. Both kernels run the raw unnormalised backward
//! transform; their own prefactors carry the measure.

use num_complex::Complex64;
use rustfft::FftDirection;

use crate::error::{ClusteringError, Result};
use crate::maths::SphericalBessel;
use crate::mesh::{fft, FieldSpace, MeshField};

impl MeshField {
    /// Isolate a wavenumber shell of `density`, weight by a harmonic grid,
    /// inverse-transform and mode-average.
    ///
    /// Cells with `|k| ∈ (max(0, k̄−Δ/2), k̄+Δ/2]` receive
    /// `Y_ℓm(k̂) δ(k)/W(k)`; every other cell is zeroed. After the
    /// backward transform every cell is divided by the number of
    /// contributing modes, which is also returned.
    pub fn shell_isolated_inverse_fft(
        &mut self,
        density: &MeshField,
        k_centre: f64,
        k_width: f64,
        ylm: &[Complex64],
    ) -> Result<usize> {
        debug_assert_eq!(density.space(), FieldSpace::Fourier);

        let params = self.params().clone();
        let nmesh = params.nmesh;
        if ylm.len() != params.nmesh_tot() {
            return Err(ClusteringError::InvalidInput(
                "Harmonic grid does not match the mesh size.".to_string(),
            ));
        }

        let k_lower = if k_centre > k_width / 2.0 {
            k_centre - k_width / 2.0
        } else {
            0.0
        };
        let k_upper = k_centre + k_width / 2.0;

        let mut nmode = 0usize;
        for i in 0..nmesh[0] {
            for j in 0..nmesh[1] {
                for k in 0..nmesh[2] {
                    let flat = (i * nmesh[1] + j) * nmesh[2] + k;
                    let kvec = density.wavevector([i, j, k]);
                    let kmag =
                        (kvec[0] * kvec[0] + kvec[1] * kvec[1] + kvec[2] * kvec[2]).sqrt();

                    if kmag > k_lower && kmag <= k_upper {
                        let den = density[flat] / density.window(kvec);
                        self.cells_mut()[flat] = ylm[flat] * den;
                        nmode += 1;
                    } else {
                        self.cells_mut()[flat] = Complex64::new(0.0, 0.0);
                    }
                }
            }
        }

        fft::fft3d(self.cells_mut(), nmesh, FftDirection::Inverse);
        self.set_space(FieldSpace::Configuration);

        if nmode == 0 {
            log::warn!(
                "No modes fell in the shell around k = {k_centre:.4e}; field left at zero."
            );
            self.zero();
            return Ok(0);
        }

        let inv = 1.0 / nmode as f64;
        for cell in self.cells_mut() {
            *cell *= inv;
        }
        Ok(nmode)
    }

    /// Weight every mode of `density` by `j_ℓ(k r̄) Y_ℓm(k̂) / W(k) / V`
    /// and inverse-transform, for three-point correlation measurements.
    ///
    /// No shell gate and no mode-count normalisation; the Bessel
    /// interpolator carries the separation dependence.
    pub fn bessel_weighted_inverse_fft(
        &mut self,
        density: &MeshField,
        r_centre: f64,
        ylm: &[Complex64],
        bessel: &SphericalBessel,
    ) -> Result<()> {
        debug_assert_eq!(density.space(), FieldSpace::Fourier);

        let params = self.params().clone();
        let nmesh = params.nmesh;
        if ylm.len() != params.nmesh_tot() {
            return Err(ClusteringError::InvalidInput(
                "Harmonic grid does not match the mesh size.".to_string(),
            ));
        }

        let inv_vol = 1.0 / params.volume();
        for i in 0..nmesh[0] {
            for j in 0..nmesh[1] {
                for k in 0..nmesh[2] {
                    let flat = (i * nmesh[1] + j) * nmesh[2] + k;
                    let kvec = density.wavevector([i, j, k]);
                    let kmag =
                        (kvec[0] * kvec[0] + kvec[1] * kvec[1] + kvec[2] * kvec[2]).sqrt();

                    let den = density[flat] / density.window(kvec);
                    self.cells_mut()[flat] =
                        ylm[flat] * den * (bessel.eval(kmag * r_centre) * inv_vol);
                }
            }
        }

        fft::fft3d(self.cells_mut(), nmesh, FftDirection::Inverse);
        self.set_space(FieldSpace::Configuration);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::ParticleCatalogue;
    use crate::config::ParameterSet;
    use crate::maths::ylm_fourier_grid;
    use crate::mesh::AssignmentScheme;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn test_params() -> ParameterSet {
        ParameterSet {
            nmesh: [8, 8, 8],
            boxsize: [100.0, 100.0, 100.0],
            assignment: AssignmentScheme::Ngp,
            ..Default::default()
        }
    }

    fn fourier_density(params: &ParameterSet) -> MeshField {
        let catalogue = ParticleCatalogue::from_columns(
            &[12.5, 62.5, 25.0],
            &[37.5, 12.5, 87.5],
            &[50.0, 25.0, 12.5],
            &[0.0; 3],
            &[1.0; 3],
            &[1.0; 3],
        )
        .unwrap();
        let mut field = MeshField::new(params).unwrap();
        field.box_fluctuation(&catalogue).unwrap();
        field.forward_fft();
        field
    }

    #[test]
    fn test_fundamental_shell_holds_six_modes() {
        // A tight shell around k = 2π/L contains exactly the six
        // axis-permuted fundamental modes of a cubic grid.
        let params = test_params();
        let density = fourier_density(&params);
        let ylm = ylm_fourier_grid(0, 0, params.nmesh, params.boxsize).unwrap();

        let k_fund = 2.0 * PI / 100.0;
        let mut shell = MeshField::new(&params).unwrap();
        let nmode = shell
            .shell_isolated_inverse_fft(&density, k_fund, 0.2 * k_fund, &ylm)
            .unwrap();

        assert_eq!(nmode, 6);
    }

    #[test]
    fn test_shell_output_is_mode_averaged_inverse_fft() {
        // Zero out everything but the selected shell by hand, backward
        // transform, and divide by the count: the kernel must agree.
        let params = test_params();
        let density = fourier_density(&params);
        let ylm = ylm_fourier_grid(0, 0, params.nmesh, params.boxsize).unwrap();

        let k_fund = 2.0 * PI / 100.0;
        let mut shell = MeshField::new(&params).unwrap();
        let nmode = shell
            .shell_isolated_inverse_fft(&density, k_fund, 0.2 * k_fund, &ylm)
            .unwrap();

        let nmesh = params.nmesh;
        let mut reference = vec![Complex64::new(0.0, 0.0); params.nmesh_tot()];
        for i in 0..nmesh[0] {
            for j in 0..nmesh[1] {
                for k in 0..nmesh[2] {
                    let flat = (i * nmesh[1] + j) * nmesh[2] + k;
                    let kvec = density.wavevector([i, j, k]);
                    let kmag = (kvec[0] * kvec[0] + kvec[1] * kvec[1] + kvec[2] * kvec[2])
                        .sqrt();
                    if kmag > 0.9 * k_fund && kmag <= 1.1 * k_fund {
                        reference[flat] = density[flat] / density.window(kvec);
                    }
                }
            }
        }
        fft::fft3d(&mut reference, nmesh, FftDirection::Inverse);

        for (cell, expected) in shell.cells().iter().zip(&reference) {
            let expected = expected / nmode as f64;
            assert_relative_eq!(cell.re, expected.re, epsilon = 1e-10);
            assert_relative_eq!(cell.im, expected.im, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_empty_shell_leaves_zero_field() {
        let params = test_params();
        let density = fourier_density(&params);
        let ylm = ylm_fourier_grid(0, 0, params.nmesh, params.boxsize).unwrap();

        // A shell far beyond the Nyquist frequency holds no modes.
        let mut shell = MeshField::new(&params).unwrap();
        let nmode = shell
            .shell_isolated_inverse_fft(&density, 50.0, 0.01, &ylm)
            .unwrap();

        assert_eq!(nmode, 0);
        assert!(shell.cells().iter().all(|c| c.norm() == 0.0));
    }

    #[test]
    fn test_bessel_weighted_monopole_at_zero_separation() {
        // j_0(0) = 1, so at r = 0 the kernel reduces to the plain
        // compensated inverse transform scaled by 1/V.
        let params = test_params();
        let density = fourier_density(&params);
        let ylm = ylm_fourier_grid(0, 0, params.nmesh, params.boxsize).unwrap();
        let bessel = SphericalBessel::new(0).unwrap();

        let mut weighted = MeshField::new(&params).unwrap();
        weighted
            .bessel_weighted_inverse_fft(&density, 0.0, &ylm, &bessel)
            .unwrap();

        let nmesh = params.nmesh;
        let mut reference = vec![Complex64::new(0.0, 0.0); params.nmesh_tot()];
        for i in 0..nmesh[0] {
            for j in 0..nmesh[1] {
                for k in 0..nmesh[2] {
                    let flat = (i * nmesh[1] + j) * nmesh[2] + k;
                    let kvec = density.wavevector([i, j, k]);
                    reference[flat] =
                        density[flat] / density.window(kvec) / params.volume();
                }
            }
        }
        fft::fft3d(&mut reference, nmesh, FftDirection::Inverse);

        for (cell, expected) in weighted.cells().iter().zip(&reference) {
            assert_relative_eq!(cell.re, expected.re, epsilon = 1e-10);
            assert_relative_eq!(cell.im, expected.im, epsilon = 1e-10);
        }
    }
}
