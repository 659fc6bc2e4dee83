//! Two-point statistics kernels.
//!
//! Mode power and pair correlation accumulated per harmonic order, with
//! shot-noise subtraction, assignment-window compensation and two-stage
//! (fine then coarse) shell binning. The fine tables decouple the
//! wavenumber quantisation of the mesh from the requested bin layout and
//! keep mode counts exact.

use num_complex::Complex64;
use rustfft::FftDirection;

use crate::catalogue::{LineOfSight, Particle, ParticleCatalogue};
use crate::config::{
    Binning, ParameterSet, FINE_BIN_COUNT_K, FINE_BIN_COUNT_R, FINE_BIN_WIDTH_K, FINE_BIN_WIDTH_R,
};
use crate::error::{ClusteringError, Result};
use crate::maths::reduced_spherical_harmonic;
use crate::mesh::{fft, FieldSpace, MeshField};
use crate::memory;

/// Bin edge layout for the coarse reduction.
enum BinWidths {
    /// Uniform width taken from the first two centres.
    Regular,
    /// Per-bin widths from neighbouring centres.
    Irregular,
}

/// Binned two-point statistics for one harmonic order.
///
/// Holds the per-bin accumulators for both the power spectrum and the
/// two-point correlation function; a given measurement fills one of the
/// two.
pub struct TwoPointStatistics {
    /// Binned power spectrum.
    pub pk: Vec<Complex64>,
    /// Wave modes contributing per wavenumber bin.
    pub nmode_pk: Vec<u64>,
    /// Binned two-point correlation function.
    pub xi: Vec<Complex64>,
    /// Cell pairs contributing per separation bin.
    pub npair_xi: Vec<u64>,
    params: ParameterSet,
}

impl TwoPointStatistics {
    /// Set up zeroed accumulators matching the parameter binning.
    pub fn new(params: &ParameterSet) -> Self {
        Self {
            pk: vec![Complex64::new(0.0, 0.0); params.num_kbin],
            nmode_pk: vec![0; params.num_kbin],
            xi: vec![Complex64::new(0.0, 0.0); params.num_rbin],
            npair_xi: vec![0; params.num_rbin],
            params: params.clone(),
        }
    }

    /// Binned power spectrum of two Fourier-space density fields.
    ///
    /// Per mode: form `δ_a conj(δ_b)`, subtract `shotnoise * S(k)`,
    /// compensate by `W(k)²`, weight by `Y_ℓm(k̂)`, then deposit into the
    /// fine wavenumber table and reduce onto the requested bins.
    pub fn power_spec(
        &mut self,
        density_a: &MeshField,
        density_b: &MeshField,
        kbin: &[f64],
        shotnoise: Complex64,
        ell: i32,
        m: i32,
    ) -> Result<()> {
        debug_assert_eq!(density_a.space(), FieldSpace::Fourier);
        debug_assert_eq!(density_b.space(), FieldSpace::Fourier);
        if kbin.len() != self.pk.len() {
            return Err(ClusteringError::InvalidInput(format!(
                "Requested {} wavenumber bins but accumulators hold {}.",
                kbin.len(),
                self.pk.len()
            )));
        }

        let mut pk_fine = Vec::new();
        pk_fine.try_reserve_exact(FINE_BIN_COUNT_K)?;
        pk_fine.resize(FINE_BIN_COUNT_K, Complex64::new(0.0, 0.0));
        let mut nmode_fine = vec![0u64; FINE_BIN_COUNT_K];
        memory::track_alloc(FINE_BIN_COUNT_K * (std::mem::size_of::<Complex64>() + 8));

        let nmesh = self.params.nmesh;
        let scheme = self.params.assignment;
        let boxsize = self.params.boxsize;

        for i in 0..nmesh[0] {
            for j in 0..nmesh[1] {
                for k in 0..nmesh[2] {
                    let flat = (i * nmesh[1] + j) * nmesh[2] + k;
                    let kvec = density_a.wavevector([i, j, k]);
                    let kmag =
                        (kvec[0] * kvec[0] + kvec[1] * kvec[1] + kvec[2] * kvec[2]).sqrt();

                    let idx = (kmag / FINE_BIN_WIDTH_K + 0.5) as usize;
                    if idx >= FINE_BIN_COUNT_K {
                        continue;
                    }

                    let mut mode_power = density_a[flat] * density_b[flat].conj();
                    mode_power -= shotnoise * scheme.shotnoise_fourier(kvec, nmesh, boxsize);

                    let win = scheme.window_fourier(kvec, nmesh, boxsize);
                    mode_power /= win * win;

                    mode_power *= reduced_spherical_harmonic(ell, m, kvec);

                    pk_fine[idx] += mode_power;
                    nmode_fine[idx] += 1;
                }
            }
        }

        reduce_fine_bins(
            &pk_fine,
            &nmode_fine,
            FINE_BIN_WIDTH_K,
            kbin,
            BinWidths::Regular,
            &mut self.pk,
            &mut self.nmode_pk,
        );
        average_bins(&mut self.pk, &self.nmode_pk, "wavenumber");

        memory::track_release(FINE_BIN_COUNT_K * (std::mem::size_of::<Complex64>() + 8));
        Ok(())
    }

    /// Binned two-point correlation function of two Fourier-space density
    /// fields.
    ///
    /// The 3-D mode power (shot-subtracted and window-compensated, scaled
    /// by `1/V`) is inverse-transformed, then cells are weighted by
    /// `Y_ℓm(r̂)` and shell-binned over separation.
    pub fn corr_func(
        &mut self,
        density_a: &MeshField,
        density_b: &MeshField,
        rbin: &[f64],
        shotnoise: Complex64,
        ell: i32,
        m: i32,
    ) -> Result<()> {
        if rbin.len() != self.xi.len() {
            return Err(ClusteringError::InvalidInput(format!(
                "Requested {} separation bins but accumulators hold {}.",
                rbin.len(),
                self.xi.len()
            )));
        }

        let mut pair_corr_3d = self.mode_power_grid(density_a, density_b, shotnoise)?;
        fft::fft3d(&mut pair_corr_3d, self.params.nmesh, FftDirection::Inverse);

        let mut xi_fine = vec![Complex64::new(0.0, 0.0); FINE_BIN_COUNT_R];
        let mut npair_fine = vec![0u64; FINE_BIN_COUNT_R];
        memory::track_alloc(FINE_BIN_COUNT_R * (std::mem::size_of::<Complex64>() + 8));

        let nmesh = self.params.nmesh;
        for i in 0..nmesh[0] {
            for j in 0..nmesh[1] {
                for k in 0..nmesh[2] {
                    let flat = (i * nmesh[1] + j) * nmesh[2] + k;
                    let rvec = density_a.separation([i, j, k]);
                    let rmag =
                        (rvec[0] * rvec[0] + rvec[1] * rvec[1] + rvec[2] * rvec[2]).sqrt();

                    let idx = (rmag / FINE_BIN_WIDTH_R + 0.5) as usize;
                    if idx >= FINE_BIN_COUNT_R {
                        continue;
                    }

                    let pair_corr =
                        pair_corr_3d[flat] * reduced_spherical_harmonic(ell, m, rvec);
                    xi_fine[idx] += pair_corr;
                    npair_fine[idx] += 1;
                }
            }
        }

        reduce_fine_bins(
            &xi_fine,
            &npair_fine,
            FINE_BIN_WIDTH_R,
            rbin,
            BinWidths::Regular,
            &mut self.xi,
            &mut self.npair_xi,
        );
        average_bins(&mut self.xi, &self.npair_xi, "separation");

        memory::track_release(FINE_BIN_COUNT_R * (std::mem::size_of::<Complex64>() + 8));
        memory::track_release(pair_corr_3d.len() * std::mem::size_of::<Complex64>());
        Ok(())
    }

    /// Two-point correlation function variant for three-point
    /// measurements.
    ///
    /// Cells are weighted by the product of two pre-tabulated harmonic
    /// grids instead of a single `Y_ℓm(r̂)`, bins may be irregular, and
    /// the finalised values are scaled by
    /// `(-1)^{ℓ1+ℓ2} / dV / n_pair²` — the squared pair count matches the
    /// three-point normalisation convention and is kept as such.
    pub fn corr_func_ylm_pair(
        &mut self,
        density_a: &MeshField,
        density_b: &MeshField,
        rbin: &[f64],
        shotnoise: Complex64,
        ylm_a: &[Complex64],
        ylm_b: &[Complex64],
    ) -> Result<()> {
        if rbin.len() != self.xi.len() {
            return Err(ClusteringError::InvalidInput(format!(
                "Requested {} separation bins but accumulators hold {}.",
                rbin.len(),
                self.xi.len()
            )));
        }
        if ylm_a.len() != self.params.nmesh_tot() || ylm_b.len() != self.params.nmesh_tot() {
            return Err(ClusteringError::InvalidInput(
                "Harmonic grids do not match the mesh size.".to_string(),
            ));
        }

        let mut pair_corr_3d = self.mode_power_grid(density_a, density_b, shotnoise)?;
        fft::fft3d(&mut pair_corr_3d, self.params.nmesh, FftDirection::Inverse);

        let mut xi_fine = vec![Complex64::new(0.0, 0.0); FINE_BIN_COUNT_R];
        let mut npair_fine = vec![0u64; FINE_BIN_COUNT_R];
        memory::track_alloc(FINE_BIN_COUNT_R * (std::mem::size_of::<Complex64>() + 8));

        let nmesh = self.params.nmesh;
        for i in 0..nmesh[0] {
            for j in 0..nmesh[1] {
                for k in 0..nmesh[2] {
                    let flat = (i * nmesh[1] + j) * nmesh[2] + k;
                    let rvec = density_a.separation([i, j, k]);
                    let rmag =
                        (rvec[0] * rvec[0] + rvec[1] * rvec[1] + rvec[2] * rvec[2]).sqrt();

                    let idx = (rmag / FINE_BIN_WIDTH_R + 0.5) as usize;
                    if idx >= FINE_BIN_COUNT_R {
                        continue;
                    }

                    xi_fine[idx] += pair_corr_3d[flat] * ylm_a[flat] * ylm_b[flat];
                    npair_fine[idx] += 1;
                }
            }
        }

        reduce_fine_bins(
            &xi_fine,
            &npair_fine,
            FINE_BIN_WIDTH_R,
            rbin,
            BinWidths::Irregular,
            &mut self.xi,
            &mut self.npair_xi,
        );

        let dv = self.params.cell_volume();
        let parity = if (self.params.ell1 + self.params.ell2) % 2 == 0 {
            1.0
        } else {
            -1.0
        };
        for (value, &count) in self.xi.iter_mut().zip(&self.npair_xi) {
            if count != 0 {
                *value *= parity / dv / (count as f64) / (count as f64);
            } else {
                *value = Complex64::new(0.0, 0.0);
            }
        }

        memory::track_release(FINE_BIN_COUNT_R * (std::mem::size_of::<Complex64>() + 8));
        memory::track_release(pair_corr_3d.len() * std::mem::size_of::<Complex64>());
        Ok(())
    }

    /// Real-space pair-correlation grid for bispectrum shot-noise terms.
    ///
    /// Fills `out` with the inverse transform of the shot-subtracted,
    /// window-compensated mode power, leaving it in configuration space.
    pub fn bispec_shotnoise_grid(
        &self,
        density_a: &MeshField,
        density_b: &MeshField,
        shotnoise: Complex64,
        out: &mut MeshField,
    ) -> Result<()> {
        let grid = self.mode_power_grid(density_a, density_b, shotnoise)?;
        out.cells_mut().copy_from_slice(&grid);
        fft::fft3d(out.cells_mut(), self.params.nmesh, FftDirection::Inverse);
        out.set_space(FieldSpace::Configuration);

        memory::track_release(grid.len() * std::mem::size_of::<Complex64>());
        Ok(())
    }

    /// Shot-subtracted, window-compensated 3-D mode power scaled by `1/V`.
    ///
    /// The caller owns the returned buffer and releases its ledger entry.
    fn mode_power_grid(
        &self,
        density_a: &MeshField,
        density_b: &MeshField,
        shotnoise: Complex64,
    ) -> Result<Vec<Complex64>> {
        debug_assert_eq!(density_a.space(), FieldSpace::Fourier);
        debug_assert_eq!(density_b.space(), FieldSpace::Fourier);

        let total = self.params.nmesh_tot();
        let mut grid = Vec::new();
        grid.try_reserve_exact(total)?;
        memory::track_alloc(total * std::mem::size_of::<Complex64>());

        let nmesh = self.params.nmesh;
        let scheme = self.params.assignment;
        let boxsize = self.params.boxsize;
        let vol_factor = 1.0 / self.params.volume();

        for i in 0..nmesh[0] {
            for j in 0..nmesh[1] {
                for k in 0..nmesh[2] {
                    let flat = (i * nmesh[1] + j) * nmesh[2] + k;
                    let kvec = density_a.wavevector([i, j, k]);

                    let mut mode_power = density_a[flat] * density_b[flat].conj();
                    mode_power -= shotnoise * scheme.shotnoise_fourier(kvec, nmesh, boxsize);

                    let win = scheme.window_fourier(kvec, nmesh, boxsize);
                    mode_power /= win * win;

                    grid.push(mode_power * vol_factor);
                }
            }
        }

        Ok(grid)
    }

    /// Shot-noise amplitude for survey power spectrum measurements:
    /// `Σ_data w² Y_ℓm + α² Σ_rand w² Y_ℓm`, each sum carrying a single
    /// harmonic weight.
    pub fn shotnoise_for_power_spec(
        data: &ParticleCatalogue,
        rand: &ParticleCatalogue,
        los_data: &[LineOfSight],
        los_rand: &[LineOfSight],
        alpha: f64,
        ell: i32,
        m: i32,
    ) -> Result<Complex64> {
        let sum_data = ylm_weight_sum(data.particles(), los_data, ell, m, 2)?;
        let sum_rand = ylm_weight_sum(rand.particles(), los_rand, ell, m, 2)?;
        Ok(sum_data + sum_rand * (alpha * alpha))
    }

    /// Shot-noise amplitude for box reconstruction power spectra:
    /// `N_data + α² N_rand`.
    pub fn shotnoise_for_power_spec_box_recon(
        data: &ParticleCatalogue,
        rand: &ParticleCatalogue,
        alpha: f64,
    ) -> Complex64 {
        Complex64::new(data.len() as f64 + alpha * alpha * rand.len() as f64, 0.0)
    }

    /// Shot-noise amplitude for correlation window measurements:
    /// `α² Σ_rand w² Y_ℓm`.
    pub fn shotnoise_for_corr_func_window(
        rand: &ParticleCatalogue,
        los_rand: &[LineOfSight],
        alpha: f64,
        ell: i32,
        m: i32,
    ) -> Result<Complex64> {
        let sum_rand = ylm_weight_sum(rand.particles(), los_rand, ell, m, 2)?;
        Ok(sum_rand * (alpha * alpha))
    }

    /// Bispectrum self-pair shot-noise amplitude:
    /// `Σ_data w³ Y_ℓm − α³ Σ_rand w³ Y_ℓm`.
    pub fn shotnoise_for_bispec_self(
        data: &ParticleCatalogue,
        rand: &ParticleCatalogue,
        los_data: &[LineOfSight],
        los_rand: &[LineOfSight],
        alpha: f64,
        ell: i32,
        m: i32,
    ) -> Result<Complex64> {
        let sum_data = ylm_weight_sum(data.particles(), los_data, ell, m, 3)?;
        let sum_rand = ylm_weight_sum(rand.particles(), los_rand, ell, m, 3)?;
        Ok(sum_data - sum_rand * alpha.powi(3))
    }
}

/// Direct harmonic-weighted weight-power sum over a catalogue.
fn ylm_weight_sum(
    particles: &[Particle],
    los: &[LineOfSight],
    ell: i32,
    m: i32,
    weight_power: i32,
) -> Result<Complex64> {
    if particles.len() != los.len() {
        return Err(ClusteringError::InvalidInput(format!(
            "Particle and line-of-sight counts differ: {} vs {}.",
            particles.len(),
            los.len()
        )));
    }

    let mut sum = Complex64::new(0.0, 0.0);
    for (particle, los) in particles.iter().zip(los) {
        sum += reduced_spherical_harmonic(ell, m, los.pos) * particle.w.powi(weight_power);
    }
    Ok(sum)
}

/// Reduce fine sampling slots onto the requested bins.
///
/// Each bin `j` covers `(c_j − Δ⁻/2, c_j + Δ⁺/2]` with the lowest edge
/// clamped at zero; fine slots are swept in index order so the reduction
/// is deterministic.
fn reduce_fine_bins(
    fine: &[Complex64],
    counts_fine: &[u64],
    fine_width: f64,
    centres: &[f64],
    widths: BinWidths,
    out: &mut [Complex64],
    out_counts: &mut [u64],
) {
    out.fill(Complex64::new(0.0, 0.0));
    out_counts.fill(0);

    let num = centres.len();
    for j in 0..num {
        let (half_lower, half_upper) = match widths {
            BinWidths::Regular => {
                let width = centres[1] - centres[0];
                (0.5 * width, 0.5 * width)
            }
            BinWidths::Irregular => {
                let lower = if j == 0 {
                    centres[1] - centres[0]
                } else {
                    centres[j] - centres[j - 1]
                };
                let upper = if j == num - 1 {
                    centres[num - 1] - centres[num - 2]
                } else {
                    centres[j + 1] - centres[j]
                };
                (0.5 * lower, 0.5 * upper)
            }
        };

        let lower = if centres[j] > half_lower {
            centres[j] - half_lower
        } else {
            0.0
        };
        let upper = centres[j] + half_upper;

        for (i, (value, &count)) in fine.iter().zip(counts_fine).enumerate() {
            let sample = i as f64 * fine_width;
            if sample > lower && sample <= upper {
                out[j] += *value;
                out_counts[j] += count;
            }
        }
    }
}

/// Average accumulated bins by their counts, zeroing empty bins.
fn average_bins(values: &mut [Complex64], counts: &[u64], label: &str) {
    for (j, (value, &count)) in values.iter_mut().zip(counts).enumerate() {
        if count != 0 {
            *value /= count as f64;
        } else {
            *value = Complex64::new(0.0, 0.0);
            log::warn!("No modes or pairs fell in {label} bin {j}; value set to zero.");
        }
    }
}

/// Reject multipole degrees outside the two-point contract.
pub(crate) fn check_two_point_degrees(params: &ParameterSet) -> Result<()> {
    if params.ell1 != params.ell_los || params.ell2 != 0 {
        return Err(ClusteringError::InvalidConfig(
            "Two-point measurements require `ell1 = ell_los` and `ell2 = 0`.".to_string(),
        ));
    }
    Ok(())
}

/// Reject binnings that do not match the parameter bin counts.
pub(crate) fn check_binning(params: &ParameterSet, binning: &Binning) -> Result<()> {
    if binning.kbin.len() != params.num_kbin || binning.rbin.len() != params.num_rbin {
        return Err(ClusteringError::InvalidInput(
            "Binning does not match the parameter set bin counts.".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::AssignmentScheme;
    use approx::assert_relative_eq;

    fn test_params() -> ParameterSet {
        ParameterSet {
            nmesh: [8, 8, 8],
            boxsize: [100.0, 100.0, 100.0],
            assignment: AssignmentScheme::Ngp,
            num_kbin: 4,
            kmin: 0.1,
            kmax: 0.4,
            num_rbin: 4,
            rmin: 10.0,
            rmax: 40.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_reduce_fine_bins_counts_exactly() {
        // Fine slots at 0.0, 0.1, 0.2, ... with one count each; a bin
        // centred at 0.2 with width 0.2 covers (0.1, 0.3].
        let fine: Vec<Complex64> = (0..10).map(|i| Complex64::new(i as f64, 0.0)).collect();
        let counts: Vec<u64> = vec![1; 10];
        let centres = [0.2, 0.4];
        let mut out = vec![Complex64::new(0.0, 0.0); 2];
        let mut out_counts = vec![0u64; 2];

        reduce_fine_bins(
            &fine,
            &counts,
            0.1,
            &centres,
            BinWidths::Regular,
            &mut out,
            &mut out_counts,
        );

        // (0.1, 0.3] picks slots 2 and 3; (0.3, 0.5] picks slots 4 and 5.
        assert_eq!(out_counts, vec![2, 2]);
        assert_relative_eq!(out[0].re, 2.0 + 3.0);
        assert_relative_eq!(out[1].re, 4.0 + 5.0);
    }

    #[test]
    fn test_reduce_fine_bins_clamps_lowest_edge() {
        let fine: Vec<Complex64> = (0..10).map(|_| Complex64::new(1.0, 0.0)).collect();
        let counts: Vec<u64> = vec![1; 10];
        // First bin centred at 0.05 with widths of 0.2 would dip below
        // zero; the lower edge clamps there instead.
        let centres = [0.05, 0.25];
        let mut out = vec![Complex64::new(0.0, 0.0); 2];
        let mut out_counts = vec![0u64; 2];

        reduce_fine_bins(
            &fine,
            &counts,
            0.1,
            &centres,
            BinWidths::Regular,
            &mut out,
            &mut out_counts,
        );

        // (0, 0.15] picks slot 1 only (slot 0 sits at exactly 0).
        assert_eq!(out_counts[0], 1);
    }

    #[test]
    fn test_reduce_fine_bins_irregular_widths() {
        let fine: Vec<Complex64> = (0..40).map(|_| Complex64::new(1.0, 0.0)).collect();
        let counts: Vec<u64> = vec![1; 40];
        let centres = [1.0, 2.0, 3.5];
        let mut out = vec![Complex64::new(0.0, 0.0); 3];
        let mut out_counts = vec![0u64; 3];

        reduce_fine_bins(
            &fine,
            &counts,
            0.1,
            &centres,
            BinWidths::Irregular,
            &mut out,
            &mut out_counts,
        );

        // Middle bin spans (1.5, 2.75]: slots 16..=27.
        assert_eq!(out_counts[1], 12);
    }

    #[test]
    fn test_power_spec_counts_all_modes() {
        // With disjoint bins spanning the whole grid, every mode except
        // DC lands in exactly one bin.
        let params = ParameterSet {
            num_kbin: 8,
            kmin: 0.1,
            kmax: 0.8,
            ..test_params()
        };
        let mut field = MeshField::new(&params).unwrap();
        let catalogue = crate::catalogue::ParticleCatalogue::from_columns(
            &[12.5, 50.0],
            &[25.0, 75.0],
            &[37.5, 12.5],
            &[0.0; 2],
            &[1.0; 2],
            &[1.0; 2],
        )
        .unwrap();
        field.box_fluctuation(&catalogue).unwrap();
        field.forward_fft();

        let mut stats = TwoPointStatistics::new(&params);
        let kbin: Vec<f64> = (0..8).map(|i| 0.1 + 0.1 * i as f64).collect();
        stats
            .power_spec(&field, &field, &kbin, Complex64::new(0.0, 0.0), 0, 0)
            .unwrap();

        // The fundamental mode is 2 pi / 100 and the largest folded
        // magnitude sqrt(3) * 4 * 2 pi / 100, so the bins cover all 511
        // non-DC modes.
        let counted: u64 = stats.nmode_pk.iter().sum();
        assert_eq!(counted, 511);
    }

    #[test]
    fn test_power_spec_matches_naive_reference() {
        // With zero shot noise the binned monopole equals the mode
        // average of the window-compensated |δ(k)|² over each shell.
        let params = test_params();
        let catalogue = crate::catalogue::ParticleCatalogue::from_columns(
            &[12.5, 62.5, 25.0],
            &[37.5, 12.5, 87.5],
            &[50.0, 25.0, 12.5],
            &[0.0; 3],
            &[1.0; 3],
            &[1.0; 3],
        )
        .unwrap();
        let mut field = MeshField::new(&params).unwrap();
        field.box_fluctuation(&catalogue).unwrap();
        field.forward_fft();

        let mut stats = TwoPointStatistics::new(&params);
        let kbin: Vec<f64> = vec![0.1, 0.2, 0.3, 0.4];
        stats
            .power_spec(&field, &field, &kbin, Complex64::new(0.0, 0.0), 0, 0)
            .unwrap();

        // Naive reference: direct shell sums over the grid.
        let nmesh = params.nmesh;
        let dkbin = kbin[1] - kbin[0];
        for (j, &centre) in kbin.iter().enumerate() {
            let mut reference = Complex64::new(0.0, 0.0);
            let mut count = 0u64;
            for i in 0..nmesh[0] {
                for jj in 0..nmesh[1] {
                    for kk in 0..nmesh[2] {
                        let flat = (i * nmesh[1] + jj) * nmesh[2] + kk;
                        let kvec = field.wavevector([i, jj, kk]);
                        let kmag = (kvec[0] * kvec[0]
                            + kvec[1] * kvec[1]
                            + kvec[2] * kvec[2])
                            .sqrt();
                        // Mirror the fine-table quantisation.
                        let fine_mag =
                            (kmag / FINE_BIN_WIDTH_K + 0.5).floor() * FINE_BIN_WIDTH_K;
                        let lower = (centre - dkbin / 2.0).max(0.0);
                        let upper = centre + dkbin / 2.0;
                        if fine_mag > lower && fine_mag <= upper {
                            let win = params.assignment.window_fourier(
                                kvec,
                                params.nmesh,
                                params.boxsize,
                            );
                            reference += field[flat] * field[flat].conj() / (win * win);
                            count += 1;
                        }
                    }
                }
            }
            if count > 0 {
                reference /= count as f64;
            }
            assert_eq!(stats.nmode_pk[j], count, "mode count mismatch in bin {j}");
            assert_relative_eq!(stats.pk[j].re, reference.re, max_relative = 1e-10);
        }
    }

    #[test]
    fn test_shotnoise_subtraction_lowers_high_k_power() {
        let params = test_params();
        let catalogue = crate::catalogue::ParticleCatalogue::from_columns(
            &[12.5, 62.5, 25.0, 87.5],
            &[37.5, 12.5, 87.5, 62.5],
            &[50.0, 25.0, 12.5, 75.0],
            &[0.0; 4],
            &[1.0; 4],
            &[1.0; 4],
        )
        .unwrap();
        let mut field = MeshField::new(&params).unwrap();
        field.box_fluctuation(&catalogue).unwrap();
        field.forward_fft();

        let kbin = vec![0.1, 0.2, 0.3, 0.4];
        let mut raw = TwoPointStatistics::new(&params);
        raw.power_spec(&field, &field, &kbin, Complex64::new(0.0, 0.0), 0, 0)
            .unwrap();
        let mut subtracted = TwoPointStatistics::new(&params);
        subtracted
            .power_spec(
                &field,
                &field,
                &kbin,
                Complex64::new(catalogue.len() as f64, 0.0),
                0,
                0,
            )
            .unwrap();

        for j in 0..kbin.len() {
            if raw.nmode_pk[j] > 0 {
                assert!(subtracted.pk[j].re < raw.pk[j].re);
            }
        }
    }

    #[test]
    fn test_corr_func_pair_counts_cover_grid() {
        let params = test_params();
        let catalogue = crate::catalogue::ParticleCatalogue::from_columns(
            &[12.5, 62.5],
            &[37.5, 12.5],
            &[50.0, 25.0],
            &[0.0; 2],
            &[1.0; 2],
            &[1.0; 2],
        )
        .unwrap();
        let mut field = MeshField::new(&params).unwrap();
        field.box_fluctuation(&catalogue).unwrap();
        field.forward_fft();

        let mut stats = TwoPointStatistics::new(&params);
        let rbin = vec![10.0, 20.0, 30.0, 40.0];
        stats
            .corr_func(&field, &field, &rbin, Complex64::new(0.0, 0.0), 0, 0)
            .unwrap();

        let counted: u64 = stats.npair_xi.iter().sum();
        assert!(counted > 0 && counted <= 512);
    }

    #[test]
    fn test_corr_func_ylm_pair_applies_squared_count_scaling() {
        let params = test_params();
        let catalogue = crate::catalogue::ParticleCatalogue::from_columns(
            &[12.5, 62.5],
            &[37.5, 12.5],
            &[50.0, 25.0],
            &[0.0; 2],
            &[1.0; 2],
            &[1.0; 2],
        )
        .unwrap();
        let mut field = MeshField::new(&params).unwrap();
        field.box_fluctuation(&catalogue).unwrap();
        field.forward_fft();

        let ylm = vec![Complex64::new(1.0, 0.0); params.nmesh_tot()];
        let rbin = vec![10.0, 20.0, 30.0, 40.0];

        let mut plain = TwoPointStatistics::new(&params);
        plain
            .corr_func(&field, &field, &rbin, Complex64::new(0.0, 0.0), 0, 0)
            .unwrap();
        let mut paired = TwoPointStatistics::new(&params);
        paired
            .corr_func_ylm_pair(
                &field,
                &field,
                &rbin,
                Complex64::new(0.0, 0.0),
                &ylm,
                &ylm,
            )
            .unwrap();

        // With unit harmonic grids the variant differs from the plain
        // correlation only by the 1/(dV n_pair) scaling.
        let dv = params.cell_volume();
        for j in 0..rbin.len() {
            let count = plain.npair_xi[j];
            if count != 0 {
                assert_relative_eq!(
                    paired.xi[j].re,
                    plain.xi[j].re / dv / count as f64,
                    max_relative = 1e-10
                );
            }
        }
    }

    #[test]
    fn test_shotnoise_scalars() {
        let catalogue = crate::catalogue::ParticleCatalogue::from_columns(
            &[10.0, 20.0],
            &[10.0, 20.0],
            &[10.0, 20.0],
            &[0.0; 2],
            &[2.0; 2],
            &[1.0; 2],
        )
        .unwrap();
        let los = catalogue.compute_los();

        // Monopole harmonic weight is 1: sums reduce to plain powers.
        let n_ps = TwoPointStatistics::shotnoise_for_power_spec(
            &catalogue, &catalogue, &los, &los, 0.5, 0, 0,
        )
        .unwrap();
        assert_relative_eq!(n_ps.re, 8.0 + 0.25 * 8.0, epsilon = 1e-12);

        let n_win =
            TwoPointStatistics::shotnoise_for_corr_func_window(&catalogue, &los, 0.5, 0, 0)
                .unwrap();
        assert_relative_eq!(n_win.re, 0.25 * 8.0, epsilon = 1e-12);

        let n_self = TwoPointStatistics::shotnoise_for_bispec_self(
            &catalogue, &catalogue, &los, &los, 1.0, 0, 0,
        )
        .unwrap();
        assert_relative_eq!(n_self.re, 0.0, epsilon = 1e-12);

        let n_box = TwoPointStatistics::shotnoise_for_power_spec_box_recon(
            &catalogue, &catalogue, 2.0,
        );
        assert_relative_eq!(n_box.re, 2.0 + 4.0 * 2.0, epsilon = 1e-12);
    }
}
