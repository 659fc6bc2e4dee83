//! Bispectrum and three-point correlation estimators.
//!
//! The three-point estimators combine two harmonic-weighted legs built
//! from the monopole fluctuation (shell-isolated for the bispectrum,
//! Bessel-weighted for the correlation function) with the line-of-sight
//! field `G_LM`, reassembled through triple Wigner couplings. Shot noise
//! carries four contributions: the triple-self amplitude, one
//! power-spectrum-like term per collapsed leg, and a pair-correlation
//! cross term over the separation grid.

use log::{debug, info};
use num_complex::Complex64;

use crate::catalogue::{alpha_contrast, LineOfSight, ParticleCatalogue};
use crate::config::{Binning, BispecForm, ParameterSet};
use crate::error::{ClusteringError, Result};
use crate::maths::{wigner_3j, SphericalBessel};
use crate::maths::{ylm_fourier_grid, ylm_separation_grid};
use crate::memory;
use crate::mesh::MeshField;
use crate::twopt::{check_binning, TwoPointStatistics};

use super::{BispecMeasurements, ThreePcfMeasurements, COUPLING_CUTOFF};

/// Triple Wigner coupling for three-point multipole reassembly.
pub(crate) fn three_point_coupling(
    params: &ParameterSet,
    m_los: i32,
    m1: i32,
    m2: i32,
) -> f64 {
    f64::from(
        (2 * params.ell_los + 1) * (2 * params.ell1 + 1) * (2 * params.ell2 + 1),
    ) * wigner_3j(params.ell1, params.ell2, params.ell_los, 0, 0, 0)
        * wigner_3j(params.ell1, params.ell2, params.ell_los, m1, m2, m_los)
}

/// Reject degree triples whose couplings vanish identically.
pub(crate) fn check_three_point_degrees(params: &ParameterSet) -> Result<()> {
    let (l1, l2, l) = (params.ell1, params.ell2, params.ell_los);
    if l < (l1 - l2).abs() || l > l1 + l2 {
        return Err(ClusteringError::InvalidConfig(format!(
            "Degrees ({l1}, {l2}, {l}) violate the triangle condition."
        )));
    }
    if (l1 + l2 + l) % 2 != 0 {
        return Err(ClusteringError::InvalidConfig(format!(
            "Degrees ({l1}, {l2}, {l}) sum to an odd number; every coupling vanishes."
        )));
    }
    Ok(())
}

/// Output bin-pair index layout for the configured sweep form.
fn bin_pairs(params: &ParameterSet, num: usize) -> Result<Vec<(usize, usize)>> {
    match params.form {
        BispecForm::Diag => Ok((0..num).map(|j| (j, j)).collect()),
        BispecForm::Full => {
            if params.idx_bin >= num {
                return Err(ClusteringError::InvalidConfig(format!(
                    "Fixed bin index {} lies outside the {num} requested bins.",
                    params.idx_bin
                )));
            }
            Ok((0..num).map(|j| (params.idx_bin, j)).collect())
        }
    }
}

/// Conjugate a tabulated harmonic grid.
///
/// The shell and Bessel legs and the cross shot-noise term weight by the
/// conjugated harmonics; the shot-noise correlation grids stay
/// unconjugated.
fn conjugate_grid(mut grid: Vec<Complex64>) -> Vec<Complex64> {
    for cell in &mut grid {
        *cell = cell.conj();
    }
    grid
}

/// `i^n` for the plane-wave expansion phase.
fn imaginary_power(n: i32) -> Complex64 {
    match n.rem_euclid(4) {
        0 => Complex64::new(1.0, 0.0),
        1 => Complex64::new(0.0, 1.0),
        2 => Complex64::new(-1.0, 0.0),
        _ => Complex64::new(0.0, -1.0),
    }
}

/// `Σ_x f1(x) f2(x) g(x) dV` over the mesh.
fn triple_product_sum(f1: &MeshField, f2: &MeshField, g: &MeshField, dv: f64) -> Complex64 {
    let mut sum = Complex64::new(0.0, 0.0);
    for ((a, b), c) in f1.cells().iter().zip(f2.cells()).zip(g.cells()) {
        sum += a * b * c;
    }
    sum * dv
}

/// Bessel- and harmonic-weighted sum of a real-space pair-correlation grid,
/// the cross shot-noise term of the bispectrum.
fn cross_shotnoise_sum(
    xi_grid: &MeshField,
    k1: f64,
    k2: f64,
    bessel_1: &SphericalBessel,
    bessel_2: &SphericalBessel,
    ylm_r1: &[Complex64],
    ylm_r2: &[Complex64],
) -> Complex64 {
    let nmesh = xi_grid.params().nmesh;
    let dv = xi_grid.params().cell_volume();

    let mut sum = Complex64::new(0.0, 0.0);
    for i in 0..nmesh[0] {
        for j in 0..nmesh[1] {
            for k in 0..nmesh[2] {
                let flat = (i * nmesh[1] + j) * nmesh[2] + k;
                let rvec = xi_grid.separation([i, j, k]);
                let rmag =
                    (rvec[0] * rvec[0] + rvec[1] * rvec[1] + rvec[2] * rvec[2]).sqrt();

                sum += xi_grid[flat]
                    * ylm_r1[flat]
                    * ylm_r2[flat]
                    * (bessel_1.eval(k1 * rmag) * bessel_2.eval(k2 * rmag));
            }
        }
    }
    sum * dv
}

/// Per-order fields shared by the survey and window three-point loops.
struct LosOrderFields {
    /// Real-space `G_LM`.
    g_lm: MeshField,
    /// Fourier-space shot-noise companion `Q_LM`.
    q_lm: MeshField,
    /// Self shot-noise amplitude `N_LM`.
    n_lm: Complex64,
}

enum ThreePointSource<'a> {
    Survey {
        data: &'a ParticleCatalogue,
        rand: &'a ParticleCatalogue,
        los_data: &'a [LineOfSight],
        los_rand: &'a [LineOfSight],
        alpha: f64,
    },
    Window {
        rand: &'a ParticleCatalogue,
        los_rand: &'a [LineOfSight],
        alpha: f64,
    },
    Box {
        data: &'a ParticleCatalogue,
    },
}

impl<'a> ThreePointSource<'a> {
    /// Reference (monopole) field, Fourier-transformed.
    fn reference_field(&self, params: &ParameterSet) -> Result<MeshField> {
        let mut dn_00 = MeshField::new(params)?;
        match self {
            ThreePointSource::Survey {
                data,
                rand,
                los_data,
                los_rand,
                alpha,
            } => {
                dn_00.ylm_weighted_fluctuation(data, rand, los_data, los_rand, *alpha, 0, 0)?;
            }
            ThreePointSource::Window {
                rand,
                los_rand,
                alpha,
            } => {
                dn_00.ylm_weighted_mean_density(rand, los_rand, *alpha, 0, 0)?;
            }
            ThreePointSource::Box { data } => {
                // The box legs extract from the plain density; the mean
                // subtraction lives in `G_LM` only.
                dn_00.box_density(data)?;
            }
        }
        dn_00.forward_fft();
        Ok(dn_00)
    }

    /// Fields attached to one line-of-sight order `M`.
    fn los_order_fields(&self, params: &ParameterSet, m_los: i32) -> Result<LosOrderFields> {
        let ell = params.ell_los;

        let mut g_lm = MeshField::new(params)?;
        let mut q_lm = MeshField::new(params)?;
        let n_lm;
        match self {
            ThreePointSource::Survey {
                data,
                rand,
                los_data,
                los_rand,
                alpha,
            } => {
                g_lm.ylm_weighted_fluctuation(
                    data, rand, los_data, los_rand, *alpha, ell, m_los,
                )?;
                q_lm.ylm_weighted_shotnoise_fields(
                    data, rand, los_data, los_rand, *alpha, ell, m_los,
                )?;
                n_lm = TwoPointStatistics::shotnoise_for_bispec_self(
                    data, rand, los_data, los_rand, *alpha, ell, m_los,
                )?;
            }
            ThreePointSource::Window {
                rand,
                los_rand,
                alpha,
            } => {
                g_lm.ylm_weighted_mean_density(rand, los_rand, *alpha, ell, m_los)?;
                q_lm.ylm_weighted_mean_density_shotnoise(rand, los_rand, *alpha, ell, m_los)?;
                n_lm = TwoPointStatistics::shotnoise_for_corr_func_window(
                    rand, los_rand, *alpha, ell, m_los,
                )?;
            }
            ThreePointSource::Box { data } => {
                g_lm.box_fluctuation(data)?;
                q_lm.box_density(data)?;
                n_lm = Complex64::new(data.len() as f64, 0.0);
            }
        }

        // G_LM through the Fourier round trip, matching the transform
        // conventions of the shell legs.
        g_lm.forward_fft();
        g_lm.inverse_fft();
        q_lm.forward_fft();

        Ok(LosOrderFields { g_lm, q_lm, n_lm })
    }

    /// Line-of-sight orders to sweep: the box variants carry no
    /// orientation information beyond `M = 0`.
    fn m_los_range(&self, params: &ParameterSet) -> std::ops::RangeInclusive<i32> {
        match self {
            ThreePointSource::Box { .. } => 0..=0,
            _ => -params.ell_los..=params.ell_los,
        }
    }

    /// Magnetic orders of the two legs; box variants are axisymmetric.
    fn leg_orders(&self, ell: i32) -> std::ops::RangeInclusive<i32> {
        match self {
            ThreePointSource::Box { .. } => 0..=0,
            _ => -ell..=ell,
        }
    }
}

/// Shared bispectrum assembly over a three-point source.
fn measure_bispec(
    source: &ThreePointSource<'_>,
    params: &ParameterSet,
    binning: &Binning,
    norm_factor: f64,
) -> Result<BispecMeasurements> {
    let pairs = bin_pairs(params, params.num_kbin)?;
    let kbin = &binning.kbin;
    let dkbin = kbin[1] - kbin[0];
    let dv = params.cell_volume();

    let dn_00 = source.reference_field(params)?;

    let bessel_1 = SphericalBessel::new(params.ell1)?;
    let bessel_2 = SphericalBessel::new(params.ell2)?;

    let mut bk_save = vec![Complex64::new(0.0, 0.0); pairs.len()];
    let mut sn_save = vec![Complex64::new(0.0, 0.0); pairs.len()];
    let mut nmodes1 = vec![0u64; pairs.len()];
    let mut nmodes2 = vec![0u64; pairs.len()];

    for m_los in source.m_los_range(params) {
        let order = source.los_order_fields(params, m_los)?;

        for m1 in source.leg_orders(params.ell1) {
            for m2 in source.leg_orders(params.ell2) {
                let coupling = three_point_coupling(params, m_los, m1, m2);
                if coupling.abs() < COUPLING_CUTOFF {
                    continue;
                }

                let ylm_k1 = conjugate_grid(ylm_fourier_grid(
                    params.ell1,
                    m1,
                    params.nmesh,
                    params.boxsize,
                )?);
                let ylm_k2 = conjugate_grid(ylm_fourier_grid(
                    params.ell2,
                    m2,
                    params.nmesh,
                    params.boxsize,
                )?);
                let ylm_r1 = conjugate_grid(ylm_separation_grid(
                    params.ell1,
                    m1,
                    params.nmesh,
                    params.boxsize,
                )?);
                let ylm_r2 = conjugate_grid(ylm_separation_grid(
                    params.ell2,
                    m2,
                    params.nmesh,
                    params.boxsize,
                )?);

                // Shot-noise contributions.
                let mut stats = TwoPointStatistics::new(params);
                if params.ell1 == 0 && params.ell2 == 0 {
                    for sn in &mut sn_save {
                        *sn += order.n_lm * coupling;
                    }
                }
                if params.ell2 == 0 {
                    stats.power_spec(
                        &order.q_lm,
                        &dn_00,
                        kbin,
                        order.n_lm,
                        params.ell1,
                        m1,
                    )?;
                    for (slot, &(b1, _)) in pairs.iter().enumerate() {
                        sn_save[slot] += stats.pk[b1] * coupling;
                    }
                }
                if params.ell1 == 0 {
                    stats.power_spec(
                        &order.q_lm,
                        &dn_00,
                        kbin,
                        order.n_lm,
                        params.ell2,
                        m2,
                    )?;
                    for (slot, &(_, b2)) in pairs.iter().enumerate() {
                        sn_save[slot] += stats.pk[b2] * coupling;
                    }
                }

                let mut xi_grid = MeshField::new(params)?;
                stats.bispec_shotnoise_grid(&order.q_lm, &dn_00, order.n_lm, &mut xi_grid)?;
                for (slot, &(b1, b2)) in pairs.iter().enumerate() {
                    let cross = cross_shotnoise_sum(
                        &xi_grid,
                        kbin[b1],
                        kbin[b2],
                        &bessel_1,
                        &bessel_2,
                        &ylm_r1,
                        &ylm_r2,
                    );
                    sn_save[slot] += cross * coupling;
                }
                drop(xi_grid);

                // Main term: shell legs against G_LM.
                for (slot, &(b1, b2)) in pairs.iter().enumerate() {
                    let mut leg_1 = MeshField::new(params)?;
                    let n1 =
                        leg_1.shell_isolated_inverse_fft(&dn_00, kbin[b1], dkbin, &ylm_k1)?;
                    let mut leg_2 = MeshField::new(params)?;
                    let n2 =
                        leg_2.shell_isolated_inverse_fft(&dn_00, kbin[b2], dkbin, &ylm_k2)?;

                    nmodes1[slot] = n1 as u64;
                    nmodes2[slot] = n2 as u64;

                    let sum = triple_product_sum(&leg_1, &leg_2, &order.g_lm, dv);
                    bk_save[slot] += sum * coupling;
                }

                debug!(
                    "Accumulated orders (m1, m2, M) = ({m1}, {m2}, {m_los}) \
                     (ledger: {:.3} GiB in use).",
                    memory::gigabytes_in_use()
                );
            }
        }

        debug!("Computed order M = {m_los}.");
    }

    let bk = bk_save
        .iter()
        .zip(&sn_save)
        .map(|(raw, shot)| (raw - shot) * norm_factor)
        .collect();
    let shot = sn_save.iter().map(|value| *value * norm_factor).collect();

    Ok(BispecMeasurements {
        k1bin: pairs.iter().map(|&(b1, _)| kbin[b1]).collect(),
        k2bin: pairs.iter().map(|&(_, b2)| kbin[b2]).collect(),
        bk,
        shot,
        nmodes1,
        nmodes2,
    })
}

/// Shared three-point correlation assembly over a three-point source.
fn measure_3pcf(
    source: &ThreePointSource<'_>,
    params: &ParameterSet,
    binning: &Binning,
    norm_factor: f64,
) -> Result<ThreePcfMeasurements> {
    let pairs = bin_pairs(params, params.num_rbin)?;
    let rbin = &binning.rbin;
    let dv = params.cell_volume();

    let dn_00 = source.reference_field(params)?;

    let bessel_1 = SphericalBessel::new(params.ell1)?;
    let bessel_2 = SphericalBessel::new(params.ell2)?;
    let phase = imaginary_power(params.ell1 + params.ell2);

    let mut zeta_save = vec![Complex64::new(0.0, 0.0); pairs.len()];
    let mut sn_save = vec![Complex64::new(0.0, 0.0); pairs.len()];
    let mut npairs_save = vec![0u64; pairs.len()];

    for m_los in source.m_los_range(params) {
        let order = source.los_order_fields(params, m_los)?;

        for m1 in source.leg_orders(params.ell1) {
            for m2 in source.leg_orders(params.ell2) {
                let coupling = three_point_coupling(params, m_los, m1, m2);
                if coupling.abs() < COUPLING_CUTOFF {
                    continue;
                }

                let ylm_k1 = conjugate_grid(ylm_fourier_grid(
                    params.ell1,
                    m1,
                    params.nmesh,
                    params.boxsize,
                )?);
                let ylm_k2 = conjugate_grid(ylm_fourier_grid(
                    params.ell2,
                    m2,
                    params.nmesh,
                    params.boxsize,
                )?);
                let ylm_r1 =
                    ylm_separation_grid(params.ell1, m1, params.nmesh, params.boxsize)?;
                let ylm_r2 =
                    ylm_separation_grid(params.ell2, m2, params.nmesh, params.boxsize)?;

                // Shot-noise correlation, contributing where the two
                // separation bins coincide.
                let mut stats = TwoPointStatistics::new(params);
                stats.corr_func_ylm_pair(
                    &order.q_lm,
                    &dn_00,
                    rbin,
                    order.n_lm,
                    &ylm_r1,
                    &ylm_r2,
                )?;
                for (slot, &(b1, b2)) in pairs.iter().enumerate() {
                    if b1 == b2 {
                        sn_save[slot] += stats.xi[b1] * coupling;
                    }
                    npairs_save[slot] = stats.npair_xi[b2];
                }

                // Main term: Bessel-weighted legs against G_LM.
                for (slot, &(b1, b2)) in pairs.iter().enumerate() {
                    let mut leg_1 = MeshField::new(params)?;
                    leg_1.bessel_weighted_inverse_fft(
                        &dn_00,
                        rbin[b1],
                        &ylm_k1,
                        &bessel_1,
                    )?;
                    let mut leg_2 = MeshField::new(params)?;
                    leg_2.bessel_weighted_inverse_fft(
                        &dn_00,
                        rbin[b2],
                        &ylm_k2,
                        &bessel_2,
                    )?;

                    let sum = triple_product_sum(&leg_1, &leg_2, &order.g_lm, dv);
                    zeta_save[slot] += phase * sum * coupling;
                }

                debug!("Accumulated orders (m1, m2, M) = ({m1}, {m2}, {m_los}).");
            }
        }

        debug!("Computed order M = {m_los}.");
    }

    let zeta = zeta_save
        .iter()
        .zip(&sn_save)
        .map(|(raw, shot)| (raw - shot) * norm_factor)
        .collect();
    let shot = sn_save.iter().map(|value| *value * norm_factor).collect();

    Ok(ThreePcfMeasurements {
        r1bin: pairs.iter().map(|&(b1, _)| rbin[b1]).collect(),
        r2bin: pairs.iter().map(|&(_, b2)| rbin[b2]).collect(),
        zeta,
        shot,
        npairs: npairs_save,
    })
}

/// Survey bispectrum multipole.
pub fn compute_bispec(
    data: &ParticleCatalogue,
    rand: &ParticleCatalogue,
    los_data: &[LineOfSight],
    los_rand: &[LineOfSight],
    params: &ParameterSet,
    binning: &Binning,
    norm_factor: f64,
) -> Result<BispecMeasurements> {
    params.validate()?;
    check_three_point_degrees(params)?;
    check_binning(params, binning)?;

    info!(
        "Measuring bispectrum multipole ({}, {}, {}).",
        params.ell1, params.ell2, params.ell_los
    );
    let alpha = alpha_contrast(data, rand);
    debug!("Alpha contrast: {alpha:.6e}.");

    let source = ThreePointSource::Survey {
        data,
        rand,
        los_data,
        los_rand,
        alpha,
    };
    measure_bispec(&source, params, binning, norm_factor)
}

/// Bispectrum multipole in a periodic box.
pub fn compute_bispec_in_box(
    data: &ParticleCatalogue,
    params: &ParameterSet,
    binning: &Binning,
    norm_factor: f64,
) -> Result<BispecMeasurements> {
    params.validate()?;
    check_three_point_degrees(params)?;
    check_binning(params, binning)?;

    info!(
        "Measuring bispectrum multipole ({}, {}, {}) in a periodic box.",
        params.ell1, params.ell2, params.ell_los
    );

    let source = ThreePointSource::Box { data };
    measure_bispec(&source, params, binning, norm_factor)
}

/// Survey three-point correlation multipole.
pub fn compute_3pcf(
    data: &ParticleCatalogue,
    rand: &ParticleCatalogue,
    los_data: &[LineOfSight],
    los_rand: &[LineOfSight],
    params: &ParameterSet,
    binning: &Binning,
    norm_factor: f64,
) -> Result<ThreePcfMeasurements> {
    params.validate()?;
    check_three_point_degrees(params)?;
    check_binning(params, binning)?;

    info!(
        "Measuring three-point correlation multipole ({}, {}, {}).",
        params.ell1, params.ell2, params.ell_los
    );
    let alpha = alpha_contrast(data, rand);
    debug!("Alpha contrast: {alpha:.6e}.");

    let source = ThreePointSource::Survey {
        data,
        rand,
        los_data,
        los_rand,
        alpha,
    };
    measure_3pcf(&source, params, binning, norm_factor)
}

/// Three-point correlation multipole in a periodic box.
pub fn compute_3pcf_in_box(
    data: &ParticleCatalogue,
    params: &ParameterSet,
    binning: &Binning,
    norm_factor: f64,
) -> Result<ThreePcfMeasurements> {
    params.validate()?;
    check_three_point_degrees(params)?;
    check_binning(params, binning)?;

    info!(
        "Measuring three-point correlation multipole ({}, {}, {}) in a periodic box.",
        params.ell1, params.ell2, params.ell_los
    );

    let source = ThreePointSource::Box { data };
    measure_3pcf(&source, params, binning, norm_factor)
}

/// Three-point correlation window function from the random catalogue.
pub fn compute_3pcf_window(
    rand: &ParticleCatalogue,
    los_rand: &[LineOfSight],
    params: &ParameterSet,
    binning: &Binning,
    alpha: f64,
    norm_factor: f64,
) -> Result<ThreePcfMeasurements> {
    params.validate()?;
    check_three_point_degrees(params)?;
    check_binning(params, binning)?;

    info!(
        "Measuring three-point correlation window multipole ({}, {}, {}).",
        params.ell1, params.ell2, params.ell_los
    );

    let source = ThreePointSource::Window {
        rand,
        los_rand,
        alpha,
    };
    measure_3pcf(&source, params, binning, norm_factor)
}
