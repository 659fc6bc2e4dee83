//! Power spectrum and two-point correlation estimators.
//!
//! Survey estimators loop over the line-of-sight order `M`, building the
//! harmonic-weighted fluctuation per order and reassembling the requested
//! multipole through Wigner couplings; periodic-box estimators reduce to
//! a single pass over the box fluctuation.

use log::{debug, info};
use num_complex::Complex64;

use crate::catalogue::{alpha_contrast, LineOfSight, ParticleCatalogue};
use crate::config::{Binning, ParameterSet};
use crate::error::Result;
use crate::maths::wigner_3j;
use crate::memory;
use crate::mesh::MeshField;
use crate::twopt::{check_binning, check_two_point_degrees, TwoPointStatistics};

use super::{PowspecMeasurements, TwoPcfMeasurements, COUPLING_CUTOFF};

/// Wigner coupling for two-point multipole reassembly.
pub(crate) fn two_point_coupling(params: &ParameterSet, m_los: i32, m1: i32) -> f64 {
    f64::from((2 * params.ell_los + 1) * (2 * params.ell1 + 1))
        * wigner_3j(params.ell1, 0, params.ell_los, 0, 0, 0)
        * wigner_3j(params.ell1, 0, params.ell_los, m1, 0, m_los)
}

/// Survey power spectrum multipole.
pub fn compute_powspec(
    data: &ParticleCatalogue,
    rand: &ParticleCatalogue,
    los_data: &[LineOfSight],
    los_rand: &[LineOfSight],
    params: &ParameterSet,
    binning: &Binning,
    norm_factor: f64,
) -> Result<PowspecMeasurements> {
    params.validate()?;
    check_two_point_degrees(params)?;
    check_binning(params, binning)?;

    info!("Measuring power spectrum multipole ell = {}.", params.ell_los);
    let alpha = alpha_contrast(data, rand);
    debug!("Alpha contrast: {alpha:.6e}.");

    let mut dn_00 = MeshField::new(params)?;
    dn_00.ylm_weighted_fluctuation(data, rand, los_data, los_rand, alpha, 0, 0)?;
    dn_00.forward_fft();

    let mut pk_save = vec![Complex64::new(0.0, 0.0); params.num_kbin];
    let mut nmodes_save = vec![0u64; params.num_kbin];

    for m_los in -params.ell_los..=params.ell_los {
        let mut dn_lm = MeshField::new(params)?;
        dn_lm.ylm_weighted_fluctuation(
            data,
            rand,
            los_data,
            los_rand,
            alpha,
            params.ell_los,
            m_los,
        )?;
        dn_lm.forward_fft();

        let shotnoise = TwoPointStatistics::shotnoise_for_power_spec(
            data,
            rand,
            los_data,
            los_rand,
            alpha,
            params.ell_los,
            m_los,
        )?;

        let mut stats = TwoPointStatistics::new(params);
        for m1 in -params.ell1..=params.ell1 {
            let coupling = two_point_coupling(params, m_los, m1);
            if coupling.abs() < COUPLING_CUTOFF {
                continue;
            }

            stats.power_spec(&dn_lm, &dn_00, &binning.kbin, shotnoise, params.ell1, m1)?;
            for (save, value) in pk_save.iter_mut().zip(&stats.pk) {
                *save += *value * coupling;
            }
            nmodes_save.copy_from_slice(&stats.nmode_pk);
        }

        debug!(
            "Computed order M = {m_los} (ledger: {:.3} GiB in use).",
            memory::gigabytes_in_use()
        );
    }

    for value in &mut pk_save {
        *value *= norm_factor;
    }

    Ok(PowspecMeasurements {
        kbin: binning.kbin.clone(),
        pk: pk_save,
        nmodes: nmodes_save,
    })
}

/// Survey two-point correlation function multipole.
pub fn compute_corrfunc(
    data: &ParticleCatalogue,
    rand: &ParticleCatalogue,
    los_data: &[LineOfSight],
    los_rand: &[LineOfSight],
    params: &ParameterSet,
    binning: &Binning,
    norm_factor: f64,
) -> Result<TwoPcfMeasurements> {
    params.validate()?;
    check_two_point_degrees(params)?;
    check_binning(params, binning)?;

    info!(
        "Measuring two-point correlation multipole ell = {}.",
        params.ell_los
    );
    let alpha = alpha_contrast(data, rand);
    debug!("Alpha contrast: {alpha:.6e}.");

    let mut dn_00 = MeshField::new(params)?;
    dn_00.ylm_weighted_fluctuation(data, rand, los_data, los_rand, alpha, 0, 0)?;
    dn_00.forward_fft();

    let mut xi_save = vec![Complex64::new(0.0, 0.0); params.num_rbin];
    let mut npairs_save = vec![0u64; params.num_rbin];

    for m_los in -params.ell_los..=params.ell_los {
        let mut dn_lm = MeshField::new(params)?;
        dn_lm.ylm_weighted_fluctuation(
            data,
            rand,
            los_data,
            los_rand,
            alpha,
            params.ell_los,
            m_los,
        )?;
        dn_lm.forward_fft();

        let shotnoise = TwoPointStatistics::shotnoise_for_power_spec(
            data,
            rand,
            los_data,
            los_rand,
            alpha,
            params.ell_los,
            m_los,
        )?;

        let mut stats = TwoPointStatistics::new(params);
        for m1 in -params.ell1..=params.ell1 {
            let coupling = two_point_coupling(params, m_los, m1);
            if coupling.abs() < COUPLING_CUTOFF {
                continue;
            }

            stats.corr_func(&dn_lm, &dn_00, &binning.rbin, shotnoise, params.ell1, m1)?;
            for (save, value) in xi_save.iter_mut().zip(&stats.xi) {
                *save += *value * coupling;
            }
            npairs_save.copy_from_slice(&stats.npair_xi);
        }

        debug!("Computed order M = {m_los}.");
    }

    for value in &mut xi_save {
        *value *= norm_factor;
    }

    Ok(TwoPcfMeasurements {
        rbin: binning.rbin.clone(),
        xi: xi_save,
        npairs: npairs_save,
    })
}

/// Power spectrum window function from the random catalogue.
///
/// A single mean-density pass at order `(ell, 0)`; the supplied
/// normalisation is rescaled by `1/α²` and `1/V` internally.
pub fn compute_powspec_window(
    rand: &ParticleCatalogue,
    los_rand: &[LineOfSight],
    params: &ParameterSet,
    binning: &Binning,
    alpha: f64,
    norm_factor: f64,
) -> Result<PowspecMeasurements> {
    params.validate()?;
    check_two_point_degrees(params)?;
    check_binning(params, binning)?;

    info!("Measuring power spectrum window function.");

    let mut dn_00 = MeshField::new(params)?;
    dn_00.ylm_weighted_mean_density(rand, los_rand, alpha, 0, 0)?;
    dn_00.forward_fft();

    let shotnoise = TwoPointStatistics::shotnoise_for_corr_func_window(
        rand,
        los_rand,
        alpha,
        params.ell_los,
        0,
    )?;

    let mut stats = TwoPointStatistics::new(params);
    stats.power_spec(
        &dn_00,
        &dn_00,
        &binning.kbin,
        shotnoise,
        params.ell_los,
        0,
    )?;

    let norm = norm_factor / (alpha * alpha) / params.volume();
    let pk = stats.pk.iter().map(|value| *value * norm).collect();

    Ok(PowspecMeasurements {
        kbin: binning.kbin.clone(),
        pk,
        nmodes: stats.nmode_pk.clone(),
    })
}

/// Two-point correlation window function from the random catalogue.
///
/// Full `M` loop over mean-density fields; the supplied normalisation is
/// rescaled by `1/α²` internally.
pub fn compute_corrfunc_window(
    rand: &ParticleCatalogue,
    los_rand: &[LineOfSight],
    params: &ParameterSet,
    binning: &Binning,
    alpha: f64,
    norm_factor: f64,
) -> Result<TwoPcfMeasurements> {
    params.validate()?;
    check_two_point_degrees(params)?;
    check_binning(params, binning)?;

    info!("Measuring two-point correlation window function.");

    let mut dn_00 = MeshField::new(params)?;
    dn_00.ylm_weighted_mean_density(rand, los_rand, alpha, 0, 0)?;
    dn_00.forward_fft();

    let mut xi_save = vec![Complex64::new(0.0, 0.0); params.num_rbin];
    let mut npairs_save = vec![0u64; params.num_rbin];

    for m_los in -params.ell_los..=params.ell_los {
        let mut dn_lm = MeshField::new(params)?;
        dn_lm.ylm_weighted_mean_density(rand, los_rand, alpha, params.ell_los, m_los)?;
        dn_lm.forward_fft();

        let shotnoise = TwoPointStatistics::shotnoise_for_corr_func_window(
            rand,
            los_rand,
            alpha,
            params.ell_los,
            m_los,
        )?;

        let mut stats = TwoPointStatistics::new(params);
        for m1 in -params.ell1..=params.ell1 {
            let coupling = two_point_coupling(params, m_los, m1);
            if coupling.abs() < COUPLING_CUTOFF {
                continue;
            }

            stats.corr_func(&dn_lm, &dn_00, &binning.rbin, shotnoise, params.ell1, m1)?;
            for (save, value) in xi_save.iter_mut().zip(&stats.xi) {
                *save += *value * coupling;
            }
            npairs_save.copy_from_slice(&stats.npair_xi);
        }

        debug!("Computed order M = {m_los}.");
    }

    let norm = norm_factor / (alpha * alpha);
    for value in &mut xi_save {
        *value *= norm;
    }

    Ok(TwoPcfMeasurements {
        rbin: binning.rbin.clone(),
        xi: xi_save,
        npairs: npairs_save,
    })
}

/// Power spectrum multipole in a periodic box.
pub fn compute_powspec_in_box(
    data: &ParticleCatalogue,
    params: &ParameterSet,
    binning: &Binning,
    norm_factor: f64,
) -> Result<PowspecMeasurements> {
    params.validate()?;
    check_two_point_degrees(params)?;
    check_binning(params, binning)?;

    info!(
        "Measuring power spectrum multipole ell = {} in a periodic box.",
        params.ell_los
    );

    let mut dn = MeshField::new(params)?;
    dn.box_fluctuation(data)?;
    dn.forward_fft();

    let shotnoise = Complex64::new(data.len() as f64, 0.0);

    let mut stats = TwoPointStatistics::new(params);
    stats.power_spec(&dn, &dn, &binning.kbin, shotnoise, params.ell_los, 0)?;

    let prefactor = f64::from(2 * params.ell_los + 1) * norm_factor;
    let pk = stats.pk.iter().map(|value| *value * prefactor).collect();

    Ok(PowspecMeasurements {
        kbin: binning.kbin.clone(),
        pk,
        nmodes: stats.nmode_pk.clone(),
    })
}

/// Two-point correlation multipole in a periodic box.
pub fn compute_corrfunc_in_box(
    data: &ParticleCatalogue,
    params: &ParameterSet,
    binning: &Binning,
    norm_factor: f64,
) -> Result<TwoPcfMeasurements> {
    params.validate()?;
    check_two_point_degrees(params)?;
    check_binning(params, binning)?;

    info!(
        "Measuring two-point correlation multipole ell = {} in a periodic box.",
        params.ell_los
    );

    let mut dn = MeshField::new(params)?;
    dn.box_fluctuation(data)?;
    dn.forward_fft();

    let shotnoise = Complex64::new(data.len() as f64, 0.0);

    let mut stats = TwoPointStatistics::new(params);
    stats.corr_func(&dn, &dn, &binning.rbin, shotnoise, params.ell_los, 0)?;

    let prefactor = f64::from(2 * params.ell_los + 1) * norm_factor;
    let xi = stats.xi.iter().map(|value| *value * prefactor).collect();

    Ok(TwoPcfMeasurements {
        rbin: binning.rbin.clone(),
        xi,
        npairs: stats.npair_xi.clone(),
    })
}

/// Power spectrum multipole in a periodic box for reconstruction.
pub fn compute_powspec_in_box_recon(
    data: &ParticleCatalogue,
    rand: &ParticleCatalogue,
    params: &ParameterSet,
    binning: &Binning,
    alpha: f64,
    norm_factor: f64,
) -> Result<PowspecMeasurements> {
    params.validate()?;
    check_two_point_degrees(params)?;
    check_binning(params, binning)?;

    info!("Measuring reconstruction power spectrum in a periodic box.");

    let mut dn = MeshField::new(params)?;
    dn.box_fluctuation_recon(data, rand, alpha)?;
    dn.forward_fft();

    let shotnoise = TwoPointStatistics::shotnoise_for_power_spec_box_recon(data, rand, alpha);

    let mut stats = TwoPointStatistics::new(params);
    stats.power_spec(&dn, &dn, &binning.kbin, shotnoise, params.ell_los, 0)?;

    let prefactor = f64::from(2 * params.ell_los + 1) * norm_factor;
    let pk = stats.pk.iter().map(|value| *value * prefactor).collect();

    Ok(PowspecMeasurements {
        kbin: binning.kbin.clone(),
        pk,
        nmodes: stats.nmode_pk.clone(),
    })
}
