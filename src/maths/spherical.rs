//! Reduced spherical harmonics.
//!
//! The reduced harmonic is `sqrt(4π / (2ℓ+1)) Y_ℓm`, i.e. the spherical
//! harmonic stripped of its `(2ℓ+1)/(4π)` normalisation so that the
//! monopole is exactly 1. Grid tabulations evaluate it on the folded
//! Fourier and separation grids of a measurement mesh.

use num_complex::Complex64;

use crate::error::Result;
use crate::maths::factorial;

/// Directions shorter than this are treated as degenerate.
const DEGENERATE_NORM: f64 = 1e-15;

/// Associated Legendre polynomial `P_ℓ^m(x)` with the Condon-Shortley
/// phase, for `0 <= m <= ℓ` and `|x| <= 1`.
fn assoc_legendre(ell: i32, m: i32, x: f64) -> f64 {
    debug_assert!(m >= 0 && m <= ell);

    // P_m^m = (-1)^m (2m-1)!! (1-x^2)^{m/2}
    let mut pmm = 1.0;
    if m > 0 {
        let somx2 = ((1.0 - x) * (1.0 + x)).sqrt();
        let mut odd = 1.0;
        for _ in 0..m {
            pmm *= -odd * somx2;
            odd += 2.0;
        }
    }
    if ell == m {
        return pmm;
    }

    // P_{m+1}^m = x (2m+1) P_m^m
    let mut pmmp1 = x * f64::from(2 * m + 1) * pmm;
    if ell == m + 1 {
        return pmmp1;
    }

    // Upward recurrence in degree.
    let mut pll = 0.0;
    for ll in (m + 2)..=ell {
        pll = (x * f64::from(2 * ll - 1) * pmmp1 - f64::from(ll + m - 1) * pmm)
            / f64::from(ll - m);
        pmm = pmmp1;
        pmmp1 = pll;
    }
    pll
}

/// Reduced spherical harmonic `sqrt(4π/(2ℓ+1)) Y_ℓm(v̂)`.
///
/// The direction is taken from `v` without requiring unit length. A
/// degenerate (zero) vector maps to 1 for the monopole and 0 for every
/// higher degree, so mesh cells at the coordinate origin contribute
/// nothing beyond ℓ = 0. Orders with `|m| > ℓ` vanish identically.
pub fn reduced_spherical_harmonic(ell: i32, m: i32, v: [f64; 3]) -> Complex64 {
    if ell < 0 || m.abs() > ell {
        return Complex64::new(0.0, 0.0);
    }

    let r = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if r < DEGENERATE_NORM {
        return if ell == 0 {
            Complex64::new(1.0, 0.0)
        } else {
            Complex64::new(0.0, 0.0)
        };
    }

    let mu = (v[2] / r).clamp(-1.0, 1.0);
    let phi = v[1].atan2(v[0]);

    let mm = m.abs();
    let amplitude =
        (factorial(ell - mm) / factorial(ell + mm)).sqrt() * assoc_legendre(ell, mm, mu);
    let arg = f64::from(mm) * phi;
    let ylm = Complex64::new(amplitude * arg.cos(), amplitude * arg.sin());

    if m < 0 {
        // Y_ℓ{-m} = (-1)^m conj(Y_ℓm)
        let parity = if mm % 2 == 0 { 1.0 } else { -1.0 };
        parity * ylm.conj()
    } else {
        ylm
    }
}

/// Tabulate the reduced spherical harmonic on the folded Fourier grid.
///
/// Cell `(i, j, k)` carries the harmonic of the wave-vector obtained by
/// Hermitian folding, `k_a = i · 2π/L_a` for `i < n_a/2` and
/// `(i − n_a) · 2π/L_a` otherwise.
pub fn ylm_fourier_grid(
    ell: i32,
    m: i32,
    nmesh: [usize; 3],
    boxsize: [f64; 3],
) -> Result<Vec<Complex64>> {
    let dk = [
        2.0 * std::f64::consts::PI / boxsize[0],
        2.0 * std::f64::consts::PI / boxsize[1],
        2.0 * std::f64::consts::PI / boxsize[2],
    ];
    tabulate_on_folded_grid(ell, m, nmesh, dk)
}

/// Tabulate the reduced spherical harmonic on the folded separation grid.
///
/// Cell `(i, j, k)` carries the harmonic of the separation vector
/// `r_a = i · L_a/n_a` for `i < n_a/2` and `(i − n_a) · L_a/n_a` otherwise.
pub fn ylm_separation_grid(
    ell: i32,
    m: i32,
    nmesh: [usize; 3],
    boxsize: [f64; 3],
) -> Result<Vec<Complex64>> {
    let dr = [
        boxsize[0] / nmesh[0] as f64,
        boxsize[1] / nmesh[1] as f64,
        boxsize[2] / nmesh[2] as f64,
    ];
    tabulate_on_folded_grid(ell, m, nmesh, dr)
}

/// Shared tabulation over a folded grid with per-axis spacing `delta`.
fn tabulate_on_folded_grid(
    ell: i32,
    m: i32,
    nmesh: [usize; 3],
    delta: [f64; 3],
) -> Result<Vec<Complex64>> {
    let total = nmesh[0] * nmesh[1] * nmesh[2];
    let mut grid = Vec::new();
    grid.try_reserve_exact(total)?;

    for i in 0..nmesh[0] {
        let vx = folded_component(i, nmesh[0], delta[0]);
        for j in 0..nmesh[1] {
            let vy = folded_component(j, nmesh[1], delta[1]);
            for k in 0..nmesh[2] {
                let vz = folded_component(k, nmesh[2], delta[2]);
                grid.push(reduced_spherical_harmonic(ell, m, [vx, vy, vz]));
            }
        }
    }

    Ok(grid)
}

/// Fold a raw grid index into its signed physical component.
#[inline]
pub(crate) fn folded_component(index: usize, n: usize, delta: f64) -> f64 {
    if index < n / 2 {
        index as f64 * delta
    } else {
        (index as f64 - n as f64) * delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_monopole_is_unity_everywhere() {
        for v in [[1.0, 0.0, 0.0], [0.3, -0.2, 0.7], [0.0, 0.0, -5.0]] {
            let y = reduced_spherical_harmonic(0, 0, v);
            assert_relative_eq!(y.re, 1.0, epsilon = 1e-14);
            assert_relative_eq!(y.im, 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_degenerate_direction() {
        let zero = [0.0, 0.0, 0.0];
        assert_relative_eq!(reduced_spherical_harmonic(0, 0, zero).re, 1.0);
        assert_relative_eq!(reduced_spherical_harmonic(2, 0, zero).re, 0.0);
        assert_relative_eq!(reduced_spherical_harmonic(4, 2, zero).norm(), 0.0);
    }

    #[test]
    fn test_dipole_along_z() {
        // Reduced Y_10 is cos(theta).
        let y = reduced_spherical_harmonic(1, 0, [0.0, 0.0, 2.0]);
        assert_relative_eq!(y.re, 1.0, epsilon = 1e-14);

        let y = reduced_spherical_harmonic(1, 0, [1.0, 0.0, 0.0]);
        assert_relative_eq!(y.re, 0.0, epsilon = 1e-14);
    }

    #[test]
    fn test_quadrupole_legendre_values() {
        // Reduced Y_20 is the Legendre polynomial P_2(cos theta).
        let mu = 0.6_f64;
        let v = [(1.0 - mu * mu).sqrt(), 0.0, mu];
        let y = reduced_spherical_harmonic(2, 0, v);
        assert_relative_eq!(y.re, 0.5 * (3.0 * mu * mu - 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_negative_order_conjugate_parity() {
        let v = [0.4, 0.5, 0.3];
        let plus = reduced_spherical_harmonic(3, 2, v);
        let minus = reduced_spherical_harmonic(3, -2, v);
        assert_relative_eq!(minus.re, plus.conj().re, epsilon = 1e-12);
        assert_relative_eq!(minus.im, plus.conj().im, epsilon = 1e-12);

        let plus = reduced_spherical_harmonic(3, 1, v);
        let minus = reduced_spherical_harmonic(3, -1, v);
        assert_relative_eq!(minus.re, -plus.conj().re, epsilon = 1e-12);
        assert_relative_eq!(minus.im, -plus.conj().im, epsilon = 1e-12);
    }

    #[test]
    fn test_order_beyond_degree_vanishes() {
        let v = [0.1, 0.2, 0.3];
        assert_eq!(reduced_spherical_harmonic(1, 2, v).norm(), 0.0);
    }

    #[test]
    fn test_fourier_grid_dc_cell() {
        let grid = ylm_fourier_grid(0, 0, [4, 4, 4], [100.0, 100.0, 100.0]).unwrap();
        assert_eq!(grid.len(), 64);
        assert_relative_eq!(grid[0].re, 1.0);

        let grid = ylm_fourier_grid(2, 1, [4, 4, 4], [100.0, 100.0, 100.0]).unwrap();
        assert_relative_eq!(grid[0].norm(), 0.0);
    }

    #[test]
    fn test_folded_component_symmetry() {
        // Indices in the upper half fold to negative components.
        assert_relative_eq!(folded_component(1, 8, 0.5), 0.5);
        assert_relative_eq!(folded_component(7, 8, 0.5), -0.5);
        assert_relative_eq!(folded_component(4, 8, 0.5), -2.0);
    }
}
