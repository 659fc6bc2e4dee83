//! Mass-assignment schemes.
//!
//! The single canonical implementation of the interpolation stencils, the
//! Fourier-space assignment window `W(k)` and the shot-noise attenuation
//! `S(k)` shared by field construction and the statistics kernels.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Interpolation scheme for rasterising particles onto the mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssignmentScheme {
    /// Nearest grid point (order 1).
    Ngp,
    /// Cloud in cell (order 2).
    Cic,
    /// Triangular-shaped cloud (order 3).
    Tsc,
}

impl AssignmentScheme {
    /// Number of covered cells per axis.
    #[inline]
    pub fn order(self) -> usize {
        match self {
            AssignmentScheme::Ngp => 1,
            AssignmentScheme::Cic => 2,
            AssignmentScheme::Tsc => 3,
        }
    }

    /// Per-axis deposition stencil at continuous grid coordinate `g`.
    ///
    /// Returns cell indices and interpolation weights; only the first
    /// `order()` entries are meaningful.
    #[inline]
    pub(crate) fn stencil(self, g: f64) -> ([i64; 3], [f64; 3]) {
        match self {
            AssignmentScheme::Ngp => {
                let i0 = (g + 0.5).floor() as i64;
                ([i0, 0, 0], [1.0, 0.0, 0.0])
            }
            AssignmentScheme::Cic => {
                let i0 = g.floor() as i64;
                let s = g - g.floor();
                ([i0, i0 + 1, 0], [1.0 - s, s, 0.0])
            }
            AssignmentScheme::Tsc => {
                let c = (g + 0.5).floor() as i64;
                let s = g - (g + 0.5).floor();
                (
                    [c - 1, c, c + 1],
                    [
                        0.5 * (0.5 - s) * (0.5 - s),
                        0.75 - s * s,
                        0.5 * (0.5 + s) * (0.5 + s),
                    ],
                )
            }
        }
    }

    /// Fourier-space assignment window `W(k)`.
    ///
    /// The window is the per-axis sinc raised to the scheme order,
    /// evaluated on the folded integer index of the wave-vector, with
    /// `W(0) = 1`.
    pub fn window_fourier(self, kvec: [f64; 3], nmesh: [usize; 3], boxsize: [f64; 3]) -> f64 {
        let mut w = 1.0;
        for axis in 0..3 {
            let i = folded_index(kvec[axis], boxsize[axis]);
            if i != 0 {
                let x = PI * i as f64 / nmesh[axis] as f64;
                w *= x.sin() / x;
            }
        }
        w.powi(self.order() as i32)
    }

    /// Shot-noise attenuation `S(k)` matched to the scheme.
    ///
    /// `S(0) = 1` for every scheme.
    pub fn shotnoise_fourier(self, kvec: [f64; 3], nmesh: [usize; 3], boxsize: [f64; 3]) -> f64 {
        match self {
            AssignmentScheme::Ngp => 1.0,
            AssignmentScheme::Cic => {
                let mut val = 1.0;
                for axis in 0..3 {
                    let i = folded_index(kvec[axis], boxsize[axis]);
                    let s = if i != 0 {
                        (PI * i as f64 / nmesh[axis] as f64).sin()
                    } else {
                        0.0
                    };
                    val *= 1.0 - 2.0 / 3.0 * s * s;
                }
                val
            }
            AssignmentScheme::Tsc => {
                let mut val = 1.0;
                for axis in 0..3 {
                    let i = folded_index(kvec[axis], boxsize[axis]);
                    let s = if i != 0 {
                        (PI * i as f64 / nmesh[axis] as f64).sin()
                    } else {
                        0.0
                    };
                    let s2 = s * s;
                    val *= 1.0 - s2 + 2.0 / 15.0 * s2 * s2;
                }
                val
            }
        }
    }
}

/// Recover the signed folded integer index of a wave-vector component.
#[inline]
fn folded_index(k: f64, boxsize: f64) -> i64 {
    (k * boxsize / (2.0 * PI)).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const NMESH: [usize; 3] = [8, 8, 8];
    const BOXSIZE: [f64; 3] = [100.0, 100.0, 100.0];

    #[test]
    fn test_orders() {
        assert_eq!(AssignmentScheme::Ngp.order(), 1);
        assert_eq!(AssignmentScheme::Cic.order(), 2);
        assert_eq!(AssignmentScheme::Tsc.order(), 3);
    }

    #[test]
    fn test_stencil_weights_sum_to_unity() {
        for scheme in [
            AssignmentScheme::Ngp,
            AssignmentScheme::Cic,
            AssignmentScheme::Tsc,
        ] {
            for &g in &[0.0, 0.3, 3.5, 7.99, 4.5] {
                let (_, win) = scheme.stencil(g);
                let total: f64 = win[..scheme.order()].iter().sum();
                assert_relative_eq!(total, 1.0, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_cic_stencil_splits_linearly() {
        let (idx, win) = AssignmentScheme::Cic.stencil(3.25);
        assert_eq!(&idx[..2], &[3, 4]);
        assert_relative_eq!(win[0], 0.75);
        assert_relative_eq!(win[1], 0.25);
    }

    #[test]
    fn test_tsc_stencil_centred_on_cell() {
        let (idx, win) = AssignmentScheme::Tsc.stencil(4.0);
        assert_eq!(&idx[..3], &[3, 4, 5]);
        assert_relative_eq!(win[0], 0.125);
        assert_relative_eq!(win[1], 0.75);
        assert_relative_eq!(win[2], 0.125);
    }

    #[test]
    fn test_window_at_dc_is_unity() {
        for scheme in [
            AssignmentScheme::Ngp,
            AssignmentScheme::Cic,
            AssignmentScheme::Tsc,
        ] {
            assert_relative_eq!(scheme.window_fourier([0.0; 3], NMESH, BOXSIZE), 1.0);
            assert_relative_eq!(scheme.shotnoise_fourier([0.0; 3], NMESH, BOXSIZE), 1.0);
        }
    }

    #[test]
    fn test_window_is_sinc_power() {
        let dk = 2.0 * PI / BOXSIZE[0];
        let kvec = [2.0 * dk, 0.0, 0.0];
        let x = PI * 2.0 / NMESH[0] as f64;
        let sinc = x.sin() / x;
        assert_relative_eq!(
            AssignmentScheme::Ngp.window_fourier(kvec, NMESH, BOXSIZE),
            sinc,
            epsilon = 1e-14
        );
        assert_relative_eq!(
            AssignmentScheme::Cic.window_fourier(kvec, NMESH, BOXSIZE),
            sinc * sinc,
            epsilon = 1e-14
        );
        assert_relative_eq!(
            AssignmentScheme::Tsc.window_fourier(kvec, NMESH, BOXSIZE),
            sinc * sinc * sinc,
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_window_even_in_k() {
        let dk = 2.0 * PI / BOXSIZE[0];
        let plus = AssignmentScheme::Tsc.window_fourier([3.0 * dk, 0.0, 0.0], NMESH, BOXSIZE);
        let minus = AssignmentScheme::Tsc.window_fourier([-3.0 * dk, 0.0, 0.0], NMESH, BOXSIZE);
        assert_relative_eq!(plus, minus, epsilon = 1e-14);
    }

    #[test]
    fn test_shotnoise_attenuation_below_unity_off_dc() {
        let dk = 2.0 * PI / BOXSIZE[0];
        let kvec = [3.0 * dk, 1.0 * dk, 0.0];
        assert!(AssignmentScheme::Cic.shotnoise_fourier(kvec, NMESH, BOXSIZE) < 1.0);
        assert!(AssignmentScheme::Tsc.shotnoise_fourier(kvec, NMESH, BOXSIZE) < 1.0);
        assert_relative_eq!(AssignmentScheme::Ngp.shotnoise_fourier(kvec, NMESH, BOXSIZE), 1.0);
    }
}
