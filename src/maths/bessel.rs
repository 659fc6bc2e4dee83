//! Tabulated spherical Bessel functions.
//!
//! Three-point measurements evaluate `j_ℓ(k r)` once per mesh cell per
//! separation bin, so evaluation must be O(1). The interpolator samples the
//! exact function on a uniform grid at construction and answers queries by
//! cubic Hermite interpolation between the knots.

use crate::error::Result;
use crate::memory;

/// Upper end of the tabulated argument range.
const TABLE_MAX: f64 = 10_000.0;

/// Knot spacing of the tabulation.
const TABLE_STEP: f64 = 0.1;

/// Series cut-off below which the power expansion around zero is used.
const SERIES_CUTOFF: f64 = 1e-3;

/// Double factorial `(2ℓ+1)!!` as a double.
fn double_factorial_odd(ell: i32) -> f64 {
    let mut acc = 1.0;
    let mut n = 2 * ell + 1;
    while n > 1 {
        acc *= f64::from(n);
        n -= 2;
    }
    acc
}

/// Direct evaluation of `j_ℓ(x)`.
///
/// Upward recurrence where it is stable (`x > ℓ`), downward Miller
/// recurrence anchored on `j_0` otherwise.
pub(crate) fn spherical_bessel_direct(ell: i32, x: f64) -> f64 {
    debug_assert!(ell >= 0);
    debug_assert!(x >= 0.0);

    if x < SERIES_CUTOFF {
        if ell == 0 {
            return 1.0 - x * x / 6.0;
        }
        // Leading series terms around the origin.
        return x.powi(ell) / double_factorial_odd(ell)
            * (1.0 - x * x / f64::from(2 * (2 * ell + 3)));
    }

    let j0 = x.sin() / x;
    if ell == 0 {
        return j0;
    }
    let j1 = x.sin() / (x * x) - x.cos() / x;
    if ell == 1 {
        return j1;
    }

    if x > f64::from(ell) {
        // Upward recurrence: j_{n+1} = (2n+1)/x j_n - j_{n-1}.
        let mut jm = j0;
        let mut jn = j1;
        for n in 1..ell {
            let jp = f64::from(2 * n + 1) / x * jn - jm;
            jm = jn;
            jn = jp;
        }
        jn
    } else {
        // Downward Miller recurrence from a padded starting order,
        // normalised against j_0.
        let start = ell + 16 + (x as i32);
        let mut jp = 0.0;
        let mut jn = 1e-30;
        let mut result = 0.0;
        for n in (1..=start).rev() {
            let jm = f64::from(2 * n + 1) / x * jn - jp;
            jp = jn;
            jn = jm;
            if n - 1 == ell {
                result = jn;
            }
            // Rescale to avoid overflow during the descent.
            if jn.abs() > 1e250 {
                jp /= 1e250;
                jn /= 1e250;
                result /= 1e250;
            }
        }
        result * j0 / jn
    }
}

/// Interpolated spherical Bessel function of a fixed order.
pub struct SphericalBessel {
    ell: i32,
    inv_step: f64,
    table: Vec<f64>,
}

impl SphericalBessel {
    /// Build the interpolation table for order `ell`.
    pub fn new(ell: i32) -> Result<Self> {
        let knots = (TABLE_MAX / TABLE_STEP) as usize + 1;
        let mut table = Vec::new();
        table.try_reserve_exact(knots)?;
        memory::track_alloc(knots * std::mem::size_of::<f64>());

        for i in 0..knots {
            table.push(spherical_bessel_direct(ell, i as f64 * TABLE_STEP));
        }

        Ok(Self {
            ell,
            inv_step: 1.0 / TABLE_STEP,
            table,
        })
    }

    /// Order of the tabulated function.
    pub fn order(&self) -> i32 {
        self.ell
    }

    /// Evaluate `j_ℓ(x)` by cubic Hermite interpolation.
    ///
    /// Arguments beyond the tabulated range fall back to direct
    /// evaluation; negative arguments use the parity of the order.
    pub fn eval(&self, x: f64) -> f64 {
        let (x, sign) = if x < 0.0 {
            (-x, if self.ell % 2 == 0 { 1.0 } else { -1.0 })
        } else {
            (x, 1.0)
        };

        let pos = x * self.inv_step;
        let idx = pos as usize;
        if idx + 2 >= self.table.len() {
            return sign * spherical_bessel_direct(self.ell, x);
        }

        let t = pos - idx as f64;
        let y0 = self.table[idx];
        let y1 = self.table[idx + 1];
        // Central-difference slopes in knot units.
        let d0 = if idx == 0 {
            y1 - y0
        } else {
            0.5 * (y1 - self.table[idx - 1])
        };
        let d1 = 0.5 * (self.table[idx + 2] - y0);

        let t2 = t * t;
        let t3 = t2 * t;
        let value = (2.0 * t3 - 3.0 * t2 + 1.0) * y0
            + (t3 - 2.0 * t2 + t) * d0
            + (-2.0 * t3 + 3.0 * t2) * y1
            + (t3 - t2) * d1;
        sign * value
    }
}

impl Drop for SphericalBessel {
    fn drop(&mut self) {
        memory::track_release(self.table.len() * std::mem::size_of::<f64>());
    }
}
