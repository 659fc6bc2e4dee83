//! Wigner 3-j symbols.
//!
//! Direct Racah-sum evaluation, adequate for the low multipole degrees of
//! clustering measurements.

use crate::maths::factorial;

/// Wigner 3-j symbol `(j1 j2 j3; m1 m2 m3)`.
///
/// Returns 0 for any selection-rule violation (magnetic orders not summing
/// to zero, triangle condition broken, `|m| > j`).
pub fn wigner_3j(j1: i32, j2: i32, j3: i32, m1: i32, m2: i32, m3: i32) -> f64 {
    if m1 + m2 + m3 != 0 {
        return 0.0;
    }
    if j3 < (j1 - j2).abs() || j3 > j1 + j2 {
        return 0.0;
    }
    if m1.abs() > j1 || m2.abs() > j2 || m3.abs() > j3 {
        return 0.0;
    }

    // Triangle coefficient.
    let tri = factorial(j1 + j2 - j3) * factorial(j1 - j2 + j3) * factorial(-j1 + j2 + j3)
        / factorial(j1 + j2 + j3 + 1);

    let pre = tri
        * factorial(j1 + m1)
        * factorial(j1 - m1)
        * factorial(j2 + m2)
        * factorial(j2 - m2)
        * factorial(j3 + m3)
        * factorial(j3 - m3);
    let pre = pre.sqrt();

    // Racah sum over the admissible range of t.
    let t_min = 0.max(j2 - j3 - m1).max(j1 - j3 + m2);
    let t_max = (j1 + j2 - j3).min(j1 - m1).min(j2 + m2);

    let mut sum = 0.0;
    for t in t_min..=t_max {
        let denom = factorial(t)
            * factorial(j1 + j2 - j3 - t)
            * factorial(j1 - m1 - t)
            * factorial(j2 + m2 - t)
            * factorial(j3 - j2 + m1 + t)
            * factorial(j3 - j1 - m2 + t);
        let sign = if t % 2 == 0 { 1.0 } else { -1.0 };
        sum += sign / denom;
    }

    let phase = if (j1 - j2 - m3).rem_euclid(2) == 0 {
        1.0
    } else {
        -1.0
    };

    phase * pre * sum
}
