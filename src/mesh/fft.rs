//! 3-D discrete Fourier transforms.
//!
//! Composed from 1-D `rustfft` passes along each mesh axis. The forward
//! transform uses the negative-exponent convention and the inverse is
//! unnormalised, so callers apply the measure prefactors (`dV` forward,
//! `1/V` inverse) themselves.

use num_complex::Complex64;
use rustfft::{FftDirection, FftPlanner};

/// In-place 3-D DFT over a row-major `(n0, n1, n2)` grid.
pub(crate) fn fft3d(data: &mut [Complex64], nmesh: [usize; 3], direction: FftDirection) {
    let [n0, n1, n2] = nmesh;
    debug_assert_eq!(data.len(), n0 * n1 * n2);

    let mut planner = FftPlanner::<f64>::new();

    // Axis 2 lines are contiguous; process() splits the buffer into
    // consecutive length-n2 transforms.
    let fft2 = planner.plan_fft(n2, direction);
    fft2.process(data);

    // Axis 1: gather strided lines within each i-plane.
    let fft1 = planner.plan_fft(n1, direction);
    let mut line = vec![Complex64::new(0.0, 0.0); n1];
    for i in 0..n0 {
        for k in 0..n2 {
            for (j, cell) in line.iter_mut().enumerate() {
                *cell = data[(i * n1 + j) * n2 + k];
            }
            fft1.process(&mut line);
            for (j, cell) in line.iter().enumerate() {
                data[(i * n1 + j) * n2 + k] = *cell;
            }
        }
    }

    // Axis 0: gather across planes.
    let fft0 = planner.plan_fft(n0, direction);
    let mut line = vec![Complex64::new(0.0, 0.0); n0];
    for j in 0..n1 {
        for k in 0..n2 {
            for (i, cell) in line.iter_mut().enumerate() {
                *cell = data[(i * n1 + j) * n2 + k];
            }
            fft0.process(&mut line);
            for (i, cell) in line.iter().enumerate() {
                data[(i * n1 + j) * n2 + k] = *cell;
            }
        }
    }
}
