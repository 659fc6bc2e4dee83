//! Mesh fields.
//!
//! A `MeshField` is a contiguous complex grid covering the measurement
//! box. Particles are rasterised onto it by the configured assignment
//! scheme, and in-place transforms move it between configuration and
//! Fourier space with the measure prefactors applied.

pub mod assignment;
pub(crate) mod fft;

pub use assignment::AssignmentScheme;

use num_complex::Complex64;
use rustfft::FftDirection;

use crate::catalogue::Particle;
use crate::config::ParameterSet;
use crate::error::{ClusteringError, Result};
use crate::maths::spherical::folded_component;
use crate::memory;

/// Which space the field currently lives in.
///
/// Tracked explicitly so that a transform applied to the wrong side is
/// caught in debug builds instead of silently corrupting a measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldSpace {
    /// Real (configuration) space.
    Configuration,
    /// Fourier space.
    Fourier,
}

/// Complex density field on the measurement mesh.
///
/// Cell `(i, j, k)` maps to flat index `(i * nmesh[1] + j) * nmesh[2] + k`.
/// The buffer is owned exclusively and its size is registered with the
/// memory ledger for the lifetime of the field.
pub struct MeshField {
    field: Vec<Complex64>,
    params: ParameterSet,
    space: FieldSpace,
}

impl MeshField {
    /// Allocate a zero-initialised field in configuration space.
    pub fn new(params: &ParameterSet) -> Result<Self> {
        let total = params.nmesh_tot();
        let mut field = Vec::new();
        field.try_reserve_exact(total)?;
        field.resize(total, Complex64::new(0.0, 0.0));
        memory::track_alloc(total * std::mem::size_of::<Complex64>());

        Ok(Self {
            field,
            params: params.clone(),
            space: FieldSpace::Configuration,
        })
    }

    /// Parameter set the field was built with.
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Current space of the field.
    pub fn space(&self) -> FieldSpace {
        self.space
    }

    pub(crate) fn set_space(&mut self, space: FieldSpace) {
        self.space = space;
    }

    /// Read-only cell view.
    pub fn cells(&self) -> &[Complex64] {
        &self.field
    }

    /// Mutable cell view.
    pub fn cells_mut(&mut self) -> &mut [Complex64] {
        &mut self.field
    }

    /// Set every cell to zero and return to configuration space.
    pub fn zero(&mut self) {
        self.field.fill(Complex64::new(0.0, 0.0));
        self.space = FieldSpace::Configuration;
    }

    /// Rasterise weighted point masses onto the grid.
    ///
    /// The field is zeroed first. Each particle deposits
    /// `weight / dV` spread over the stencil of the configured scheme;
    /// stencil cells whose flat index falls outside the grid are dropped
    /// without wrap-around, so callers needing periodicity wrap positions
    /// beforehand.
    pub fn assign(&mut self, particles: &[Particle], weights: &[Complex64]) -> Result<()> {
        if particles.len() != weights.len() {
            return Err(ClusteringError::InvalidInput(format!(
                "Particle and weight counts differ: {} vs {}.",
                particles.len(),
                weights.len()
            )));
        }

        self.zero();

        let scheme = self.params.assignment;
        let order = scheme.order();
        let nmesh = self.params.nmesh;
        let boxsize = self.params.boxsize;
        let nmesh_tot = self.params.nmesh_tot() as i64;
        let cell_vol_factor = 1.0 / self.params.cell_volume();

        for (particle, weight) in particles.iter().zip(weights) {
            let mut idx = [[0i64; 3]; 3];
            let mut win = [[0f64; 3]; 3];
            for axis in 0..3 {
                let g = nmesh[axis] as f64 * particle.pos[axis] / boxsize[axis];
                let (ix, wx) = scheme.stencil(g);
                idx[axis] = ix;
                win[axis] = wx;
            }

            for a in 0..order {
                for b in 0..order {
                    for c in 0..order {
                        let flat = (idx[0][a] * nmesh[1] as i64 + idx[1][b])
                            * nmesh[2] as i64
                            + idx[2][c];
                        if (0..nmesh_tot).contains(&flat) {
                            self.field[flat as usize] +=
                                *weight * (cell_vol_factor * win[0][a] * win[1][b] * win[2][c]);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// In-place forward transform with the `dV` measure prefactor.
    pub fn forward_fft(&mut self) {
        debug_assert_eq!(self.space, FieldSpace::Configuration);

        let dv = self.params.cell_volume();
        for cell in &mut self.field {
            *cell *= dv;
        }
        fft::fft3d(&mut self.field, self.params.nmesh, FftDirection::Forward);
        self.space = FieldSpace::Fourier;
    }

    /// In-place inverse transform with the `1/V` measure prefactor.
    pub fn inverse_fft(&mut self) {
        debug_assert_eq!(self.space, FieldSpace::Fourier);

        let inv_vol = 1.0 / self.params.volume();
        for cell in &mut self.field {
            *cell *= inv_vol;
        }
        fft::fft3d(&mut self.field, self.params.nmesh, FftDirection::Inverse);
        self.space = FieldSpace::Configuration;
    }

    /// Divide every Fourier cell by the assignment window.
    pub fn compensate_assignment(&mut self) {
        debug_assert_eq!(self.space, FieldSpace::Fourier);

        let nmesh = self.params.nmesh;
        for i in 0..nmesh[0] {
            for j in 0..nmesh[1] {
                for k in 0..nmesh[2] {
                    let kvec = self.wavevector([i, j, k]);
                    let win = self.window(kvec);
                    let flat = (i * nmesh[1] + j) * nmesh[2] + k;
                    self.field[flat] /= win;
                }
            }
        }
    }

    /// Assignment window `W(k)` of the configured scheme.
    #[inline]
    pub fn window(&self, kvec: [f64; 3]) -> f64 {
        self.params
            .assignment
            .window_fourier(kvec, self.params.nmesh, self.params.boxsize)
    }

    /// Shot-noise attenuation `S(k)` of the configured scheme.
    #[inline]
    pub fn shotnoise(&self, kvec: [f64; 3]) -> f64 {
        self.params
            .assignment
            .shotnoise_fourier(kvec, self.params.nmesh, self.params.boxsize)
    }

    /// Folded wave-vector of a grid cell.
    #[inline]
    pub fn wavevector(&self, idx: [usize; 3]) -> [f64; 3] {
        let mut kvec = [0.0; 3];
        for axis in 0..3 {
            let dk = 2.0 * std::f64::consts::PI / self.params.boxsize[axis];
            kvec[axis] = folded_component(idx[axis], self.params.nmesh[axis], dk);
        }
        kvec
    }

    /// Folded separation vector of a grid cell.
    #[inline]
    pub fn separation(&self, idx: [usize; 3]) -> [f64; 3] {
        let mut rvec = [0.0; 3];
        for axis in 0..3 {
            let dr = self.params.boxsize[axis] / self.params.nmesh[axis] as f64;
            rvec[axis] = folded_component(idx[axis], self.params.nmesh[axis], dr);
        }
        rvec
    }
}

impl std::ops::Index<usize> for MeshField {
    type Output = Complex64;

    fn index(&self, id: usize) -> &Complex64 {
        &self.field[id]
    }
}

impl Drop for MeshField {
    fn drop(&mut self) {
        memory::track_release(self.field.len() * std::mem::size_of::<Complex64>());
    }
}
