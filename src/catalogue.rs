//! Particle catalogues.
//!
//! An owning container of weighted points with summary statistics and the
//! box-alignment operations applied before meshing. Catalogue file I/O is
//! the caller's concern; construction is from column vectors.

use crate::error::{ClusteringError, Result};

/// A single catalogue entry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    /// Position in the same units as the box extent.
    pub pos: [f64; 3],
    /// Expected number density at the particle redshift.
    pub nz: f64,
    /// Systematic weight.
    pub ws: f64,
    /// Clustering weight.
    pub wc: f64,
    /// Composite weight `ws * wc`.
    pub w: f64,
}

/// Unit line-of-sight vector of a particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineOfSight {
    /// Unit direction vector.
    pub pos: [f64; 3],
}

/// Particle catalogue with summary statistics.
#[derive(Clone, Debug, Default)]
pub struct ParticleCatalogue {
    particles: Vec<Particle>,
    wtotal: f64,
    pos_min: [f64; 3],
    pos_max: [f64; 3],
}

impl ParticleCatalogue {
    /// Build a catalogue from data columns.
    ///
    /// All columns must have the same length; the composite weight is
    /// `ws * wc` per particle.
    pub fn from_columns(
        x: &[f64],
        y: &[f64],
        z: &[f64],
        nz: &[f64],
        ws: &[f64],
        wc: &[f64],
    ) -> Result<Self> {
        let n = x.len();
        if [y.len(), z.len(), nz.len(), ws.len(), wc.len()] != [n; 5] {
            return Err(ClusteringError::InvalidInput(
                "Catalogue columns have mismatched lengths.".to_string(),
            ));
        }

        let mut particles = Vec::new();
        particles.try_reserve_exact(n)?;
        for i in 0..n {
            particles.push(Particle {
                pos: [x[i], y[i], z[i]],
                nz: nz[i],
                ws: ws[i],
                wc: wc[i],
                w: ws[i] * wc[i],
            });
        }

        let mut catalogue = Self {
            particles,
            wtotal: 0.0,
            pos_min: [0.0; 3],
            pos_max: [0.0; 3],
        };
        catalogue.recompute_stats();
        Ok(catalogue)
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether the catalogue holds no particles.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Read-only particle view.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Total composite weight.
    pub fn wtotal(&self) -> f64 {
        self.wtotal
    }

    /// Minimum position per axis.
    pub fn pos_min(&self) -> [f64; 3] {
        self.pos_min
    }

    /// Maximum position per axis.
    pub fn pos_max(&self) -> [f64; 3] {
        self.pos_max
    }

    /// Recompute the weight total and position extents.
    fn recompute_stats(&mut self) {
        self.wtotal = self.particles.iter().map(|p| p.w).sum();

        if self.particles.is_empty() {
            self.pos_min = [0.0; 3];
            self.pos_max = [0.0; 3];
            return;
        }
        self.pos_min = self.particles[0].pos;
        self.pos_max = self.particles[0].pos;
        for p in &self.particles {
            for axis in 0..3 {
                self.pos_min[axis] = self.pos_min[axis].min(p.pos[axis]);
                self.pos_max[axis] = self.pos_max[axis].max(p.pos[axis]);
            }
        }
    }

    /// Unit lines of sight, one per particle.
    ///
    /// A particle at the coordinate origin maps to the zero vector.
    pub fn compute_los(&self) -> Vec<LineOfSight> {
        self.particles
            .iter()
            .map(|p| {
                let mag =
                    (p.pos[0] * p.pos[0] + p.pos[1] * p.pos[1] + p.pos[2] * p.pos[2]).sqrt();
                if mag > 0.0 {
                    LineOfSight {
                        pos: [p.pos[0] / mag, p.pos[1] / mag, p.pos[2] / mag],
                    }
                } else {
                    LineOfSight { pos: [0.0; 3] }
                }
            })
            .collect()
    }

    /// Offset every position by `dpos` (the offset becomes the new origin).
    pub fn offset_coords(&mut self, dpos: [f64; 3]) {
        for p in &mut self.particles {
            for axis in 0..3 {
                p.pos[axis] -= dpos[axis];
            }
        }
        self.recompute_stats();
    }

    /// Wrap positions into `[0, boxsize)` per axis.
    pub fn offset_coords_for_periodicity(&mut self, boxsize: [f64; 3]) {
        for p in &mut self.particles {
            for axis in 0..3 {
                let mut pos = p.pos[axis] % boxsize[axis];
                if pos < 0.0 {
                    pos += boxsize[axis];
                }
                p.pos[axis] = pos;
            }
        }
        self.recompute_stats();
    }

    /// Centre the catalogue extents in the box.
    pub fn centre_in_box(&mut self, boxsize: [f64; 3]) {
        let offset = self.centring_offset(boxsize);
        self.offset_coords(offset);
    }

    /// Centre a pair of catalogues using the reference catalogue's extents.
    ///
    /// Both catalogues are shifted by the offset that centres `reference`,
    /// preserving their relative geometry.
    pub fn centre_pair_in_box(
        catalogue: &mut ParticleCatalogue,
        reference: &mut ParticleCatalogue,
        boxsize: [f64; 3],
    ) {
        let offset = reference.centring_offset(boxsize);
        catalogue.offset_coords(offset);
        reference.offset_coords(offset);
    }

    fn centring_offset(&self, boxsize: [f64; 3]) -> [f64; 3] {
        let mut offset = [0.0; 3];
        for axis in 0..3 {
            let mid = 0.5 * (self.pos_min[axis] + self.pos_max[axis]);
            offset[axis] = mid - 0.5 * boxsize[axis];
        }
        offset
    }

    /// Shift the catalogue to its minimum corner plus a box-fraction pad.
    pub fn pad_in_box(&mut self, boxsize: [f64; 3], pad_fraction: [f64; 3]) {
        let mut offset = self.pos_min;
        for axis in 0..3 {
            offset[axis] -= pad_fraction[axis] * boxsize[axis];
        }
        self.offset_coords(offset);
    }

    /// Pad a pair of catalogues using the reference catalogue's extents.
    pub fn pad_pair_in_box(
        catalogue: &mut ParticleCatalogue,
        reference: &mut ParticleCatalogue,
        boxsize: [f64; 3],
        pad_fraction: [f64; 3],
    ) {
        let mut offset = reference.pos_min;
        for axis in 0..3 {
            offset[axis] -= pad_fraction[axis] * boxsize[axis];
        }
        catalogue.offset_coords(offset);
        reference.offset_coords(offset);
    }

    /// Shift the catalogue to its minimum corner plus a pad in grid units.
    pub fn pad_grids(&mut self, boxsize: [f64; 3], nmesh: [usize; 3], ngrid_pad: [f64; 3]) {
        let mut offset = self.pos_min;
        for axis in 0..3 {
            offset[axis] -= ngrid_pad[axis] * boxsize[axis] / nmesh[axis] as f64;
        }
        self.offset_coords(offset);
    }

    /// Pad a pair of catalogues in grid units using the reference extents.
    pub fn pad_pair_grids(
        catalogue: &mut ParticleCatalogue,
        reference: &mut ParticleCatalogue,
        boxsize: [f64; 3],
        nmesh: [usize; 3],
        ngrid_pad: [f64; 3],
    ) {
        let mut offset = reference.pos_min;
        for axis in 0..3 {
            offset[axis] -= ngrid_pad[axis] * boxsize[axis] / nmesh[axis] as f64;
        }
        catalogue.offset_coords(offset);
        reference.offset_coords(offset);
    }
}

/// Weight contrast `alpha` bringing the random catalogue to the data
/// catalogue's weight scale.
pub fn alpha_contrast(data: &ParticleCatalogue, rand: &ParticleCatalogue) -> f64 {
    if rand.wtotal() > 0.0 {
        data.wtotal() / rand.wtotal()
    } else {
        1.0
    }
}
