//! Default values for measurement parameters.

use crate::mesh::AssignmentScheme;

pub fn nmesh() -> [usize; 3] {
    [64, 64, 64]
}

pub fn boxsize() -> [f64; 3] {
    [1000.0, 1000.0, 1000.0]
}

pub fn assignment() -> AssignmentScheme {
    AssignmentScheme::Tsc
}

pub fn degree() -> i32 {
    0
}

pub fn num_kbin() -> usize {
    20
}

pub fn kmin() -> f64 {
    0.01
}

pub fn kmax() -> f64 {
    0.20
}

pub fn num_rbin() -> usize {
    20
}

pub fn rmin() -> f64 {
    10.0
}

pub fn rmax() -> f64 {
    200.0
}

pub fn idx_bin() -> usize {
    0
}
