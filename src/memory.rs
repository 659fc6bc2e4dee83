//! Cumulative memory ledger for grid and table allocations.
//!
//! Mesh grids and fine-sampling tables register their buffer sizes here on
//! construction and deregister on drop, so long-running measurement drivers
//! can report the peak working-set of a call chain.

use std::sync::atomic::{AtomicU64, Ordering};

static BYTES_IN_USE: AtomicU64 = AtomicU64::new(0);

/// Record `bytes` of newly allocated measurement buffers.
pub fn track_alloc(bytes: usize) {
    BYTES_IN_USE.fetch_add(bytes as u64, Ordering::Relaxed);
}

/// Record the release of `bytes` of measurement buffers.
pub fn track_release(bytes: usize) {
    BYTES_IN_USE.fetch_sub(bytes as u64, Ordering::Relaxed);
}

/// Currently registered bytes.
pub fn bytes_in_use() -> u64 {
    BYTES_IN_USE.load(Ordering::Relaxed)
}

/// Currently registered gigabytes.
pub fn gigabytes_in_use() -> f64 {
    bytes_in_use() as f64 / (1024.0 * 1024.0 * 1024.0)
}
