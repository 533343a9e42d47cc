//! Byzantine-robust aggregation (spec.md §4.6).
//!
//! Reconstructs each client's implied gradient direction from its scalar and
//! seed, then combines the batch with a coordinate-wise alpha-trimmed mean.
//! The sort-and-select shape mirrors the teacher pack's ranking utilities
//! (`routerd::scoring::Scorer::rank`) rather than anything in gossipd itself,
//! since gossipd has no numeric aggregation step of its own.

use ruth_core::{noise, ClientUpdate};

/// Reconstruct the implied per-parameter gradient direction for one update:
/// `g_i = scalar_i * noise(seed_id_i, d)`.
pub fn reconstruct(update: &ClientUpdate, d: usize) -> Vec<f32> {
    noise::noise(update.seed_id, d)
        .into_iter()
        .map(|n| n * update.scalar)
        .collect()
}

/// Coordinate-wise alpha-trimmed mean across `n` reconstructed directions of
/// dimension `d`. `trim_ratio` is the fraction trimmed from *each* tail per
/// coordinate; `k = floor(n * trim_ratio)` values are dropped from each end
/// before averaging what remains. Falls back to the arithmetic mean when
/// `k == 0`, and to the zero vector of length `d` when there are no inputs
/// at all (spec.md §4.6's `n = 0` case).
pub fn aggregate(directions: &[Vec<f32>], trim_ratio: f32, d: usize) -> Vec<f32> {
    let n = directions.len();
    if n == 0 {
        return vec![0.0f32; d];
    }
    let k = ((n as f32) * trim_ratio).floor() as usize;

    let mut out = vec![0.0f32; d];
    for coord in 0..d {
        let mut column: Vec<f32> = directions.iter().map(|v| v[coord]).collect();
        // total_cmp gives a stable total order even with NaN/signed-zero
        // edge cases, and Rust's sort is itself stable for tied keys.
        column.sort_by(|a, b| a.total_cmp(b));

        let kept = if 2 * k < n {
            &column[k..n - k]
        } else {
            &column[..]
        };
        out[coord] = kept.iter().sum::<f32>() / kept.len() as f32;
    }
    out
}
