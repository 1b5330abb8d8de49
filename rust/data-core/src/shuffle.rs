// rust/data-core/src/shuffle.rs

//! Seed-determined permutations.

use std::hash::Hasher;

use twox_hash::XxHash64;

use crate::error::{DataError, Result};
use crate::seed::Seed;

/// Shuffles `values` into an order fully determined by `seed`.
///
/// Each position gets a sort key hashed from its index with the seed as the
/// hash key; the same seed and length always give the same permutation.
///
/// # Errors
///
/// Returns a configuration error for [`Seed::Unspecified`].
pub fn stateless_shuffle<T>(values: Vec<T>, seed: Seed) -> Result<Vec<T>> {
    let key = seed
        .to_u64()
        .ok_or_else(|| DataError::config("stateless_shuffle requires a specified seed"))?;

    let mut keyed: Vec<(u64, usize, T)> = values
        .into_iter()
        .enumerate()
        .map(|(index, value)| (sort_key(key, index), index, value))
        .collect();
    keyed.sort_unstable_by_key(|&(hash, index, _)| (hash, index));

    Ok(keyed.into_iter().map(|(_, _, value)| value).collect())
}

fn sort_key(seed: u64, index: usize) -> u64 {
    let mut hasher = XxHash64::with_seed(seed);
    hasher.write_u64(index as u64);
    hasher.finish()
}
