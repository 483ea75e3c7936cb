//! Deterministic per-attempt random number generation.
//!
//! The optimizer holds one master seed; each attempt's RNG is a
//! deterministic function of `(master_seed, attempt_index)` so that
//! replaying an attempt only requires remembering its index, not the
//! order in which attempts happened to finish.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::{rngs::StdRng, SeedableRng};

/// Mixes a 64-bit value with Bob Jenkins' SplitMix64 finalizer, the
/// same mixing step `StdRng` uses internally to spread low-entropy
/// seeds across its full state; used here to combine the master seed
/// and an attempt index into one well-distributed stream seed.
fn splitmix64(mut x: u64) -> u64 {
  x = x.wrapping_add(0x9E3779B97F4A7C15);
  let mut z = x;
  z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
  z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
  z ^ (z >> 31)
}

/// Resolves a configured `rng_seed` (0 meaning "time-derived") into a
/// concrete master seed to mix per-attempt streams from.
pub fn resolve_master_seed(rng_seed: u64) -> u64 {
  if rng_seed != 0 {
    return rng_seed;
  }
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_nanos() as u64)
    .unwrap_or(0x2545F4914F6CDD1D)
}

/// Builds the deterministic RNG for attempt `attempt_index` under
/// `master_seed`. Two calls with the same arguments always produce
/// generators that emit the same sequence.
pub fn attempt_rng(master_seed: u64, attempt_index: usize) -> StdRng {
  let mixed = splitmix64(master_seed ^ splitmix64(attempt_index as u64));
  StdRng::seed_from_u64(mixed)
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::Rng;

  #[test]
  fn test_same_seed_and_index_replay_identically() {
    let mut a = attempt_rng(42, 3);
    let mut b = attempt_rng(42, 3);
    let xs: Vec<u32> = (0..20).map(|_| a.gen()).collect();
    let ys: Vec<u32> = (0..20).map(|_| b.gen()).collect();
    assert_eq!(xs, ys);
  }

  #[test]
  fn test_different_attempt_indices_diverge() {
    let mut a = attempt_rng(42, 0);
    let mut b = attempt_rng(42, 1);
    let x: u64 = a.gen();
    let y: u64 = b.gen();
    assert_ne!(x, y);
  }

  #[test]
  fn test_different_master_seeds_diverge() {
    let mut a = attempt_rng(1, 0);
    let mut b = attempt_rng(2, 0);
    let x: u64 = a.gen();
    let y: u64 = b.gen();
    assert_ne!(x, y);
  }

  #[test]
  fn test_resolve_master_seed_passes_through_nonzero() {
    assert_eq!(resolve_master_seed(7), 7);
  }

  #[test]
  fn test_resolve_master_seed_is_nonzero_when_time_derived() {
    // Not deterministic by nature, but should never silently become 0.
    assert_ne!(resolve_master_seed(0), 0);
  }
}
