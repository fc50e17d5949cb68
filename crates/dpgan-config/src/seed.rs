//! Process-wide reproducibility seed.
//!
//! Fresh resolutions record the resolved `manual_seed` here exactly once; every
//! component that needs randomness derives its generator from it, so a run is
//! reproducible from the seed alone.

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;
use std::sync::RwLock;
use tracing::debug;

/// Range unset seeds are drawn from.
pub const SEED_RANGE: RangeInclusive<i64> = 1..=1_000_000;

static PROCESS_SEED: Lazy<RwLock<Option<u64>>> = Lazy::new(|| RwLock::new(None));

/// Draw a fresh seed from [`SEED_RANGE`].
#[must_use]
pub fn generate_seed() -> i64 {
    rand::thread_rng().gen_range(SEED_RANGE)
}

/// Seed the process-wide random state.
pub fn initialize_reproducibility(seed: u64) {
    let mut guard = PROCESS_SEED.write().unwrap_or_else(std::sync::PoisonError::into_inner);
    *guard = Some(seed);
    debug!(seed, "initialized process seed");
}

/// Seed recorded by [`initialize_reproducibility`], if any.
#[must_use]
pub fn process_seed() -> Option<u64> {
    *PROCESS_SEED.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Deterministic generator for one consumer of randomness.
///
/// `stream` separates independent consumers drawing from the same process seed.
/// Falls back to `stream` alone when the process seed has not been initialized.
#[must_use]
pub fn seeded_rng(stream: u64) -> StdRng {
    rng_for(process_seed().unwrap_or_default(), stream)
}

/// Generator for `stream` under an explicit `seed`.
#[must_use]
pub fn rng_for(seed: u64, stream: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ stream.rotate_left(32))
}
