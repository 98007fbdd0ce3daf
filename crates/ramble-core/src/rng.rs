//! Deterministic RNG wrapper and label seed derivation.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// Deterministic RNG handle backing the `randint`/`randrange` expression
/// functions.
///
/// The handle is a thin wrapper around `StdRng`. A master `seed: u64` comes
/// from the expansion configuration; each experiment derives its own stream by
/// hashing `(master_seed, label)` with SipHash-1-3 under fixed zero keys, so
/// the same workspace always draws the same numbers for the same experiment.
#[derive(Debug, Clone)]
pub struct RngHandle {
    rng: StdRng,
}

impl RngHandle {
    /// Creates a new RNG handle from a master seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates a handle whose stream is derived from a master seed and a label
    /// such as an experiment namespace.
    pub fn for_label(master_seed: u64, label: &str) -> Self {
        Self::from_seed(derive_label_seed(master_seed, label))
    }

    /// Draws an integer uniformly from the inclusive range `[low, high]`.
    pub fn int_inclusive(&mut self, low: i64, high: i64) -> i64 {
        self.rng.gen_range(low..=high)
    }
}

impl RngCore for RngHandle {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Derives the deterministic seed for a labelled substream.
pub fn derive_label_seed(master_seed: u64, label: &str) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write(label.as_bytes());
    hasher.finish()
}
