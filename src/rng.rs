//-
// Copyright 2017, 2018 The proptest developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Modifications: generalized from a bare `XorShiftRng` wrapper into a
// small enum over the two algorithms `Config`'s doc comments already
// advertised (`"xs"` / `"cc"`), since the engine needs exactly one
// PRNG instance threaded through every randomized decision (spec §5).

use std::fmt;
use std::str::FromStr;

use rand::{Error, RngCore, SeedableRng};
use rand_chacha::ChaChaRng;
use rand_xorshift::XorShiftRng;

/// The raw seed material backing a `TestRng`, regardless of algorithm.
pub type Seed = [u8; 32];

/// Which PRNG algorithm backs a `TestRng`.
///
/// `XorShift` is faster and is the default; `ChaCha` is slower but has
/// stronger statistical properties and is selectable via the
/// `CONJECTURE_RNG_ALGORITHM=cc` environment variable for users who care.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RngAlgorithm {
    /// `XorShiftRng`. The default.
    XorShift,
    /// `ChaChaRng`.
    ChaCha,
}

impl Default for RngAlgorithm {
    fn default() -> Self {
        RngAlgorithm::XorShift
    }
}

impl FromStr for RngAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xs" => Ok(RngAlgorithm::XorShift),
            "cc" => Ok(RngAlgorithm::ChaCha),
            other => Err(format!(
                "unrecognized RNG algorithm '{}', expected 'xs' or 'cc'",
                other
            )),
        }
    }
}

impl fmt::Display for RngAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            RngAlgorithm::XorShift => "xs",
            RngAlgorithm::ChaCha => "cc",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug)]
enum Inner {
    XorShift(XorShiftRng),
    ChaCha(Box<ChaChaRng>),
}

/// The engine's random number generator.
///
/// One instance is owned exclusively by an `Engine` and threaded through
/// every randomized decision it makes (novel-prefix generation, mutator bit
/// selection, target selection, database down-sampling). This is what makes
/// a run reproducible given a fixed seed: there is no other source of
/// randomness anywhere in the engine.
#[derive(Clone, Debug)]
pub struct TestRng {
    inner: Inner,
}

impl RngCore for TestRng {
    fn next_u32(&mut self) -> u32 {
        match &mut self.inner {
            Inner::XorShift(r) => r.next_u32(),
            Inner::ChaCha(r) => r.next_u32(),
        }
    }

    fn next_u64(&mut self) -> u64 {
        match &mut self.inner {
            Inner::XorShift(r) => r.next_u64(),
            Inner::ChaCha(r) => r.next_u64(),
        }
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        match &mut self.inner {
            Inner::XorShift(r) => r.fill_bytes(dest),
            Inner::ChaCha(r) => r.fill_bytes(dest),
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        match &mut self.inner {
            Inner::XorShift(r) => r.try_fill_bytes(dest),
            Inner::ChaCha(r) => r.try_fill_bytes(dest),
        }
    }
}

impl TestRng {
    /// Construct a `TestRng` seeded from OS entropy.
    pub fn from_entropy(algorithm: RngAlgorithm) -> Self {
        use rand::FromEntropy;
        let inner = match algorithm {
            RngAlgorithm::XorShift => Inner::XorShift(XorShiftRng::from_entropy()),
            RngAlgorithm::ChaCha => Inner::ChaCha(Box::new(ChaChaRng::from_entropy())),
        };
        Self { inner }
    }

    /// Construct a `TestRng` from an explicit seed, for reproducible runs.
    pub fn from_seed(algorithm: RngAlgorithm, seed: Seed) -> Self {
        let inner = match algorithm {
            RngAlgorithm::XorShift => {
                let mut s = [0u8; 16];
                s.copy_from_slice(&seed[..16]);
                Inner::XorShift(XorShiftRng::from_seed(s))
            }
            RngAlgorithm::ChaCha => {
                Inner::ChaCha(Box::new(ChaChaRng::from_seed(seed)))
            }
        };
        Self { inner }
    }

    fn algorithm(&self) -> RngAlgorithm {
        match self.inner {
            Inner::XorShift(_) => RngAlgorithm::XorShift,
            Inner::ChaCha(_) => RngAlgorithm::ChaCha,
        }
    }

    /// Derive a fresh, independent `TestRng` from this one.
    ///
    /// Used whenever the engine needs a second PRNG stream (e.g. seeding a
    /// replay) without perturbing the primary stream's future output in an
    /// obviously-correlated way.
    pub(crate) fn gen_rng(&mut self) -> Self {
        Self::from_seed(self.algorithm(), self.new_rng_seed())
    }

    /// Generate a new randomized seed derived from this generator's stream.
    pub(crate) fn new_rng_seed(&mut self) -> Seed {
        let mut seed = [0u8; 32];
        self.fill_bytes(&mut seed);

        // Directly reusing raw output as a seed for a sibling generator of
        // the same algorithm would make the two streams trivially
        // correlated (XorShift in particular is invertible). Perturb with
        // arbitrary constants to decorrelate.
        for word in seed.chunks_mut(4) {
            word[3] ^= 0xde;
            word[2] ^= 0xad;
            word[1] ^= 0xbe;
            word[0] ^= 0xef;
        }

        seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn same_seed_same_stream() {
        let mut a = TestRng::from_seed(RngAlgorithm::XorShift, [7; 32]);
        let mut b = TestRng::from_seed(RngAlgorithm::XorShift, [7; 32]);
        let xs: Vec<u32> = (0..8).map(|_| a.gen()).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.gen()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn algorithm_round_trips_through_string() {
        assert_eq!(RngAlgorithm::XorShift, "xs".parse().unwrap());
        assert_eq!(RngAlgorithm::ChaCha, "cc".parse().unwrap());
        assert!("nope".parse::<RngAlgorithm>().is_err());
    }

    #[test]
    fn derived_rng_differs_from_parent() {
        let mut rng = TestRng::from_seed(RngAlgorithm::XorShift, [3; 32]);
        let mut child = rng.gen_rng();
        let parent_next: u32 = rng.gen();
        let child_next: u32 = child.gen();
        assert_ne!(parent_next, child_next);
    }
}
