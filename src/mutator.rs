//-
// Copyright 2017, 2018 The proptest developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Modifications: C2 from spec.md §4.2, the mutator factory that builds a
// byte-drawer closed over a previous "origin" example. No direct analogue
// in the teacher (proptest mutates `ValueTree`s, not raw byte streams);
// the ten bit-strategies and their multiplicities are taken verbatim from
// spec.md's table.

use std::cell::RefCell;
use std::rc::Rc;

use rand::Rng;

use crate::data::{ByteSource, DrawContext, SharedData};
use crate::rng::TestRng;

/// One of the ten byte-drawing behaviors a `Mutator` samples from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum BitStrategy {
    DrawNew,
    RedrawLast,
    ReuseExisting,
    DrawExisting,
    DrawSmaller,
    DrawLarger,
    FlipBit,
    DrawZero,
    DrawMax,
    DrawConstant,
}

/// The bit-strategy table, spec.md §4.2: each entry repeated `multiplicity`
/// times so that sampling uniformly with replacement from the flattened
/// list reproduces the documented weights.
const TABLE: &[(BitStrategy, u32)] = &[
    (BitStrategy::DrawNew, 1),
    (BitStrategy::RedrawLast, 2),
    (BitStrategy::ReuseExisting, 2),
    (BitStrategy::DrawExisting, 1),
    (BitStrategy::DrawSmaller, 1),
    (BitStrategy::DrawLarger, 1),
    (BitStrategy::FlipBit, 1),
    (BitStrategy::DrawZero, 2),
    (BitStrategy::DrawMax, 2),
    (BitStrategy::DrawConstant, 1),
];

fn sample_strategy(rng: &mut TestRng) -> BitStrategy {
    let total: u32 = TABLE.iter().map(|&(_, m)| m).sum();
    let mut pick = rng.gen_range(0, total);
    for &(strategy, multiplicity) in TABLE {
        if pick < multiplicity {
            return strategy;
        }
        pick -= multiplicity;
    }
    unreachable!("sample_strategy: weights did not cover the roll");
}

/// Draw a strict lexicographic predecessor of `x`: the first index where
/// the result differs is strictly smaller, and every later index is
/// uniform. If the draw never goes strict, the result equals `x`. Spec.md
/// §4.2, "Lexicographic predecessor/successor".
fn draw_predecessor(rng: &mut TestRng, x: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(x.len());
    let mut strict = false;
    for &xi in x {
        let c = if strict {
            rng.gen_range(0, 256) as u8
        } else if xi == 0 {
            0
        } else {
            let c = rng.gen_range(0, xi as u32 + 1) as u8;
            if c < xi {
                strict = true;
            }
            c
        };
        out.push(c);
    }
    out
}

/// Symmetric to `draw_predecessor`: a strict lexicographic successor.
fn draw_successor(rng: &mut TestRng, x: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(x.len());
    let mut strict = false;
    for &xi in x {
        let c = if strict {
            rng.gen_range(0, 256) as u8
        } else if xi == 255 {
            255
        } else {
            let c = xi + rng.gen_range(0, 256 - xi as u32) as u8;
            if c > xi {
                strict = true;
            }
            c
        };
        out.push(c);
    }
    out
}

/// A stateful byte-drawer closed over an `origin` buffer. Spec.md §4.2.
///
/// Constructing one is cheap-ish (one novel prefix, three sampled
/// strategies); the engine builds a fresh `Mutator` whenever the current
/// one regresses or has been reused `MUTATIONS_PER_ORIGIN` times.
pub struct Mutator {
    origin: SharedData,
    prefix: Vec<u8>,
    strategies: [BitStrategy; 3],
    /// The mutator's own PRNG stream, derived once at construction from
    /// the engine's primary RNG via `TestRng::gen_rng` (rng.rs). Keeping a
    /// dedicated stream here — rather than borrowing the engine's RNG for
    /// the lifetime of the boxed `ByteSource` closure — is what lets a
    /// `Mutator` be wrapped in `Rc<RefCell<_>>` and handed to several data
    /// objects in turn without fighting the borrow checker, while the
    /// overall run stays reproducible (spec.md §5).
    rng: TestRng,
}

impl Mutator {
    pub fn new(origin: SharedData, tree: &crate::tree::Tree, rng: &mut TestRng) -> Self {
        let mut own_rng = rng.gen_rng();
        let prefix = tree.generate_novel_prefix(&mut own_rng);
        let strategies = [
            sample_strategy(&mut own_rng),
            sample_strategy(&mut own_rng),
            sample_strategy(&mut own_rng),
        ];
        Mutator {
            origin,
            prefix,
            strategies,
            rng: own_rng,
        }
    }

    pub fn origin(&self) -> &SharedData {
        &self.origin
    }

    /// Swap in a fresh origin and novel prefix while keeping the three
    /// sampled bit-strategies and the mutator's own RNG stream. The
    /// generation loop calls this every mutation iteration (spec.md
    /// §4.4.1): only a regression or `MUTATIONS_PER_ORIGIN` reuses forces
    /// a full `Mutator::new` rebuild of the strategies themselves.
    pub fn retarget(&mut self, origin: SharedData, tree: &crate::tree::Tree, rng: &mut TestRng) {
        self.prefix = tree.generate_novel_prefix(rng);
        self.origin = origin;
    }

    /// Draw `n` bytes for the data object currently at `ctx`, applying one
    /// of the three pre-chosen bit strategies and then overlaying the
    /// novel prefix.
    pub fn draw(&mut self, ctx: &DrawContext, n: usize) -> Vec<u8> {
        let origin_buf = self.origin.buffer();

        let mut result = if ctx.index + n > origin_buf.len() {
            uniform(&mut self.rng, n)
        } else {
            let idx = self.rng.gen_range(0, 3) as usize;
            let strategy = self.strategies[idx];
            self.apply_strategy(strategy, ctx, n)
        };

        // Overlay the prefix over [ctx.index, ctx.index + n) intersected
        // with [0, prefix.len()).
        let overlay_end = (ctx.index + n).min(self.prefix.len());
        if ctx.index < overlay_end {
            for i in ctx.index..overlay_end {
                result[i - ctx.index] = self.prefix[i];
            }
        }

        result
    }

    fn apply_strategy(&mut self, strategy: BitStrategy, ctx: &DrawContext, n: usize) -> Vec<u8> {
        let origin_buf = self.origin.buffer();
        let existing = origin_buf[ctx.index..ctx.index + n].to_vec();

        match strategy {
            BitStrategy::DrawNew => uniform(&mut self.rng, n),
            BitStrategy::RedrawLast => match self.origin.last_block_start() {
                Some(last_start) if ctx.index + n <= last_start => existing,
                _ => uniform(&mut self.rng, n),
            },
            BitStrategy::ReuseExisting => {
                let starts = self.origin.block_starts(n);
                if starts.is_empty() {
                    uniform(&mut self.rng, n)
                } else {
                    let start = starts[self.rng.gen_range(0, starts.len() as u32) as usize];
                    self.origin.buffer()[start..start + n].to_vec()
                }
            }
            BitStrategy::DrawExisting => existing,
            BitStrategy::DrawSmaller => {
                let r = uniform(&mut self.rng, n);
                if lexicographic_le(&r, &existing) {
                    r
                } else {
                    draw_predecessor(&mut self.rng, &existing)
                }
            }
            BitStrategy::DrawLarger => {
                let r = uniform(&mut self.rng, n);
                if lexicographic_le(&existing, &r) {
                    r
                } else {
                    draw_successor(&mut self.rng, &existing)
                }
            }
            BitStrategy::FlipBit => {
                let mut buf = existing;
                if !buf.is_empty() {
                    let bit = self.rng.gen_range(0, (buf.len() * 8) as u32) as usize;
                    buf[bit / 8] ^= 1 << (bit % 8);
                }
                buf
            }
            BitStrategy::DrawZero => vec![0u8; n],
            BitStrategy::DrawMax => vec![0xffu8; n],
            BitStrategy::DrawConstant => {
                let byte = self.rng.gen_range(0, 256) as u8;
                vec![byte; n]
            }
        }
    }
}

/// Wrap a `Mutator` as a `ByteSource` the engine can hand to a `TestData`.
/// Shared via `Rc<RefCell<_>>` so the engine retains its own handle (to
/// inspect the origin, rebuild strategies, etc.) after the data object
/// that borrowed it has been consumed.
pub fn mutator_source(mutator: Rc<RefCell<Mutator>>) -> ByteSource {
    Box::new(move |ctx, n| Some(mutator.borrow_mut().draw(ctx, n)))
}

fn uniform(rng: &mut TestRng, n: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut buf = vec![0u8; n];
    rng.fill_bytes(&mut buf);
    buf
}

fn lexicographic_le(a: &[u8], b: &[u8]) -> bool {
    a <= b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::RngAlgorithm;

    #[test]
    fn predecessor_never_exceeds_input() {
        let mut rng = TestRng::from_seed(RngAlgorithm::XorShift, [9; 32]);
        for _ in 0..200 {
            let x: Vec<u8> = (0..5).map(|_| rng.gen_range(0, 256) as u8).collect();
            let p = draw_predecessor(&mut rng, &x);
            assert_eq!(x.len(), p.len());
            assert!(p.as_slice() <= x.as_slice(), "{:?} > {:?}", p, x);
        }
    }

    #[test]
    fn successor_never_subceeds_input() {
        let mut rng = TestRng::from_seed(RngAlgorithm::XorShift, [10; 32]);
        for _ in 0..200 {
            let x: Vec<u8> = (0..5).map(|_| rng.gen_range(0, 256) as u8).collect();
            let s = draw_successor(&mut rng, &x);
            assert_eq!(x.len(), s.len());
            assert!(s.as_slice() >= x.as_slice(), "{:?} < {:?}", s, x);
        }
    }

    #[test]
    fn sample_strategy_covers_every_entry() {
        let mut rng = TestRng::from_seed(RngAlgorithm::XorShift, [11; 32]);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..2000 {
            seen.insert(sample_strategy(&mut rng));
        }
        assert_eq!(TABLE.len(), seen.len());
    }
}
