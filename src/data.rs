//-
// Copyright 2017, 2018 The proptest developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Modifications: spec.md §3/§4.7 treats `TestData` ("ConjectureData") as an
// external collaborator and only specifies its contract. This module is the
// concrete implementation of that contract the rest of the crate is built
// against: a byte-stream reader that records block boundaries, forced/
// masked positions, and applies the zero-bound rewriter (C7) to every draw.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::reason::InterestingOrigin;
use crate::status::Status;

/// Returns `true` iff `m` is a *simple mask*, i.e. `m == 2^n - 1` for some
/// `n >= 0` (spec.md §8, property 3).
pub fn is_simple_mask(m: u8) -> bool {
    m & m.wrapping_add(1) == 0
}

/// A snapshot of a `TestData`'s draw position, handed to a `ByteSource` so
/// it can decide what bytes to produce without being given mutable access
/// to the data object itself.
#[derive(Copy, Clone, Debug)]
pub struct DrawContext<'a> {
    /// The number of bytes already consumed from this data object.
    pub index: usize,
    /// The number of draw calls made so far (one block == one call).
    pub depth: usize,
    /// The bytes produced so far.
    pub buffer: &'a [u8],
}

/// A source of bytes for a `TestData`.
///
/// Returns `Some(bytes)` of exactly the requested length, or `None` if the
/// source is exhausted (e.g. replaying a buffer shorter than the test
/// function wants to read) — the latter is how `Status::Overrun` arises.
pub type ByteSource = Box<dyn FnMut(&DrawContext, usize) -> Option<Vec<u8>>>;

/// A `ByteSource` that replays a fixed buffer, in order, and reports
/// exhaustion as `None` once it runs out.
pub fn replay_source(buffer: Vec<u8>) -> ByteSource {
    Box::new(move |ctx, n| {
        if ctx.index + n > buffer.len() {
            None
        } else {
            Some(buffer[ctx.index..ctx.index + n].to_vec())
        }
    })
}

/// A `ByteSource` that always produces uniform random bytes.
pub fn random_source(mut rng: crate::rng::TestRng) -> ByteSource {
    use rand::RngCore;
    Box::new(move |_ctx, n| {
        let mut buf = vec![0u8; n];
        rng.fill_bytes(&mut buf);
        Some(buf)
    })
}

/// A `ByteSource` that always produces `n` zero bytes.
pub fn zeros_source() -> ByteSource {
    Box::new(|_ctx, n| Some(vec![0u8; n]))
}

/// A `ByteSource` that serves `prefix` bytes first, falling back to
/// uniform random bytes once the prefix is exhausted. Used by the
/// generation phase's "serve prefix bytes first and uniform bytes after"
/// drawer (spec.md §4.4.1).
pub fn prefix_then_random_source(prefix: Vec<u8>, mut rng: crate::rng::TestRng) -> ByteSource {
    use rand::RngCore;
    Box::new(move |ctx, n| {
        let mut buf = vec![0u8; n];
        let prefix_end = (ctx.index + n).min(prefix.len());
        if ctx.index < prefix_end {
            buf[..prefix_end - ctx.index].copy_from_slice(&prefix[ctx.index..prefix_end]);
        }
        if prefix_end < ctx.index + n {
            let tail_start = prefix_end - ctx.index;
            rng.fill_bytes(&mut buf[tail_start..]);
        }
        Some(buf)
    })
}

/// Block-depth bound shared with the zero-bound rewriter (C7); referenced
/// by spec.md §6 as "`MAX_DEPTH` (from data module)".
pub const MAX_DEPTH: usize = 1000;

/// A byte-stream reader driving one execution of the user's test function.
///
/// Modeled on spec.md §3's `TestData` contract. Owns everything that is
/// local to a single test case: the growing `buffer`, the side tables the
/// prefix trie (C1) needs (`forced_indices`, `masked_indices`,
/// `all_block_bounds`), and the zero-bound cap state (C7).
pub struct TestData {
    buffer: Vec<u8>,
    forced_indices: BTreeSet<usize>,
    masked_indices: BTreeMap<usize, u8>,
    block_bounds: Vec<(usize, usize)>,
    events: Vec<String>,
    interesting_origin: Option<InterestingOrigin>,
    depth: usize,
    cap: usize,
    max_depth: usize,
    overran: bool,
    hit_zero_bound: bool,
    frozen: bool,
    status: Option<Status>,
    testcounter: u64,
    start: Instant,
    draw_times: Vec<Duration>,
    finished_at: Option<Instant>,
    source: ByteSource,
}

impl TestData {
    /// Construct a fresh data object that will draw bytes from `source`.
    ///
    /// `cap` is `Settings::cap()` (half the buffer size); `max_depth`
    /// bounds block depth the same way `cap` bounds byte position (spec.md
    /// §4.7: "If `data.depth * 2 >= MAX_DEPTH` ... zero-bound").
    pub fn new(cap: usize, max_depth: usize, testcounter: u64, source: ByteSource) -> Self {
        TestData {
            buffer: Vec::new(),
            forced_indices: BTreeSet::new(),
            masked_indices: BTreeMap::new(),
            block_bounds: Vec::new(),
            events: Vec::new(),
            interesting_origin: None,
            depth: 0,
            cap,
            max_depth,
            overran: false,
            hit_zero_bound: false,
            frozen: false,
            status: None,
            testcounter,
            start: Instant::now(),
            draw_times: Vec::new(),
            finished_at: None,
            source,
        }
    }

    /// The test-counter this data object was constructed with. Used by the
    /// "stop-test" handshake (spec.md §6): a signal whose counter doesn't
    /// match this value belongs to an earlier, already-abandoned test case.
    pub fn testcounter(&self) -> u64 {
        self.testcounter
    }

    /// Draw `n` unmasked bytes.
    pub fn draw_bytes(&mut self, n: usize) -> Vec<u8> {
        self.draw_masked(n, None)
    }

    /// Draw `n` bytes, each restricted to `mask` (must be a simple mask, or
    /// `None` for no restriction). Records the mask in `masked_indices` so
    /// the prefix trie can reuse it when computing novel prefixes.
    pub fn draw_masked(&mut self, n: usize, mask: Option<u8>) -> Vec<u8> {
        if let Some(m) = mask {
            debug_assert!(is_simple_mask(m), "mask {} is not a simple mask", m);
        }
        let draw_start = Instant::now();
        let start = self.buffer.len();

        let raw = if self.overran {
            vec![0u8; n]
        } else {
            let ctx = DrawContext {
                index: self.buffer.len(),
                depth: self.depth,
                buffer: &self.buffer,
            };
            match (self.source)(&ctx, n) {
                Some(bytes) => bytes,
                None => {
                    self.overran = true;
                    vec![0u8; n]
                }
            }
        };

        let masked: Vec<u8> = match mask {
            Some(m) => raw.iter().map(|&b| b & m).collect(),
            None => raw,
        };

        let rewritten = self.apply_zero_bound(start, masked);

        if let Some(m) = mask {
            for i in start..start + n {
                self.masked_indices.insert(i, m);
            }
        }

        self.buffer.extend_from_slice(&rewritten);
        self.block_bounds.push((start, start + n));
        self.depth += 1;
        self.draw_times.push(draw_start.elapsed());

        rewritten
    }

    /// Write `bytes` directly, without consulting the source. Marks every
    /// position as forced: the value is fixed regardless of randomness,
    /// matching spec.md's "Forced byte" definition.
    pub fn draw_forced(&mut self, bytes: &[u8]) -> Vec<u8> {
        let draw_start = Instant::now();
        let start = self.buffer.len();
        let n = bytes.len();
        let rewritten = self.apply_zero_bound(start, bytes.to_vec());
        for i in start..start + n {
            self.forced_indices.insert(i);
        }
        self.buffer.extend_from_slice(&rewritten);
        self.block_bounds.push((start, start + n));
        self.depth += 1;
        self.draw_times.push(draw_start.elapsed());
        rewritten
    }

    /// The zero-bound rewriter (C7, spec.md §4.7).
    fn apply_zero_bound(&mut self, index: usize, mut result: Vec<u8>) -> Vec<u8> {
        let k = result.len();
        if self.depth * 2 >= self.max_depth || index >= self.cap {
            for i in index..index + k {
                self.forced_indices.insert(i);
            }
            self.hit_zero_bound = true;
            return vec![0u8; k];
        }
        if index + k >= self.cap {
            let m = self.cap - index;
            for byte in result.iter_mut().skip(m) {
                *byte = 0;
            }
            for i in self.cap..index + k {
                self.forced_indices.insert(i);
            }
            self.hit_zero_bound = true;
        }
        result
    }

    /// Append an opaque event tag (spec.md's `events`).
    pub fn note_event(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }

    /// Record that the test found a bug, distinguished by `origin`.
    pub fn mark_interesting(&mut self, origin: InterestingOrigin) {
        self.status = Some(Status::Interesting);
        self.interesting_origin = Some(origin);
    }

    /// Record that the generated input was rejected (filtered).
    pub fn mark_invalid(&mut self) {
        if self.status != Some(Status::Interesting) {
            self.status = Some(Status::Invalid);
        }
    }

    /// Freeze this data object: no further draws are meaningful, and the
    /// final status is computed from whatever the test function did (or,
    /// if a draw overran, forced to `Overrun` regardless).
    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        self.frozen = true;
        self.finished_at = Some(Instant::now());
        if self.overran {
            self.status = Some(Status::Overrun);
        } else if self.status.is_none() {
            self.status = Some(Status::Valid);
        }
    }

    pub fn status(&self) -> Status {
        self.status.unwrap_or(Status::Valid)
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }

    pub fn forced_indices(&self) -> &BTreeSet<usize> {
        &self.forced_indices
    }

    pub fn masked_indices(&self) -> &BTreeMap<usize, u8> {
        &self.masked_indices
    }

    pub fn all_block_bounds(&self) -> &[(usize, usize)] {
        &self.block_bounds
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn interesting_origin(&self) -> Option<&InterestingOrigin> {
        self.interesting_origin.as_ref()
    }

    pub fn hit_zero_bound(&self) -> bool {
        self.hit_zero_bound
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn index(&self) -> usize {
        self.buffer.len()
    }

    pub fn draw_times(&self) -> &[Duration] {
        &self.draw_times
    }

    pub fn total_draw_time(&self) -> Duration {
        self.draw_times.iter().sum()
    }

    pub fn runtime(&self) -> Duration {
        self.finished_at
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.start)
    }

    /// The list of block start positions among `all_block_bounds()` whose
    /// length is exactly `n`. Used by the mutator's `reuse_existing`
    /// strategy (spec.md §4.2).
    pub fn block_starts(&self, n: usize) -> Vec<usize> {
        self.block_bounds
            .iter()
            .filter(|&&(u, v)| v - u == n)
            .map(|&(u, _)| u)
            .collect()
    }

    /// The start of the last recorded block, if any. `None` when the
    /// origin drew no blocks at all — spec.md §9's open question on
    /// `redraw_last` resolves this as "fall through to uniform".
    pub fn last_block_start(&self) -> Option<usize> {
        self.block_bounds.last().map(|&(u, _)| u)
    }
}

/// Wraps a `TestData` so it can be shared between the prefix trie, the
/// interesting-examples table, and the target selector pool without
/// cloning the buffer (spec.md §9, "model as shared ownership").
pub type SharedData = Rc<TestData>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_mask_law() {
        for m in 0u16..=256 {
            let expect = (0u16..=8).any(|n| m == (1u16 << n) - 1);
            if m <= 255 {
                assert_eq!(expect, is_simple_mask(m as u8), "m = {}", m);
            }
        }
    }

    #[test]
    fn replay_source_overruns_past_end() {
        let mut data = TestData::new(100, 1000, 0, replay_source(vec![1, 2, 3]));
        assert_eq!(vec![1, 2, 3], data.draw_bytes(3));
        assert_eq!(vec![0, 0], data.draw_bytes(2));
        data.freeze();
        assert_eq!(Status::Overrun, data.status());
    }

    #[test]
    fn zero_bound_forces_trailing_bytes() {
        let mut data = TestData::new(2, 1000, 0, replay_source(vec![9, 9, 9, 9]));
        assert_eq!(vec![9, 9], data.draw_bytes(2));
        assert_eq!(vec![0, 0], data.draw_bytes(2));
        assert!(data.hit_zero_bound());
        assert!(data.forced_indices().contains(&2));
        assert!(data.forced_indices().contains(&3));
    }

    #[test]
    fn masked_draw_restricts_and_records() {
        let mut data = TestData::new(100, 1000, 0, replay_source(vec![0xff]));
        let got = data.draw_masked(1, Some(0x0f));
        assert_eq!(vec![0x0f], got);
        assert_eq!(Some(&0x0f), data.masked_indices().get(&0));
    }

    #[test]
    fn freeze_is_idempotent() {
        let mut data = TestData::new(100, 1000, 0, zeros_source());
        data.draw_bytes(1);
        data.freeze();
        let first = data.status();
        data.freeze();
        assert_eq!(first, data.status());
    }
}
