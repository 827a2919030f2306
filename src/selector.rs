//-
// Copyright 2017, 2018 The proptest developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Modifications: C3 from spec.md §4.3, the bounded pool of recent
// "best-status" examples the mutation phase draws origins from. No direct
// analogue in the teacher; implemented per spec.md's fresh/used partition
// description.

use rand::Rng;

use crate::data::SharedData;
use crate::rng::TestRng;
use crate::status::Status;

/// A bounded pool of recent non-`Interesting` examples, partitioned into
/// ones never yet handed out (`fresh`) and ones handed out at least once
/// (`used`). Only examples whose status equals the best status seen so far
/// are retained (spec.md §4.3).
pub struct TargetSelector {
    fresh: Vec<SharedData>,
    used: Vec<SharedData>,
    best_status: Option<Status>,
    pool_size: usize,
}

impl TargetSelector {
    pub fn new(pool_size: usize) -> Self {
        TargetSelector {
            fresh: Vec::new(),
            used: Vec::new(),
            best_status: None,
            pool_size,
        }
    }

    pub fn len(&self) -> usize {
        self.fresh.len() + self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offer a completed example to the pool. Ignored if `Interesting`
    /// (those live in the engine's `interesting_examples` table, not here),
    /// or if it's worse than the incumbent `best_status`. A strictly better
    /// status evicts everything currently held.
    pub fn add(&mut self, data: SharedData, rng: &mut TestRng) {
        if data.status() == Status::Interesting {
            return;
        }
        match self.best_status {
            Some(best) if data.status() < best => return,
            Some(best) if data.status() > best => {
                self.best_status = Some(data.status());
                self.fresh.clear();
                self.used.clear();
            }
            None => self.best_status = Some(data.status()),
            _ => {}
        }

        self.fresh.push(data);

        if self.len() > self.pool_size {
            if !self.used.is_empty() {
                swap_remove_random(&mut self.used, rng);
            } else {
                swap_remove_random(&mut self.fresh, rng);
            }
        }
    }

    /// Select an origin for the mutator. Prefers an unused example,
    /// promoting it to `used` on the way out; falls back to a uniform
    /// random choice among used examples otherwise.
    ///
    /// Must not be called when the pool is empty.
    pub fn select(&mut self, rng: &mut TestRng) -> SharedData {
        if !self.fresh.is_empty() {
            let data = swap_remove_random(&mut self.fresh, rng);
            self.used.push(data.clone());
            data
        } else {
            assert!(!self.used.is_empty(), "select() called on an empty pool");
            let idx = rng.gen_range(0, self.used.len() as u32) as usize;
            self.used[idx].clone()
        }
    }
}

/// Pop a uniformly random element via swap-with-last, per spec.md §4.3:
/// "order of `values` is not a required invariant."
fn swap_remove_random(values: &mut Vec<SharedData>, rng: &mut TestRng) -> SharedData {
    let idx = rng.gen_range(0, values.len() as u32) as usize;
    values.swap_remove(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{replay_source, TestData};
    use crate::rng::RngAlgorithm;

    fn example(status: Status) -> SharedData {
        let mut data = TestData::new(100, 1000, 0, replay_source(vec![1]));
        data.draw_bytes(1);
        if status == Status::Invalid {
            data.mark_invalid();
        }
        data.freeze();
        std::rc::Rc::new(data)
    }

    #[test]
    fn pool_bound_is_respected() {
        let mut rng = TestRng::from_seed(RngAlgorithm::XorShift, [2; 32]);
        let mut sel = TargetSelector::new(4);
        for _ in 0..20 {
            sel.add(example(Status::Valid), &mut rng);
            assert!(sel.len() <= 4);
        }
    }

    #[test]
    fn select_promotes_fresh_to_used() {
        let mut rng = TestRng::from_seed(RngAlgorithm::XorShift, [3; 32]);
        let mut sel = TargetSelector::new(10);
        sel.add(example(Status::Valid), &mut rng);
        assert_eq!(1, sel.fresh.len());
        sel.select(&mut rng);
        assert_eq!(0, sel.fresh.len());
        assert_eq!(1, sel.used.len());
    }

    #[test]
    fn upgrading_best_status_clears_pool() {
        let mut rng = TestRng::from_seed(RngAlgorithm::XorShift, [4; 32]);
        let mut sel = TargetSelector::new(10);
        sel.add(example(Status::Invalid), &mut rng);
        sel.add(example(Status::Invalid), &mut rng);
        assert_eq!(2, sel.len());
        sel.add(example(Status::Valid), &mut rng);
        assert_eq!(1, sel.len());
    }

    #[test]
    fn worse_status_is_discarded() {
        let mut rng = TestRng::from_seed(RngAlgorithm::XorShift, [5; 32]);
        let mut sel = TargetSelector::new(10);
        sel.add(example(Status::Valid), &mut rng);
        assert_eq!(1, sel.len());
        sel.add(example(Status::Invalid), &mut rng);
        assert_eq!(1, sel.len());
    }
}
