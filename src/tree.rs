//-
// Copyright 2017, 2018 The proptest developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Modifications: this is C1 from spec.md §4.1, the prefix trie that
// dedupes executed byte streams and synthesizes novel prefixes. No analogue
// exists in the teacher (proptest has no cross-case memoization); the shape
// — arena of nodes indexed by integer id, sparse side-tables keyed by node
// id — follows spec.md §9's design notes directly.

use std::collections::HashMap;

use rand::Rng;

use crate::data::SharedData;
use crate::rng::TestRng;
use crate::status::Status;

type NodeId = usize;

enum Node {
    Branch(HashMap<u8, NodeId>),
    Leaf(SharedData),
}

/// The outcome of walking the trie along a candidate buffer, shared by
/// `prescreen` and `cached_test_function`.
enum Walk {
    /// Hit a node already known to have no unexplored descendants.
    Dead,
    /// A recorded block at this position is longer than the remaining
    /// buffer: replaying it would necessarily overrun.
    BlockTooShort,
    /// Reached a stored leaf.
    Leaf(SharedData),
    /// Descent found a byte with no existing child: this prefix has never
    /// been executed.
    Novel,
    /// Consumed the whole buffer without reaching a leaf or a missing
    /// child: replaying it would overrun.
    Overrun,
}

/// The prefix trie (C1): records every non-overrun byte stream the engine
/// has executed.
pub struct Tree {
    nodes: Vec<Node>,
    forced: HashMap<NodeId, u8>,
    masks: HashMap<NodeId, u8>,
    block_sizes: HashMap<NodeId, usize>,
    dead: std::collections::HashSet<NodeId>,
    cap: usize,
}

const ROOT: NodeId = 0;

impl Tree {
    pub fn new(cap: usize) -> Self {
        Tree {
            nodes: vec![Node::Branch(HashMap::new())],
            forced: HashMap::new(),
            masks: HashMap::new(),
            block_sizes: HashMap::new(),
            dead: std::collections::HashSet::new(),
            cap,
        }
    }

    /// Reset to a fresh, empty trie (spec.md §3, "cache reset"). Bounds
    /// memory: called every `CACHE_RESET_FREQUENCY` non-interesting calls
    /// when no interesting example is yet known.
    pub fn reset(&mut self) {
        *self = Tree::new(self.cap);
    }

    pub fn is_root_dead(&self) -> bool {
        self.dead.contains(&ROOT)
    }

    fn mask_for(&self, node: NodeId) -> u8 {
        self.masks.get(&node).copied().unwrap_or(0xFF)
    }

    fn child(&self, node: NodeId, byte: u8) -> Option<NodeId> {
        match &self.nodes[node] {
            Node::Branch(children) => children.get(&byte).copied(),
            Node::Leaf(_) => None,
        }
    }

    fn children_count(&self, node: NodeId) -> usize {
        match &self.nodes[node] {
            Node::Branch(children) => children.len(),
            Node::Leaf(_) => 0,
        }
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        match &self.nodes[node] {
            Node::Branch(children) => children.values().copied().collect(),
            Node::Leaf(_) => Vec::new(),
        }
    }

    fn child_or_create(&mut self, node: NodeId, byte: u8) -> NodeId {
        if let Some(existing) = self.child(node, byte) {
            return existing;
        }
        let new_id = self.nodes.len();
        self.nodes.push(Node::Branch(HashMap::new()));
        match &mut self.nodes[node] {
            Node::Branch(children) => {
                children.insert(byte, new_id);
            }
            Node::Leaf(_) => unreachable!("cannot descend through a leaf"),
        }
        new_id
    }

    /// Insert a completed test case's buffer as a path ending in a leaf.
    /// Spec.md §4.1's `insert` contract.
    pub fn insert(&mut self, data: SharedData) {
        let buffer = data.buffer().to_vec();
        let mut path = vec![ROOT];
        let mut node = ROOT;
        let mut stopped_early = false;

        for (i, &byte) in buffer.iter().enumerate() {
            if data.forced_indices().contains(&i) {
                self.forced.insert(node, byte);
            }
            if let Some(&m) = data.masked_indices().get(&i) {
                self.masks.insert(node, m);
            }
            if self.dead.contains(&node) {
                stopped_early = true;
                break;
            }
            let child = self.child_or_create(node, byte);
            path.push(child);
            node = child;
        }

        for &(u, v) in data.all_block_bounds() {
            if u < path.len() {
                self.block_sizes.insert(path[u], v - u);
            }
        }

        for (i, &n) in path.iter().enumerate() {
            if i >= self.cap {
                self.dead.insert(n);
            }
        }

        if stopped_early || data.status() == Status::Overrun {
            return;
        }

        let terminal = *path.last().unwrap();
        if self.dead.contains(&terminal) {
            return;
        }

        self.dead.insert(terminal);
        self.nodes[terminal] = Node::Leaf(data);

        for &j in path[..path.len() - 1].iter().rev() {
            let max_size = self.mask_for(j) as usize + 1;
            let alive = !self.forced.contains_key(&j) && self.children_count(j) < max_size;
            if alive {
                break;
            }
            let all_dead = self.children(j).into_iter().all(|c| self.dead.contains(&c));
            if all_dead {
                self.dead.insert(j);
            } else {
                break;
            }
        }
    }

    /// Synthesize a byte sequence that, as a prefix, has never been
    /// executed. Spec.md §4.1's `generate_novel_prefix` contract.
    ///
    /// Panics if the root is dead; callers must check `is_root_dead()`
    /// first (the language is exhausted).
    pub fn generate_novel_prefix(&self, rng: &mut TestRng) -> Vec<u8> {
        assert!(!self.is_root_dead(), "generate_novel_prefix: root is dead");
        let mut node = ROOT;
        let mut prefix = Vec::new();

        loop {
            let mask = self.mask_for(node);
            let mut c = match self.forced.get(&node) {
                Some(&f) => f,
                None => rng.gen_range(0, mask as u32 + 1) as u8,
            };

            match self.child(node, c) {
                None => {
                    prefix.push(c);
                    return prefix;
                }
                Some(child) if self.dead.contains(&child) => {
                    let live: Vec<u8> = (0..=mask)
                        .filter(|&b| match self.child(node, b) {
                            None => true,
                            Some(ch) => !self.dead.contains(&ch),
                        })
                        .collect();
                    assert!(
                        !live.is_empty(),
                        "live-subtree invariant violated at node {}",
                        node
                    );
                    c = live[rng.gen_range(0, live.len() as u32) as usize];
                    match self.child(node, c) {
                        None => {
                            prefix.push(c);
                            return prefix;
                        }
                        Some(child2) => {
                            prefix.push(c);
                            node = child2;
                        }
                    }
                }
                Some(child) => {
                    prefix.push(c);
                    node = child;
                }
            }
        }
    }

    fn walk(&self, buffer: &[u8]) -> Walk {
        let mut node = ROOT;
        for (i, &raw) in buffer.iter().enumerate() {
            if self.dead.contains(&node) {
                return Walk::Dead;
            }
            if let Some(&size) = self.block_sizes.get(&node) {
                if i + size > buffer.len() {
                    return Walk::BlockTooShort;
                }
            }
            let byte = if let Some(&f) = self.forced.get(&node) {
                f
            } else if let Some(&m) = self.masks.get(&node) {
                raw & m
            } else {
                raw
            };
            match self.child(node, byte) {
                None => return Walk::Novel,
                Some(child) => node = child,
            }
        }
        match &self.nodes[node] {
            Node::Leaf(data) => Walk::Leaf(data.clone()),
            Node::Branch(_) => Walk::Overrun,
        }
    }

    /// `false` iff replaying `buffer` is guaranteed redundant. Spec.md
    /// §4.1's `prescreen` contract.
    pub fn prescreen(&self, buffer: &[u8]) -> bool {
        matches!(self.walk(buffer), Walk::Novel | Walk::Leaf(_))
    }

    /// If `buffer`'s path already reaches a stored leaf, return it;
    /// otherwise `None` (the caller should run the test function fresh
    /// and `insert` the result). Spec.md §4.1's `cached_test_function`
    /// contract, minus the "call the test function" half (kept in
    /// `Engine` so this module has no dependency on the test-function
    /// type).
    pub fn cached_leaf(&self, buffer: &[u8]) -> Option<SharedData> {
        match self.walk(buffer) {
            Walk::Leaf(data) => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{replay_source, TestData};
    use crate::rng::RngAlgorithm;

    fn run(buffer: &[u8], cap: usize) -> SharedData {
        let mut data = TestData::new(cap, 1000, 0, replay_source(buffer.to_vec()));
        for _ in 0..buffer.len() {
            data.draw_bytes(1);
        }
        data.freeze();
        std::rc::Rc::new(data)
    }

    #[test]
    fn insert_then_prescreen_is_not_novel() {
        let mut tree = Tree::new(100);
        let data = run(&[1, 2, 3], 100);
        tree.insert(data);
        assert!(!tree.prescreen(&[1, 2, 3]));
        assert!(tree.prescreen(&[1, 2, 4]));
        assert!(tree.prescreen(&[9]));
    }

    #[test]
    fn cached_leaf_hits_exact_match() {
        let mut tree = Tree::new(100);
        let data = run(&[5, 6], 100);
        tree.insert(data.clone());
        let hit = tree.cached_leaf(&[5, 6]).expect("should hit cache");
        assert_eq!(data.buffer(), hit.buffer());
    }

    #[test]
    fn duplicate_insert_is_a_no_op() {
        let mut tree = Tree::new(100);
        tree.insert(run(&[1, 2], 100));
        let node_count_before = tree.nodes.len();
        tree.insert(run(&[1, 2], 100));
        assert_eq!(node_count_before, tree.nodes.len());
    }

    #[test]
    fn exhausting_a_one_byte_language_dies_at_root() {
        let mut tree = Tree::new(1000);
        for b in 0u8..=255 {
            tree.insert(run(&[b], 1000));
        }
        assert!(tree.is_root_dead());
    }

    #[test]
    fn novel_prefix_is_never_a_repeat() {
        let mut tree = Tree::new(1000);
        let mut rng = TestRng::from_seed(RngAlgorithm::XorShift, [1; 32]);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..50 {
            let prefix = tree.generate_novel_prefix(&mut rng);
            assert!(seen.insert(prefix.clone()), "prefix {:?} repeated", prefix);
            tree.insert(run(&prefix, 1000));
        }
    }

    #[test]
    fn cap_marks_trailing_positions_dead() {
        let mut tree = Tree::new(2);
        tree.insert(run(&[1, 2, 3, 4], 2));
        // positions >= cap (2) along the path are dead, so a sibling byte
        // at position 2 is still reachable (it's a fresh child) but a
        // *longer* continuation down this exact path is not novel.
        assert!(!tree.prescreen(&[1, 2, 3, 4]));
    }
}
