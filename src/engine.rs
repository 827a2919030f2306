//-
// Copyright 2017, 2018, 2019 The proptest developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Modifications: this is C4 from spec.md §4.4, the driver state machine.
// Its shape — a struct owning the RNG, a `run` entry point sequencing
// phases, and a `call_test` style wrapper around the user function that
// catches panics as failures — follows the teacher's `TestRunner`/
// `call_test` in `runner.rs` directly; the phase/budget/shrink sequencing
// itself is spec.md §4.4's alone (the teacher has no corpus-reuse,
// mutation-pool, or multi-phase shrink sequencing to draw from).

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::data::{
    prefix_then_random_source, replay_source, ByteSource, SharedData, TestData, MAX_DEPTH,
};
use crate::database::DatabaseKeys;
use crate::errors::TestCaseError;
use crate::health::{HealthCheckKind, HealthMonitor};
use crate::mutator::{mutator_source, Mutator};
use crate::reason::InterestingOrigin;
use crate::reporting::Reporter;
use crate::rng::TestRng;
use crate::selector::TargetSelector;
use crate::config::{Phases, Settings};
use crate::shrink::Shrinker;
use crate::status::{ExitReason, Status};
use crate::tree::Tree;

/// A user test function: consumes bytes from `data`, returns normally for
/// a rejection/failure, or panics (treated identically to `Fail`, matching
/// the teacher's `call_test`'s `catch_unwind`-based assertion handling).
pub type TestFn<'a> = dyn FnMut(&mut TestData) -> crate::errors::TestCaseResult + 'a;

const HUNG_TEST_TIME_LIMIT: Duration = Duration::from_secs(300);
const MAX_SHRINKS: u32 = 500;
const CACHE_RESET_FREQUENCY: u32 = 1000;
const MUTATION_POOL_SIZE: usize = 100;
const MUTATIONS_PER_ORIGIN: u32 = 10;
const MIN_PURE_GENERATION_EXAMPLES: u32 = 10;

/// Internal non-local-return signal: "the run is over, for this reason."
/// Spec.md §5, "Cancellation": modeled as an explicit `Result` rather than
/// an actual exception, per §9's design note.
struct RunComplete(ExitReason);

type RunResult<T> = Result<T, RunComplete>;

/// The driver (C4): owns every other component and sequences a single run
/// of `reuse → generate → shrink` against a user test function.
pub struct Engine {
    settings: Settings,
    database_key: Vec<u8>,
    reporter: Rc<dyn Reporter>,
    rng: TestRng,

    tree: Tree,
    selector: TargetSelector,
    health: Option<HealthMonitor>,

    call_count: u64,
    valid_examples: u32,
    shrinks: u32,
    calls_since_cache_reset: u32,
    used_examples_from_database: bool,

    interesting_examples: BTreeMap<InterestingOrigin, SharedData>,
    shrunk_examples: HashSet<InterestingOrigin>,

    zero_bound_queue: Vec<SharedData>,

    start_time: Instant,
    exit_reason: Option<ExitReason>,

    // Diagnostic accounting (SPEC_FULL §3): mirrors `engine.py`'s
    // `note_details`/`event_call_counts`. Doesn't affect control flow.
    all_runtimes: Vec<Duration>,
    all_drawtimes: Vec<Duration>,
    status_runtimes: BTreeMap<Status, Vec<Duration>>,
    event_call_counts: HashMap<String, u32>,
}

fn sort_key(buffer: &[u8]) -> (usize, &[u8]) {
    (buffer.len(), buffer)
}

impl Engine {
    pub fn new(settings: Settings, database_key: Vec<u8>, reporter: Rc<dyn Reporter>) -> Self {
        let rng = TestRng::from_entropy(settings.rng_algorithm);
        Self::with_rng(settings, database_key, reporter, rng)
    }

    pub fn with_seed(
        settings: Settings,
        database_key: Vec<u8>,
        reporter: Rc<dyn Reporter>,
        seed: crate::rng::Seed,
    ) -> Self {
        let algorithm = settings.rng_algorithm;
        Self::with_rng(
            settings,
            database_key,
            reporter,
            TestRng::from_seed(algorithm, seed),
        )
    }

    fn with_rng(
        settings: Settings,
        database_key: Vec<u8>,
        reporter: Rc<dyn Reporter>,
        rng: TestRng,
    ) -> Self {
        let cap = settings.cap();
        Engine {
            settings,
            database_key,
            reporter,
            rng,
            tree: Tree::new(cap),
            selector: TargetSelector::new(MUTATION_POOL_SIZE),
            health: None,
            call_count: 0,
            valid_examples: 0,
            shrinks: 0,
            calls_since_cache_reset: 0,
            used_examples_from_database: false,
            interesting_examples: BTreeMap::new(),
            shrunk_examples: HashSet::new(),
            zero_bound_queue: Vec::new(),
            start_time: Instant::now(),
            exit_reason: None,
            all_runtimes: Vec::new(),
            all_drawtimes: Vec::new(),
            status_runtimes: BTreeMap::new(),
            event_call_counts: HashMap::new(),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.call_count
    }

    pub fn valid_examples(&self) -> u32 {
        self.valid_examples
    }

    pub fn shrinks(&self) -> u32 {
        self.shrinks
    }

    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.exit_reason
    }

    pub fn interesting_examples(&self) -> &BTreeMap<InterestingOrigin, SharedData> {
        &self.interesting_examples
    }

    pub fn used_examples_from_database(&self) -> bool {
        self.used_examples_from_database
    }

    pub fn event_call_counts(&self) -> &HashMap<String, u32> {
        &self.event_call_counts
    }

    pub fn all_runtimes(&self) -> &[Duration] {
        &self.all_runtimes
    }

    pub fn all_drawtimes(&self) -> &[Duration] {
        &self.all_drawtimes
    }

    pub fn status_runtimes(&self) -> &BTreeMap<Status, Vec<Duration>> {
        &self.status_runtimes
    }

    /// Run the configured phases against `test_fn` to completion, returning
    /// why the run stopped. Spec.md §4.4's `run()`.
    pub fn run<F>(&mut self, mut test_fn: F) -> ExitReason
    where
        F: FnMut(&mut TestData) -> crate::errors::TestCaseResult,
    {
        self.start_time = Instant::now();
        let outcome = self.run_inner(&mut test_fn);
        let reason = match outcome {
            Ok(()) => unreachable!("run_inner always ends via RunComplete"),
            Err(RunComplete(reason)) => reason,
        };
        self.exit_reason = Some(reason);
        reason
    }

    fn run_inner(&mut self, test_fn: &mut dyn FnMut(&mut TestData) -> crate::errors::TestCaseResult) -> RunResult<()> {
        if self.settings.phases.contains(Phases::REUSE) {
            self.reuse_existing_examples(test_fn)?;
        }
        if self.settings.phases.contains(Phases::GENERATE) {
            self.generate_new_examples(test_fn)?;
        }
        if self.settings.phases.contains(Phases::SHRINK) {
            self.shrink_interesting_examples(test_fn)?;
        }
        Err(self.exit_with(ExitReason::Finished))
    }

    fn exit_with(&mut self, reason: ExitReason) -> RunComplete {
        self.exit_reason = Some(reason);
        RunComplete(reason)
    }

    fn check_hung_test(&self) {
        if self.start_time.elapsed() > HUNG_TEST_TIME_LIMIT {
            self.fail_health_check(HealthCheckKind::HungTest, "test has been running for over 5 minutes");
        }
    }

    fn fail_health_check(&self, kind: HealthCheckKind, message: &str) {
        if self.settings.verbosity >= 1 {
            self.reporter
                .note(&format!("health check failed ({}): {}", kind.as_str(), message));
        }
    }

    /// Checked after every test-function call. Spec.md §4.4, "Exit".
    fn check_budgets(&mut self) -> RunResult<()> {
        if self.settings.timeout_ms > 0 {
            let elapsed_ms = self.start_time.elapsed().as_millis() as u64;
            if elapsed_ms > self.settings.timeout_ms {
                return Err(self.exit_with(ExitReason::Timeout));
            }
        }
        if self.shrinks >= MAX_SHRINKS {
            return Err(self.exit_with(ExitReason::MaxShrinks));
        }
        if self.interesting_examples.is_empty() {
            if self.valid_examples >= self.settings.max_examples {
                return Err(self.exit_with(ExitReason::MaxExamples));
            }
            if self.call_count >= self.settings.max_iterations() as u64 {
                return Err(self.exit_with(ExitReason::MaxIterations));
            }
        }
        if self.tree.is_root_dead() {
            return Err(self.exit_with(ExitReason::Finished));
        }
        Ok(())
    }

    /// Execute `test_fn` once against a freshly built `TestData`, then feed
    /// the result back into every subsystem that cares (tree, selector,
    /// health, interesting table), and check budgets.
    fn run_one(
        &mut self,
        test_fn: &mut dyn FnMut(&mut TestData) -> crate::errors::TestCaseResult,
        source: ByteSource,
    ) -> RunResult<SharedData> {
        self.check_hung_test();
        let testcounter = self.call_count;
        let data = TestData::new(self.settings.cap(), MAX_DEPTH, testcounter, source);
        let shared = self.execute(test_fn, data);
        self.record(shared.clone());
        self.check_budgets()?;
        Ok(shared)
    }

    /// C6, spec.md §4.1's `cached_test_function`: if `buffer`'s path
    /// already reaches a stored leaf, return it without invoking
    /// `test_fn` or touching `call_count`; otherwise run it fresh via
    /// `run_one`.
    fn cached_test_function(
        &mut self,
        test_fn: &mut dyn FnMut(&mut TestData) -> crate::errors::TestCaseResult,
        buffer: Vec<u8>,
    ) -> RunResult<SharedData> {
        if let Some(leaf) = self.tree.cached_leaf(&buffer) {
            return Ok(leaf);
        }
        self.run_one(test_fn, replay_source(buffer))
    }

    fn execute(
        &mut self,
        test_fn: &mut dyn FnMut(&mut TestData) -> crate::errors::TestCaseResult,
        mut data: TestData,
    ) -> SharedData {
        self.call_count += 1;

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| test_fn(&mut data)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(TestCaseError::Reject(_))) => data.mark_invalid(),
            Ok(Err(TestCaseError::Fail(reason))) => {
                data.mark_interesting(InterestingOrigin::from_reason(&reason));
            }
            Err(payload) => {
                data.mark_interesting(InterestingOrigin::new(panic_message(payload)));
            }
        }
        data.freeze();

        self.all_runtimes.push(data.runtime());
        self.all_drawtimes.push(data.total_draw_time());
        self.status_runtimes
            .entry(data.status())
            .or_insert_with(Vec::new)
            .push(data.runtime());
        for event in data.events() {
            *self.event_call_counts.entry(event.clone()).or_insert(0) += 1;
        }

        if self.settings.verbosity >= 2 {
            self.reporter.note(&format!(
                "{} bytes {:?} -> {}, {:?}",
                data.buffer().len(),
                data.buffer(),
                debug_status(data.status()),
                data.events()
            ));
        }

        Rc::new(data)
    }

    /// Feed a completed example into the tree, selector, health monitor,
    /// cache-reset policy, and interesting-examples table.
    fn record(&mut self, data: SharedData) {
        if data.status() != Status::Overrun {
            self.tree.insert(data.clone());
        }

        if data.status() == Status::Interesting {
            self.calls_since_cache_reset = 0;
            self.note_interesting(data.clone());
        } else {
            self.calls_since_cache_reset += 1;
            if self.calls_since_cache_reset >= CACHE_RESET_FREQUENCY && self.interesting_examples.is_empty() {
                self.tree.reset();
                self.calls_since_cache_reset = 0;
            }
        }

        if let Some(health) = &mut self.health {
            if let Some(kind) = health.note(data.status(), data.total_draw_time()) {
                self.fail_health_check(kind, "threshold exceeded in the first few examples");
            }
        }

        if data.status() == Status::Valid {
            self.valid_examples += 1;
        }

        if data.status() != Status::Interesting {
            self.selector.add(data.clone(), &mut self.rng);
        }

        if data.hit_zero_bound() {
            self.zero_bound_queue.push(data);
        }
    }

    fn note_interesting(&mut self, data: SharedData) {
        let origin = data
            .interesting_origin()
            .cloned()
            .expect("interesting data must carry an origin");

        match self.interesting_examples.get(&origin).cloned() {
            None => {
                self.save_to_primary(&data);
                self.interesting_examples.insert(origin, data);
            }
            Some(existing) => {
                if sort_key(data.buffer()) < sort_key(existing.buffer()) {
                    self.downgrade_buffer(&origin, &existing);
                    self.save_to_primary(&data);
                    self.interesting_examples.insert(origin, data);
                }
            }
        }
    }

    fn save_to_primary(&self, data: &SharedData) {
        if let Some(db) = &self.settings.database {
            let keys = DatabaseKeys::new(&self.database_key);
            db.save(keys.primary, data.buffer());
        }
    }

    /// Spec.md §9's open question: advances `shrinks` even though no
    /// shrinker step occurred, matching `engine.py`'s accounting.
    fn downgrade_buffer(&mut self, _origin: &InterestingOrigin, old: &SharedData) {
        if let Some(db) = &self.settings.database {
            let keys = DatabaseKeys::new(&self.database_key);
            db.move_buffer(keys.primary, &keys.secondary, old.buffer());
        }
        self.shrinks += 1;
    }

    // ---- Phase 1: reuse_existing_examples ---------------------------------

    fn reuse_existing_examples(
        &mut self,
        test_fn: &mut dyn FnMut(&mut TestData) -> crate::errors::TestCaseResult,
    ) -> RunResult<()> {
        let database = match self.settings.database.clone() {
            Some(db) => db,
            None => return Ok(()),
        };

        let keys = DatabaseKeys::new(&self.database_key);
        let mut corpus: Vec<Vec<u8>> = Vec::new();
        corpus.extend(database.fetch(keys.primary));
        corpus.extend(database.fetch(&keys.secondary));
        corpus.extend(database.fetch(&keys.covering));
        corpus.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

        let budget = (((self.settings.max_examples as f64) * 0.1).ceil() as usize).max(2);
        corpus.truncate(budget);
        self.used_examples_from_database = !corpus.is_empty();

        for buffer in corpus {
            if !self.tree.prescreen(&buffer) {
                continue;
            }
            self.cached_test_function(test_fn, buffer)?;
        }
        Ok(())
    }

    // ---- Phase 2: generate_new_examples -------------------------------------

    fn generate_new_examples(
        &mut self,
        test_fn: &mut dyn FnMut(&mut TestData) -> crate::errors::TestCaseResult,
    ) -> RunResult<()> {
        let buffer_size = self.settings.buffer_size;
        let cap = self.settings.cap();

        let probe = self.cached_test_function(test_fn, vec![0u8; buffer_size])?;
        if probe.status() == Status::Overrun
            || (probe.status() == Status::Valid && probe.buffer().len() * 2 > buffer_size)
        {
            self.fail_health_check(
                HealthCheckKind::LargeBaseExample,
                "the all-zero base example overran or consumed more than half the buffer",
            );
        }
        let checked = cap.min(probe.buffer().len());
        if (0..checked).all(|i| probe.forced_indices().contains(&i)) {
            return Err(self.exit_with(ExitReason::Finished));
        }

        self.health = Some(HealthMonitor::new());

        let mut count = 0u32;
        let mut mutator: Option<Rc<RefCell<Mutator>>> = None;
        let mut mutations = 0u32;

        loop {
            let pure_generation =
                count < MIN_PURE_GENERATION_EXAMPLES || self.health.as_ref().map_or(false, |h| h.is_active());

            let data = if pure_generation {
                count += 1;
                self.run_pure_generation(test_fn)?
            } else if let Some(entry) = self.zero_bound_queue.pop() {
                self.run_zero_bound_redistribution(test_fn, entry)?
            } else if self.selector.is_empty() {
                // Nothing to mutate from yet; keep generating until the
                // selector has at least one candidate.
                count += 1;
                self.run_pure_generation(test_fn)?
            } else {
                if mutator.is_none() || mutations >= MUTATIONS_PER_ORIGIN {
                    let origin = self.selector.select(&mut self.rng);
                    mutator = Some(Rc::new(RefCell::new(Mutator::new(
                        origin,
                        &self.tree,
                        &mut self.rng,
                    ))));
                    mutations = 0;
                } else {
                    let origin = self.selector.select(&mut self.rng);
                    mutator
                        .as_ref()
                        .unwrap()
                        .borrow_mut()
                        .retarget(origin, &self.tree, &mut self.rng);
                }
                let m = mutator.as_ref().unwrap().clone();
                let origin_status = m.borrow().origin().status();
                let source = mutator_source(m.clone());
                let data = self.run_one(test_fn, source)?;

                if data.status() > origin_status {
                    mutations = 0;
                } else if data.status() < origin_status || mutations >= MUTATIONS_PER_ORIGIN {
                    mutator = None;
                }
                mutations += 1;
                data
            };

            if data.status() == Status::Interesting {
                return Ok(());
            }
        }
    }

    fn run_pure_generation(
        &mut self,
        test_fn: &mut dyn FnMut(&mut TestData) -> crate::errors::TestCaseResult,
    ) -> RunResult<SharedData> {
        let prefix = self.tree.generate_novel_prefix(&mut self.rng);
        let stream = self.rng.gen_rng();
        self.run_one(test_fn, prefix_then_random_source(prefix, stream))
    }

    fn run_zero_bound_redistribution(
        &mut self,
        test_fn: &mut dyn FnMut(&mut TestData) -> crate::errors::TestCaseResult,
        entry: SharedData,
    ) -> RunResult<SharedData> {
        let mut shuffled = entry.buffer().to_vec();
        shuffle(&mut shuffled, &mut self.rng);
        self.run_one(test_fn, replay_source(shuffled))
    }

    // ---- Phase 3: shrink_interesting_examples -------------------------------

    fn shrink_interesting_examples(
        &mut self,
        test_fn: &mut dyn FnMut(&mut TestData) -> crate::errors::TestCaseResult,
    ) -> RunResult<()> {
        self.clear_secondary_key(test_fn)?;

        loop {
            let next = self
                .interesting_examples
                .iter()
                .find(|(origin, _)| !self.shrunk_examples.contains(*origin))
                .map(|(origin, data)| (origin.clone(), data.clone()));

            let (origin, example) = match next {
                Some(pair) => pair,
                None => break,
            };

            if !self.confirm_still_interesting(test_fn, &origin, example.buffer())? {
                return Err(self.exit_with(ExitReason::Flaky));
            }

            let cap = self.settings.cap();
            let call_count = &mut self.call_count;

            let mut run = |d: &mut TestData| {
                *call_count += 1;
                let _ = test_fn(d);
            };
            let mut shrinker = Shrinker::new(example, &origin, cap, MAX_DEPTH, &mut run);
            shrinker.shrink();
            let shrinks_done = shrinker.shrinks();
            let final_buffer = shrinker.shrink_target().to_vec();

            self.shrinks += shrinks_done;
            self.replay_final_shrunk_buffer(test_fn, &origin, &final_buffer);
            self.shrunk_examples.insert(origin);
            self.check_budgets()?;
        }

        Ok(())
    }

    /// `engine.py`'s `clear_secondary_key` (SPEC_FULL §3): retry small
    /// entries from the secondary corpus right before shrinking starts,
    /// deleting each as it's consumed.
    fn clear_secondary_key(
        &mut self,
        test_fn: &mut dyn FnMut(&mut TestData) -> crate::errors::TestCaseResult,
    ) -> RunResult<()> {
        let database = match self.settings.database.clone() {
            Some(db) => db,
            None => return Ok(()),
        };
        let keys = DatabaseKeys::new(&self.database_key);
        let mut entries = database.fetch(&keys.secondary);
        entries.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

        for buffer in entries {
            if !self.tree.prescreen(&buffer) {
                continue;
            }
            self.cached_test_function(test_fn, buffer.clone())?;
            database.delete(&keys.secondary, &buffer);
        }
        Ok(())
    }

    fn confirm_still_interesting(
        &mut self,
        test_fn: &mut dyn FnMut(&mut TestData) -> crate::errors::TestCaseResult,
        origin: &InterestingOrigin,
        buffer: &[u8],
    ) -> RunResult<bool> {
        let data = self.run_one(test_fn, replay_source(buffer.to_vec()))?;
        Ok(data.status() == Status::Interesting && data.interesting_origin() == Some(origin))
    }

    fn replay_final_shrunk_buffer(
        &mut self,
        test_fn: &mut dyn FnMut(&mut TestData) -> crate::errors::TestCaseResult,
        origin: &InterestingOrigin,
        buffer: &[u8],
    ) {
        if let Ok(data) = self.run_one(test_fn, replay_source(buffer.to_vec())) {
            if data.status() == Status::Interesting && data.interesting_origin() == Some(origin) {
                self.note_interesting(data);
            }
        }
    }
}

fn shuffle(buffer: &mut [u8], rng: &mut TestRng) {
    for i in (1..buffer.len()).rev() {
        let j = rng.gen_range(0, (i + 1) as u32) as usize;
        buffer.swap(i, j);
    }
}

fn debug_status(status: Status) -> &'static str {
    match status {
        Status::Overrun => "overrun",
        Status::Invalid => "invalid",
        Status::Valid => "valid",
        Status::Interesting => "interesting",
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|payload| payload.downcast::<String>().map(|s| *s))
        .unwrap_or_else(|_| "<unknown panic value>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryDatabase;
    use crate::errors::TestCaseError;
    use crate::reporting::NullReporter;
    use std::sync::Arc;

    fn engine(settings: Settings) -> Engine {
        Engine::with_seed(settings, b"test".to_vec(), Rc::new(NullReporter), [1; 32])
    }

    #[test]
    fn s1_degenerate_singleton_language() {
        let settings = Settings::with_max_examples(50);
        let mut e = engine(settings);
        let reason = e.run(|_data| Ok(()));
        assert_eq!(ExitReason::Finished, reason);
        assert_eq!(1, e.call_count());
        assert!(e.interesting_examples().is_empty());
    }

    #[test]
    fn s2_immediate_failure() {
        let settings = Settings::with_max_examples(50);
        let mut e = engine(settings);
        let reason = e.run(|data| {
            let bytes = data.draw_bytes(1);
            if bytes[0] == 0 {
                Err(TestCaseError::fail("always fails on zero"))
            } else {
                Ok(())
            }
        });
        assert_eq!(ExitReason::Finished, reason);
        assert_eq!(1, e.interesting_examples().len());
    }

    #[test]
    fn s3_tree_exhaustion() {
        let settings = Settings::with_max_examples(10_000);
        let mut e = engine(settings);
        let reason = e.run(|data| {
            data.draw_bytes(1);
            Ok(())
        });
        assert_eq!(ExitReason::Finished, reason);
        assert!(e.call_count() <= 300, "call_count = {}", e.call_count());
    }

    #[test]
    fn s4_max_examples_budget() {
        let settings = Settings::with_max_examples(50);
        let mut e = engine(settings);
        let reason = e.run(|data| {
            data.draw_bytes(2);
            Ok(())
        });
        assert_eq!(ExitReason::MaxExamples, reason);
        assert_eq!(50, e.valid_examples());
    }

    #[test]
    fn s6_health_filter_too_much() {
        let settings = Settings::with_max_examples(1000);
        let mut e = engine(settings);
        e.run(|data| {
            data.draw_bytes(4);
            Err(TestCaseError::reject("never valid"))
        });
        // Not asserted directly (health checks go through the Reporter,
        // which is a NullReporter here); the run must still terminate.
        assert!(e.call_count() > 0);
    }

    #[test]
    fn database_persists_interesting_buffers() {
        let db = Arc::new(InMemoryDatabase::default());
        let mut settings = Settings::with_max_examples(200);
        settings.database = Some(db.clone());
        let mut e = engine(settings);
        e.run(|data| {
            let b = data.draw_bytes(1);
            if b[0] > 250 {
                Err(TestCaseError::fail("big byte"))
            } else {
                Ok(())
            }
        });
        if !e.interesting_examples().is_empty() {
            assert!(!db.fetch(b"test").is_empty());
        }
    }

    #[test]
    fn determinism_same_seed_same_outcome() {
        let run = || {
            let settings = Settings::with_max_examples(30);
            let mut e = engine(settings);
            e.run(|data| {
                let b = data.draw_bytes(3);
                if b == [1, 2, 3] {
                    Err(TestCaseError::fail("match"))
                } else {
                    Ok(())
                }
            });
            (e.call_count(), e.valid_examples())
        };
        assert_eq!(run(), run());
    }
}
