//-
// Copyright 2017, 2018, 2019 The proptest developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Modifications: an integration-test counterpart to the `#[cfg(test)]`
// modules colocated with each source file, exercising the boundary
// scenarios S1-S6 end to end against the real `Engine` rather than a
// single subsystem.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use conjecture_engine::{
    Database, Engine, ExitReason, InMemoryDatabase, Reporter, Settings, Status, TestCaseError,
};

fn engine(settings: Settings) -> Engine {
    Engine::with_seed(settings, b"boundary-scenarios".to_vec(), Rc::new(conjecture_engine::NullReporter), [42; 32])
}

/// S1: a test function that consumes zero bytes and always succeeds.
#[test]
fn s1_degenerate_singleton_language_finishes_after_one_call() {
    let mut e = engine(Settings::with_max_examples(100));
    let reason = e.run(|_data| Ok(()));

    assert_eq!(ExitReason::Finished, reason);
    assert_eq!(1, e.call_count());
    assert!(e.interesting_examples().is_empty());
}

/// S2: a test function that is interesting exactly when the first byte is
/// zero. The generation phase must find it, and the shrink phase must
/// confirm it and finish normally with a minimal (one-byte, all-zero)
/// counterexample.
#[test]
fn s2_immediate_failure_shrinks_to_a_single_zero_byte() {
    let mut e = engine(Settings::with_max_examples(200));
    let reason = e.run(|data| {
        let b = data.draw_bytes(1);
        if b[0] == 0 {
            Err(TestCaseError::fail("zero byte"))
        } else {
            Ok(())
        }
    });

    assert_eq!(ExitReason::Finished, reason);
    assert_eq!(1, e.interesting_examples().len());
    let (_, example) = e.interesting_examples().iter().next().unwrap();
    assert_eq!(&[0u8][..], example.buffer());
}

/// S3: a test function reading exactly one byte and accepting all 256
/// values exhausts the tree in at most 256 calls.
#[test]
fn s3_tree_exhaustion_over_a_one_byte_alphabet() {
    let mut e = engine(Settings::with_max_examples(10_000));
    let reason = e.run(|data| {
        data.draw_bytes(1);
        Ok(())
    });

    assert_eq!(ExitReason::Finished, reason);
    assert!(e.call_count() <= 300, "call_count = {}", e.call_count());
    assert_eq!(256, e.valid_examples());
}

/// S4: a non-exhaustible two-byte-consuming test function hits the
/// `max_examples` budget exactly.
#[test]
fn s4_max_examples_budget_is_enforced() {
    let mut e = engine(Settings::with_max_examples(50));
    let reason = e.run(|data| {
        data.draw_bytes(2);
        Ok(())
    });

    assert_eq!(ExitReason::MaxExamples, reason);
    assert_eq!(50, e.valid_examples());
}

/// S5: a test function that is interesting for a given buffer exactly
/// once, then valid forever after. The shrink phase's confirmation replay
/// must disagree with the buffer recorded during generation, so the run
/// exits `flaky` rather than `finished`.
#[test]
fn s5_flaky_replay_is_detected_during_shrink_confirmation() {
    let mut e = engine(Settings::with_max_examples(200));
    let already_failed = Cell::new(false);

    let reason = e.run(|data| {
        let b = data.draw_bytes(1);
        if b[0] == 0 && !already_failed.get() {
            already_failed.set(true);
            Err(TestCaseError::fail("only fails the first time"))
        } else {
            Ok(())
        }
    });

    assert_eq!(ExitReason::Flaky, reason);
}

/// S6: a test function that rejects every input never reaches `Valid`, so
/// the health monitor's `filter_too_much` threshold (50 invalid examples)
/// fires during the generation phase.
#[test]
fn s6_health_filter_too_much_fires_and_run_still_terminates() {
    #[derive(Debug, Default)]
    struct CapturingReporter(RefCell<Vec<String>>);

    impl Reporter for CapturingReporter {
        fn note(&self, message: &str) {
            self.0.borrow_mut().push(message.to_string());
        }
    }

    let reporter = Rc::new(CapturingReporter::default());
    let mut settings = Settings::with_max_examples(1000);
    settings.verbosity = 1;
    let mut e = Engine::with_seed(settings, b"s6".to_vec(), reporter.clone(), [7; 32]);

    let reason = e.run(|data| {
        data.draw_bytes(4);
        Err(TestCaseError::reject("never valid"))
    });

    assert!(matches!(
        reason,
        ExitReason::Finished | ExitReason::MaxIterations | ExitReason::MaxExamples
    ));
    assert!(
        reporter
            .0
            .borrow()
            .iter()
            .any(|line| line.contains("filter_too_much")),
        "expected a filter_too_much health check to have fired, got: {:?}",
        reporter.0.borrow()
    );
}

/// A run that finds a bug persists the minimized buffer to the primary
/// database key, and a second run against the same key reuses it rather
/// than rediscovering it from scratch (spec.md §4.4's `reuse` phase).
#[test]
fn interesting_examples_round_trip_through_the_database() {
    let db = Arc::new(InMemoryDatabase::default());

    let mut first_settings = Settings::with_max_examples(300);
    first_settings.database = Some(db.clone() as Arc<dyn Database>);
    let mut first = engine(first_settings);
    first.run(|data| {
        let b = data.draw_bytes(1);
        if b[0] == 13 {
            Err(TestCaseError::fail("unlucky"))
        } else {
            Ok(())
        }
    });

    assert_eq!(1, first.interesting_examples().len());
    assert!(!db.fetch(b"boundary-scenarios").is_empty());

    let mut second_settings = Settings::with_max_examples(300);
    second_settings.database = Some(db.clone() as Arc<dyn Database>);
    let mut second = engine(second_settings);
    second.run(|data| {
        let b = data.draw_bytes(1);
        if b[0] == 13 {
            Err(TestCaseError::fail("unlucky"))
        } else {
            Ok(())
        }
    });

    assert!(second.used_examples_from_database());
    assert_eq!(1, second.interesting_examples().len());
}

/// Determinism (spec.md §8, property 8): fixing the seed, settings, and
/// test function yields a bit-identical outcome across independent runs.
#[test]
fn determinism_holds_across_independent_runs() {
    fn run_once() -> (u64, u32, usize) {
        let mut e = engine(Settings::with_max_examples(120));
        e.run(|data| {
            let b = data.draw_bytes(3);
            if b == [5, 6, 7] {
                Err(TestCaseError::fail("triple match"))
            } else {
                Ok(())
            }
        });
        (e.call_count(), e.valid_examples(), e.interesting_examples().len())
    }

    assert_eq!(run_once(), run_once());
}

/// Status ordering end to end: a run that never finds a bug only ever
/// records `Valid`/`Invalid`/`Overrun` statuses, never `Interesting`.
#[test]
fn status_never_reaches_interesting_without_a_matching_input() {
    let mut e = engine(Settings::with_max_examples(40));
    e.run(|data| {
        data.draw_bytes(1);
        Ok(())
    });

    assert!(e.interesting_examples().is_empty());
    for (status, _) in e.status_runtimes() {
        assert_ne!(&Status::Interesting, status);
    }
}
