//-
// Copyright 2017, 2018, 2019 The proptest developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Modifications: adapted from proptest's `Config` (number-of-cases /
// rejection-budget knobs for a `Strategy`-based runner) into `Settings`
// for the byte-stream conjecture engine (example/iteration/shrink budgets,
// buffer size, phase selection).

use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::database::Database;
use crate::rng::RngAlgorithm;

bitflags::bitflags! {
    /// Which phases of a run are enabled.
    ///
    /// Corresponds to spec.md's `phases` settings field: a subset of
    /// `{reuse, generate, shrink}`. All three are enabled by default.
    pub struct Phases: u8 {
        /// Replay buffers from the database before generating new ones.
        const REUSE = 0b001;
        /// Generate and mutate novel buffers.
        const GENERATE = 0b010;
        /// Minimize interesting buffers found during generation.
        const SHRINK = 0b100;
    }
}

impl Default for Phases {
    fn default() -> Self {
        Phases::REUSE | Phases::GENERATE | Phases::SHRINK
    }
}

const MAX_EXAMPLES: &str = "CONJECTURE_MAX_EXAMPLES";
const BUFFER_SIZE: &str = "CONJECTURE_BUFFER_SIZE";
const TIMEOUT: &str = "CONJECTURE_TIMEOUT";
const VERBOSE: &str = "CONJECTURE_VERBOSE";
const RNG_ALGORITHM: &str = "CONJECTURE_RNG_ALGORITHM";

fn parse_or_warn<T: FromStr + fmt::Display>(
    src: &str,
    dst: &mut T,
    typ: &str,
    var: &str,
) {
    match src.parse() {
        Ok(value) => *dst = value,
        Err(_) => {
            eprintln!(
                "conjecture-engine: the env-var {}={} can't be parsed as {}, \
                 using default of {}.",
                var, src, typ, *dst
            );
        }
    }
}

fn contextualize(mut result: Settings) -> Settings {
    for (var, value) in env::vars() {
        match var.as_str() {
            MAX_EXAMPLES => {
                parse_or_warn(&value, &mut result.max_examples, "u32", MAX_EXAMPLES)
            }
            BUFFER_SIZE => {
                parse_or_warn(&value, &mut result.buffer_size, "usize", BUFFER_SIZE)
            }
            TIMEOUT => parse_or_warn(&value, &mut result.timeout_ms, "u64", TIMEOUT),
            VERBOSE => {
                parse_or_warn(&value, &mut result.verbosity, "u32", VERBOSE)
            }
            RNG_ALGORITHM => parse_or_warn(
                &value,
                &mut result.rng_algorithm,
                "RngAlgorithm",
                RNG_ALGORITHM,
            ),
            _ => {
                if var.starts_with("CONJECTURE_") {
                    eprintln!(
                        "conjecture-engine: ignoring unknown env-var {}.",
                        var
                    );
                }
            }
        }
    }
    result
}

fn default_default_settings() -> Settings {
    Settings {
        max_examples: 100,
        buffer_size: 8 * 1024,
        timeout_ms: 0,
        phases: Phases::default(),
        verbosity: 0,
        rng_algorithm: RngAlgorithm::default(),
        database: None,
    }
}

lazy_static::lazy_static! {
    static ref DEFAULT_SETTINGS: Settings =
        contextualize(default_default_settings());
}

/// Configuration for how an `Engine` should run.
///
/// Mirrors the teacher's `Config`: plain public fields, a `Default` built
/// from environment-variable overrides, and `with_*` convenience
/// constructors for the common single-field overrides.
#[derive(Clone)]
pub struct Settings {
    /// The number of `Status::Valid` examples that must be generated before
    /// the generation phase gives up (absent an earlier bug or tree
    /// exhaustion).
    ///
    /// Default 100, overridable with `CONJECTURE_MAX_EXAMPLES`.
    pub max_examples: u32,

    /// The number of bytes made available to the test function per example.
    /// `cap = buffer_size / 2`; see spec.md §3.
    ///
    /// Default 8192, overridable with `CONJECTURE_BUFFER_SIZE`.
    pub buffer_size: usize,

    /// Wall-clock budget for the whole run, in milliseconds. `0` disables
    /// the timeout.
    ///
    /// Default 0, overridable with `CONJECTURE_TIMEOUT`.
    pub timeout_ms: u64,

    /// Which phases to run.
    pub phases: Phases,

    /// 0 = silent, 1 = report failures, 2 = trace every test case.
    ///
    /// Default 0, overridable with `CONJECTURE_VERBOSE`.
    pub verbosity: u32,

    /// Which PRNG algorithm backs the engine, when no explicit `TestRng` is
    /// supplied to `Engine::new`.
    ///
    /// Default `xs` (`RngAlgorithm::XorShift`), overridable with
    /// `CONJECTURE_RNG_ALGORITHM` (`xs` or `cc`).
    pub rng_algorithm: RngAlgorithm,

    /// The persistence backend, if any. `None` disables the `reuse` phase
    /// and all corpus saving regardless of `phases`.
    pub database: Option<Arc<dyn Database>>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Settings")
            .field("max_examples", &self.max_examples)
            .field("buffer_size", &self.buffer_size)
            .field("timeout_ms", &self.timeout_ms)
            .field("phases", &self.phases)
            .field("verbosity", &self.verbosity)
            .field("rng_algorithm", &self.rng_algorithm)
            .field("database", &self.database.is_some())
            .finish()
    }
}

impl Settings {
    /// A `Settings` differing from the default only in `max_examples`.
    pub fn with_max_examples(max_examples: u32) -> Self {
        Self {
            max_examples,
            ..Settings::default()
        }
    }

    /// A `Settings` differing from the default only in `buffer_size`.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            ..Settings::default()
        }
    }

    /// The zero-bound cap: positions at or past this index are forced to
    /// zero (spec.md §3, "Cap").
    pub fn cap(&self) -> usize {
        self.buffer_size / 2
    }

    /// The iteration budget used by the `max_iterations` exit check.
    pub fn max_iterations(&self) -> u32 {
        (self.max_examples.saturating_mul(10)).max(1000)
    }
}

impl Default for Settings {
    fn default() -> Self {
        DEFAULT_SETTINGS.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_is_half_buffer_size() {
        let s = Settings::with_buffer_size(100);
        assert_eq!(50, s.cap());
    }

    #[test]
    fn max_iterations_has_a_floor() {
        let s = Settings::with_max_examples(1);
        assert_eq!(1000, s.max_iterations());
        let s = Settings::with_max_examples(500);
        assert_eq!(5000, s.max_iterations());
    }

    #[test]
    fn default_phases_run_everything() {
        let p = Phases::default();
        assert!(p.contains(Phases::REUSE));
        assert!(p.contains(Phases::GENERATE));
        assert!(p.contains(Phases::SHRINK));
    }
}
