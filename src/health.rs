//-
// Copyright 2017, 2018 The proptest developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Modifications: C5 from spec.md §4.5, the statistical watchdog over the
// first few examples of a run. No analogue in the teacher (proptest has no
// health-check subsystem); thresholds and deactivation rules are taken
// verbatim from spec.md.

use std::time::Duration;

use crate::status::Status;

/// Why a health check fired. Spec.md §4.5 and §7.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HealthCheckKind {
    /// The wall clock exceeded `HUNG_TEST_TIME_LIMIT` mid-run.
    HungTest,
    /// `overrun_examples` reached 20.
    DataTooLarge,
    /// `invalid_examples` reached 50.
    FilterTooMuch,
    /// Cumulative draw time exceeded 1s with fewer than 10 valid examples.
    TooSlow,
    /// The all-zero base example overran, or consumed more than half the
    /// buffer while valid.
    LargeBaseExample,
}

impl HealthCheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthCheckKind::HungTest => "hung_test",
            HealthCheckKind::DataTooLarge => "data_too_large",
            HealthCheckKind::FilterTooMuch => "filter_too_much",
            HealthCheckKind::TooSlow => "too_slow",
            HealthCheckKind::LargeBaseExample => "large_base_example",
        }
    }
}

const OVERRUN_THRESHOLD: u32 = 20;
const INVALID_THRESHOLD: u32 = 50;
const SLOW_DRAW_THRESHOLD: Duration = Duration::from_secs(1);
const SLOW_DRAW_VALID_CEILING: u32 = 10;
const DEACTIVATE_AFTER_VALID: u32 = 10;

/// Accumulates per-status counts and draw times over the first examples of
/// a run, firing health checks when thresholds are crossed. Deactivates
/// itself once enough valid examples have been seen, or as soon as an
/// interesting one is.
#[derive(Default)]
pub struct HealthMonitor {
    active: bool,
    valid_examples: u32,
    invalid_examples: u32,
    overrun_examples: u32,
    total_draw_time: Duration,
}

impl HealthMonitor {
    pub fn new() -> Self {
        HealthMonitor {
            active: true,
            ..Default::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Record one completed example, returning the health check that fired
    /// as a result (if any). Never returns more than one check per call:
    /// spec.md orders overrun/invalid/slow as independent thresholds, each
    /// checked once.
    pub fn note(&mut self, status: Status, draw_time: Duration) -> Option<HealthCheckKind> {
        if !self.active {
            return None;
        }

        match status {
            Status::Valid => self.valid_examples += 1,
            Status::Invalid => self.invalid_examples += 1,
            Status::Overrun => self.overrun_examples += 1,
            Status::Interesting => {
                self.active = false;
                return None;
            }
        }
        self.total_draw_time += draw_time;

        let fired = if self.overrun_examples == OVERRUN_THRESHOLD {
            Some(HealthCheckKind::DataTooLarge)
        } else if self.invalid_examples == INVALID_THRESHOLD {
            Some(HealthCheckKind::FilterTooMuch)
        } else if self.total_draw_time > SLOW_DRAW_THRESHOLD
            && self.valid_examples < SLOW_DRAW_VALID_CEILING
        {
            Some(HealthCheckKind::TooSlow)
        } else {
            None
        };

        if self.valid_examples == DEACTIVATE_AFTER_VALID {
            self.active = false;
        }

        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_too_much_fires_at_fifty() {
        let mut mon = HealthMonitor::new();
        let mut fired = None;
        for _ in 0..50 {
            fired = mon.note(Status::Invalid, Duration::from_millis(0));
        }
        assert_eq!(Some(HealthCheckKind::FilterTooMuch), fired);
    }

    #[test]
    fn data_too_large_fires_at_twenty_overruns() {
        let mut mon = HealthMonitor::new();
        let mut fired = None;
        for _ in 0..20 {
            fired = mon.note(Status::Overrun, Duration::from_millis(0));
        }
        assert_eq!(Some(HealthCheckKind::DataTooLarge), fired);
    }

    #[test]
    fn too_slow_requires_both_conditions() {
        let mut mon = HealthMonitor::new();
        for _ in 0..9 {
            let fired = mon.note(Status::Valid, Duration::from_millis(200));
            assert_eq!(None, fired);
        }
        let fired = mon.note(Status::Invalid, Duration::from_millis(300));
        assert_eq!(Some(HealthCheckKind::TooSlow), fired);
    }

    #[test]
    fn deactivates_after_ten_valid_examples() {
        let mut mon = HealthMonitor::new();
        for _ in 0..10 {
            mon.note(Status::Valid, Duration::from_millis(0));
        }
        assert!(!mon.is_active());
    }

    #[test]
    fn deactivates_immediately_on_interesting() {
        let mut mon = HealthMonitor::new();
        mon.note(Status::Interesting, Duration::from_millis(0));
        assert!(!mon.is_active());
    }
}
