#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Verification driver that checks a template against every truth-table row.
//!
//! Rows are simulated in table order, each from a clean state, and the run
//! stops at the first row that fails.

use std::time::Instant;

use log::info;
use serde::Serialize;
use tilelogic_core::{Failure, Template};
use tilelogic_system_propagation::{Config, Observer, Propagation, RowReport};

/// Reports whether every truth-table row of the template passes under the
/// default configuration.
#[must_use]
pub fn verify(template: &Template) -> bool {
    Verifier::default().run(template, &mut ()).passed()
}

/// Drives the propagation scheduler across all truth-table rows.
#[derive(Debug, Default)]
pub struct Verifier {
    propagation: Propagation,
}

impl Verifier {
    /// Creates a verifier that simulates rows with the provided configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            propagation: Propagation::new(config),
        }
    }

    /// Simulates every row in order, stopping after the first failure.
    pub fn run<O>(&mut self, template: &Template, observer: &mut O) -> VerificationReport
    where
        O: Observer + ?Sized,
    {
        let started = Instant::now();
        let total_cost = template.grid().total_cost();
        let mut rows = Vec::with_capacity(template.truths().len());

        for row in 0..template.truths().len() {
            let Some(report) = self.propagation.run_row(template, row, observer) else {
                break;
            };
            let passed = report.passed();
            rows.push(report);
            if !passed {
                break;
            }
        }

        let report = VerificationReport { rows, total_cost };
        info!(
            "verified {} of {} rows in {} ms: {}",
            report.rows.len(),
            template.truths().len(),
            started.elapsed().as_millis(),
            if report.passed() { "passed" } else { "failed" }
        );
        report
    }
}

/// Outcome of verifying a template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationReport {
    rows: Vec<RowReport>,
    total_cost: u64,
}

impl VerificationReport {
    /// Reports whether every simulated row passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.rows.iter().all(RowReport::passed)
    }

    /// Per-row reports in table order, ending at the first failing row.
    #[must_use]
    pub fn rows(&self) -> &[RowReport] {
        &self.rows
    }

    /// Failure of the first failing row, if any.
    #[must_use]
    pub fn first_failure(&self) -> Option<&Failure> {
        self.rows.iter().find_map(|row| row.outcome.as_ref().err())
    }

    /// Summed placement cost of every tile in the grid.
    #[must_use]
    pub const fn total_cost(&self) -> u64 {
        self.total_cost
    }

    /// Serializable digest of the report.
    #[must_use]
    pub fn summary(&self) -> Summary {
        Summary {
            passed: self.passed(),
            total_cost: self.total_cost,
            failure: self.first_failure().copied(),
            rows: self
                .rows
                .iter()
                .map(|report| RowSummary {
                    row: report.row,
                    passed: report.passed(),
                    ticks: report.ticks,
                    tasks_dispatched: report.tasks_dispatched,
                    last_active_tick: report.last_active_tick,
                })
                .collect(),
        }
    }
}

/// Serializable digest of a [`VerificationReport`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Whether every row passed.
    pub passed: bool,
    /// Summed placement cost of the grid.
    pub total_cost: u64,
    /// First failure encountered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    /// Statistics of every simulated row.
    pub rows: Vec<RowSummary>,
}

/// Per-row statistics within a [`Summary`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RowSummary {
    /// Truth-table row index.
    pub row: usize,
    /// Whether the row passed.
    pub passed: bool,
    /// Ticks elapsed.
    pub ticks: u64,
    /// Tasks dispatched.
    pub tasks_dispatched: usize,
    /// Last tick at which a task fired.
    pub last_active_tick: Option<u64>,
}
