#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-row scheduler that drives wavefront propagation across the grid.
//!
//! A row runs through `Preprocessing -> Propagating -> FinalChecking` and ends
//! in `Passed` or `Failed`. While propagating, every task due at the current
//! tick is dispatched, including tasks scheduled for the same tick by that
//! batch, before the mid-run checks run and the tick advances.

use std::time::Instant;

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use tilelogic_core::{CheckPhase, Command, Event, Failure, Template, TickTask, TileInstance, TileKind};
use tilelogic_system_tiles::{Policy, TileBehavior};
use tilelogic_world::{
    apply,
    query::{self, PowerSnapshot, PowerView},
    SimulationState,
};

/// Order in which the tasks of one same-tick batch are dispatched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOrder {
    /// Insertion order.
    #[default]
    Fifo,
    /// Reverse insertion order.
    Lifo,
}

/// Scheduler configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Orientation rules for directional tiles.
    pub policy: Policy,
    /// Dispatch order within a same-tick batch.
    pub batch_order: BatchOrder,
}

/// States of a single row's simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Every tile validates its surroundings and seeds initial signals.
    Preprocessing,
    /// Scheduled tasks are dispatched tick by tick until the queue drains.
    Propagating,
    /// Every tile is validated against the truth-table row.
    FinalChecking,
    /// The row matched its truth-table entry.
    Passed,
    /// The row failed structurally or logically.
    Failed,
}

/// Read-only view handed to observers after each dispatched task.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    /// Template being simulated.
    pub template: &'a Template,
    /// Truth-table row being simulated.
    pub row: usize,
    /// Tick at which the task fired.
    pub tick: u64,
    /// Power states after the task's commands were applied.
    pub power: PowerView<'a>,
    /// Task that was just dispatched.
    pub task: TickTask,
    /// Events caused by the task.
    pub events: &'a [Event],
}

/// Sink for read-only simulation progress, such as a debug renderer.
///
/// Observers cannot influence the simulation; every hook defaults to a no-op.
pub trait Observer {
    /// Called once before a row's preprocess pass.
    fn row_started(&mut self, _row: usize, _template: &Template) {}

    /// Called whenever the row's state machine enters a new phase.
    fn phase_entered(&mut self, _row: usize, _phase: Phase) {}

    /// Called after every dispatched task.
    fn task_dispatched(&mut self, _frame: &Frame<'_>) {}

    /// Called once the row reached `Passed` or `Failed`.
    fn row_finished(&mut self, _report: &RowReport) {}
}

impl Observer for () {}

/// Outcome and statistics of one row's simulation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowReport {
    /// Truth-table row that was simulated.
    pub row: usize,
    /// `Ok` when the row passed, otherwise the terminal failure.
    pub outcome: Result<(), Failure>,
    /// Terminal phase, either `Passed` or `Failed`.
    pub phase: Phase,
    /// Value of the tick counter when the row finished.
    pub ticks: u64,
    /// Number of tasks dispatched while propagating.
    pub tasks_dispatched: usize,
    /// Last tick at which any task fired.
    pub last_active_tick: Option<u64>,
    /// Power states when the row finished.
    pub power: PowerSnapshot,
}

impl RowReport {
    /// Reports whether the row passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug, Default)]
struct RowStats {
    tasks_dispatched: usize,
    last_active_tick: Option<u64>,
}

/// Runs single truth-table rows through the propagation state machine.
#[derive(Debug, Default)]
pub struct Propagation {
    behavior: TileBehavior,
    batch_order: BatchOrder,
    commands: Vec<Command>,
    events: Vec<Event>,
}

impl Propagation {
    /// Creates a scheduler with the provided configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            behavior: TileBehavior::new(config.policy),
            batch_order: config.batch_order,
            commands: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Simulates `row` of the template's truth table from a clean state.
    ///
    /// Returns `None` when the truth table has no such row.
    pub fn run_row<O>(&mut self, template: &Template, row: usize, observer: &mut O) -> Option<RowReport>
    where
        O: Observer + ?Sized,
    {
        let mut state = SimulationState::new(template, row)?;
        observer.row_started(row, template);
        info!("[row {row}] starting simulation");

        let started = Instant::now();
        let mut stats = RowStats::default();
        let mut outcome = Ok(());
        let mut phase = Phase::Preprocessing;

        loop {
            observer.phase_entered(row, phase);
            let phase_started = Instant::now();
            let result = match phase {
                Phase::Preprocessing => self.preprocess(&mut state),
                Phase::Propagating => self.propagate(&mut state, observer, &mut stats),
                Phase::FinalChecking => self.final_check(&state),
                Phase::Passed | Phase::Failed => break,
            };
            info!(
                "[row {row}] finished {phase:?} in {} ms",
                phase_started.elapsed().as_millis()
            );

            phase = match (phase, result) {
                (_, Err(failure)) => {
                    info!("[row {row}] {failure}");
                    outcome = Err(failure);
                    Phase::Failed
                }
                (Phase::Preprocessing, Ok(())) => Phase::Propagating,
                (Phase::Propagating, Ok(())) => Phase::FinalChecking,
                (_, Ok(())) => Phase::Passed,
            };
        }

        info!(
            "[row {row}] finished simulation in {} ms ({phase:?})",
            started.elapsed().as_millis()
        );

        let report = RowReport {
            row,
            outcome,
            phase,
            ticks: query::tick(&state),
            tasks_dispatched: stats.tasks_dispatched,
            last_active_tick: stats.last_active_tick,
            power: query::power_view(&state).snapshot(),
        };
        observer.row_finished(&report);
        Some(report)
    }

    fn preprocess(&mut self, state: &mut SimulationState<'_>) -> Result<(), Failure> {
        let template = query::template(state);
        for tile in template.grid().iter() {
            let neighbors = template.grid().neighbors(tile.cell());
            self.commands.clear();
            if !self
                .behavior
                .preprocess(state, tile, &neighbors, &mut self.commands)
            {
                return Err(Failure::Structural {
                    row: query::row(state),
                    cell: tile.cell(),
                    tile: tile.kind(),
                });
            }
            self.apply_commands(state);
        }
        Ok(())
    }

    fn propagate<O>(
        &mut self,
        state: &mut SimulationState<'_>,
        observer: &mut O,
        stats: &mut RowStats,
    ) -> Result<(), Failure>
    where
        O: Observer + ?Sized,
    {
        let template = query::template(state);
        let row = query::row(state);

        while query::pending_tasks(state) > 0 {
            let tick = query::tick(state);
            let mut dispatched = 0_usize;

            while query::has_current_tasks(state) {
                let mut batch = state.take_batch();
                if self.batch_order == BatchOrder::Lifo {
                    batch.reverse();
                }

                for task in batch {
                    let neighbors = template.grid().neighbors(task.target.cell());
                    self.commands.clear();
                    self.behavior.on_tick(
                        state,
                        task.target,
                        task.triggered_by,
                        &neighbors,
                        &mut self.commands,
                    );
                    self.apply_commands(state);
                    dispatched += 1;

                    observer.task_dispatched(&Frame {
                        template,
                        row,
                        tick,
                        power: query::power_view(state),
                        task,
                        events: &self.events,
                    });
                }
            }

            if dispatched > 0 {
                stats.tasks_dispatched += dispatched;
                stats.last_active_tick = Some(tick);
            }
            debug!("[row {row}] tick {tick}: dispatched {dispatched} tasks");

            for tile in state.take_mid_run_checks() {
                if !self.behavior.check_pass(state, tile) {
                    return Err(logical_failure(state, tile, CheckPhase::MidRun { tick }));
                }
            }

            let discarded = state.advance_tick();
            if discarded > 0 {
                warn!("[row {row}] discarded {discarded} stale tasks at tick {tick}");
            }
        }

        Ok(())
    }

    fn final_check(&self, state: &SimulationState<'_>) -> Result<(), Failure> {
        let template = query::template(state);
        match template
            .grid()
            .iter()
            .find(|tile| !self.behavior.check_pass(state, *tile))
        {
            Some(tile) => Err(logical_failure(state, tile, CheckPhase::Final)),
            None => Ok(()),
        }
    }

    fn apply_commands(&mut self, state: &mut SimulationState<'_>) {
        self.events.clear();
        for command in self.commands.drain(..) {
            apply(state, command, &mut self.events);
        }
        for event in &self.events {
            trace!("[row {}] {event:?}", query::row(state));
        }
    }
}

fn logical_failure(state: &SimulationState<'_>, tile: TileInstance, phase: CheckPhase) -> Failure {
    let expected = match tile.kind() {
        TileKind::Output => query::expected_output(state, tile),
        _ => None,
    };

    Failure::Logical {
        row: query::row(state),
        cell: tile.cell(),
        tile: tile.kind(),
        phase,
        observed: query::power(state, tile.cell()).unwrap_or(false),
        expected,
    }
}
