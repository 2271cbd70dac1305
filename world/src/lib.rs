#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative per-row simulation state for the tile logic verifier.
//!
//! A [`SimulationState`] is created for a single truth-table row, mutated only
//! through [`apply`] and the scheduler primitives on the state itself, and
//! dropped once that row's verdict is known.

use std::collections::{BTreeMap, VecDeque};

use indexmap::IndexSet;
use tilelogic_core::{Command, Event, Template, TickTask, TileInstance, Truth};

/// Mutable state of one truth-table row's simulation.
#[derive(Debug)]
pub struct SimulationState<'t> {
    template: &'t Template,
    row: usize,
    truth: &'t Truth,
    power: PowerGrid,
    queue: TaskQueue,
    checks: IndexSet<TileInstance>,
    tick: u64,
}

impl<'t> SimulationState<'t> {
    /// Creates a clean state bound to the provided truth-table row.
    ///
    /// Returns `None` when the template has no such row.
    #[must_use]
    pub fn new(template: &'t Template, row: usize) -> Option<Self> {
        let truth = template.truth(row)?;
        Some(Self {
            template,
            row,
            truth,
            power: PowerGrid::new(template.grid().len()),
            queue: TaskQueue::default(),
            checks: IndexSet::new(),
            tick: 0,
        })
    }

    /// Removes and returns every task due at the current tick, in insertion order.
    ///
    /// Tasks scheduled for the current tick while the returned batch is being
    /// processed are collected by the next call.
    pub fn take_batch(&mut self) -> Vec<TickTask> {
        self.queue
            .take(self.tick)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Removes and returns the tiles flagged for validation during this tick.
    pub fn take_mid_run_checks(&mut self) -> Vec<TileInstance> {
        self.checks.drain(..).collect()
    }

    /// Drops tasks scheduled before the current tick and advances the clock.
    ///
    /// Returns the number of stale tasks that were discarded.
    pub fn advance_tick(&mut self) -> usize {
        let discarded = self.queue.discard_before(self.tick);
        self.checks.clear();
        self.tick = self.tick.saturating_add(1);
        discarded
    }
}

/// Applies the provided command to the state, reporting what changed.
pub fn apply(state: &mut SimulationState<'_>, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::SetPower { cell, powered } => {
            let Some(index) = state.template.grid().index(cell) else {
                return;
            };
            if state.power.set(index, powered) {
                out_events.push(Event::PowerChanged { cell, powered });
            }
        }
        Command::Schedule { task } => {
            state.queue.push(task);
            out_events.push(Event::TaskScheduled { task });
        }
        Command::RequestCheck { tile } => {
            if state.checks.insert(tile) {
                out_events.push(Event::CheckRequested { tile });
            }
        }
    }
}

/// Query functions that provide read-only access to the simulation state.
pub mod query {
    use super::{PowerGrid, SimulationState};
    use tilelogic_core::{CellCoord, Template, TileInstance};

    /// Template being simulated.
    #[must_use]
    pub fn template<'t>(state: &SimulationState<'t>) -> &'t Template {
        state.template
    }

    /// Index of the truth-table row being simulated.
    #[must_use]
    pub fn row(state: &SimulationState<'_>) -> usize {
        state.row
    }

    /// Current tick counter.
    #[must_use]
    pub fn tick(state: &SimulationState<'_>) -> u64 {
        state.tick
    }

    /// Power state of the cell, or `None` outside the grid.
    #[must_use]
    pub fn power(state: &SimulationState<'_>, cell: CellCoord) -> Option<bool> {
        state
            .template
            .grid()
            .index(cell)
            .and_then(|index| state.power.get(index))
    }

    /// Truth-table input bit read by the tile, if its index is in range.
    #[must_use]
    pub fn input_bit(state: &SimulationState<'_>, tile: TileInstance) -> Option<bool> {
        state.truth.input(tile.data())
    }

    /// Expected truth-table output bit for the tile, if its index is in range.
    #[must_use]
    pub fn expected_output(state: &SimulationState<'_>, tile: TileInstance) -> Option<bool> {
        state.truth.output(tile.data())
    }

    /// Number of tasks waiting in the queue, stale ones included.
    #[must_use]
    pub fn pending_tasks(state: &SimulationState<'_>) -> usize {
        state.queue.len()
    }

    /// Reports whether any task is due at the current tick.
    #[must_use]
    pub fn has_current_tasks(state: &SimulationState<'_>) -> bool {
        state.queue.has_tick(state.tick)
    }

    /// Tiles flagged for validation at the end of the current tick.
    pub fn mid_run_checks<'s>(
        state: &'s SimulationState<'_>,
    ) -> impl Iterator<Item = TileInstance> + 's {
        state.checks.iter().copied()
    }

    /// Exposes a read-only view of the power-state grid.
    #[must_use]
    pub fn power_view<'s>(state: &'s SimulationState<'_>) -> PowerView<'s> {
        PowerView {
            grid: &state.power,
            columns: state.template.grid().columns(),
            rows: state.template.grid().rows(),
        }
    }

    /// Read-only view into the dense power-state grid.
    #[derive(Clone, Copy, Debug)]
    pub struct PowerView<'a> {
        grid: &'a PowerGrid,
        columns: u32,
        rows: u32,
    }

    impl PowerView<'_> {
        /// Reports whether the cell at the dense row-major index is powered.
        #[must_use]
        pub fn is_powered(&self, index: usize) -> bool {
            self.grid.get(index).unwrap_or(false)
        }

        /// Captures an owned copy of the current power states.
        #[must_use]
        pub fn snapshot(&self) -> PowerSnapshot {
            PowerSnapshot {
                columns: self.columns,
                rows: self.rows,
                cells: self.grid.cells().to_vec(),
            }
        }
    }

    /// Owned copy of a power-state grid, detached from any simulation.
    #[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PowerSnapshot {
        columns: u32,
        rows: u32,
        cells: Vec<bool>,
    }

    impl PowerSnapshot {
        /// Power state of the cell, or `None` outside the grid.
        #[must_use]
        pub fn is_powered(&self, cell: CellCoord) -> Option<bool> {
            if cell.column() >= self.columns || cell.row() >= self.rows {
                return None;
            }
            let index = usize::try_from(cell.row()).ok()?
                * usize::try_from(self.columns).ok()?
                + usize::try_from(cell.column()).ok()?;
            self.cells.get(index).copied()
        }

        /// Number of powered cells.
        #[must_use]
        pub fn powered_count(&self) -> usize {
            self.cells.iter().filter(|powered| **powered).count()
        }
    }
}

#[derive(Clone, Debug)]
struct PowerGrid {
    cells: Vec<bool>,
}

impl PowerGrid {
    fn new(len: usize) -> Self {
        Self {
            cells: vec![false; len],
        }
    }

    fn get(&self, index: usize) -> Option<bool> {
        self.cells.get(index).copied()
    }

    /// Stores the state, reporting whether it changed.
    fn set(&mut self, index: usize, powered: bool) -> bool {
        match self.cells.get_mut(index) {
            Some(slot) if *slot != powered => {
                *slot = powered;
                true
            }
            _ => false,
        }
    }

    fn cells(&self) -> &[bool] {
        &self.cells
    }
}

/// Pending tasks bucketed by the tick at which they fire.
#[derive(Debug, Default)]
struct TaskQueue {
    buckets: BTreeMap<u64, VecDeque<TickTask>>,
    len: usize,
}

impl TaskQueue {
    fn push(&mut self, task: TickTask) {
        self.buckets.entry(task.tick).or_default().push_back(task);
        self.len += 1;
    }

    fn take(&mut self, tick: u64) -> Option<VecDeque<TickTask>> {
        let bucket = self.buckets.remove(&tick)?;
        self.len -= bucket.len();
        Some(bucket)
    }

    fn has_tick(&self, tick: u64) -> bool {
        self.buckets.get(&tick).is_some_and(|bucket| !bucket.is_empty())
    }

    fn discard_before(&mut self, tick: u64) -> usize {
        let retained = self.buckets.split_off(&tick);
        let stale = std::mem::replace(&mut self.buckets, retained);
        let discarded: usize = stale.values().map(VecDeque::len).sum();
        self.len -= discarded;
        discarded
    }

    fn len(&self) -> usize {
        self.len
    }
}
