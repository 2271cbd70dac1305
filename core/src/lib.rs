#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the tile logic verifier.
//!
//! This crate defines the immutable description of a circuit template and the
//! message surface that connects tile behaviours to the simulation state. Tile
//! behaviours inspect read-only views and respond with [`Command`] values, the
//! world applies those commands through its `apply` entry point and reports
//! the resulting [`Event`] values back to the scheduler and any observers.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of tile types that may appear in a template grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    /// Empty space that never participates in propagation.
    Air,
    /// Signal carrier that must rest on a supporting block.
    Wire,
    /// Logic NOT gate controlled through an adjacent block.
    Inverter,
    /// External driver fed from the truth-table inputs.
    Input,
    /// External probe compared against the truth-table outputs.
    Output,
    /// Static support that also conducts power into inverters.
    Block,
}

impl TileKind {
    /// Every tile kind in ascending identifier order.
    pub const ALL: [TileKind; 6] = [
        Self::Air,
        Self::Wire,
        Self::Inverter,
        Self::Input,
        Self::Output,
        Self::Block,
    ];

    /// Resolves the numeric identifier used by the template text format.
    #[must_use]
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Air),
            1 => Some(Self::Wire),
            2 => Some(Self::Inverter),
            4 => Some(Self::Input),
            5 => Some(Self::Output),
            6 => Some(Self::Block),
            _ => None,
        }
    }

    /// Numeric identifier used by the template text format.
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::Air => 0,
            Self::Wire => 1,
            Self::Inverter => 2,
            Self::Input => 4,
            Self::Output => 5,
            Self::Block => 6,
        }
    }

    /// Build cost of a single tile of this kind.
    #[must_use]
    pub const fn cost(self) -> u32 {
        match self {
            Self::Air | Self::Input | Self::Output => 0,
            Self::Block => 1,
            Self::Wire => 2,
            Self::Inverter => 3,
        }
    }

    /// Number of ticks added when a task is scheduled toward a tile of this kind.
    ///
    /// Every shipped kind propagates within the tick it was triggered in.
    #[must_use]
    pub const fn delay(self) -> u64 {
        match self {
            Self::Air | Self::Wire | Self::Inverter | Self::Input | Self::Output | Self::Block => 0,
        }
    }
}

/// Cardinal directions on the grid. Rows grow toward the south.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Toward decreasing row indices.
    North,
    /// Toward increasing column indices.
    East,
    /// Toward increasing row indices.
    South,
    /// Toward decreasing column indices.
    West,
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column().abs_diff(other.column()) + self.row().abs_diff(other.row())
    }

    /// Cell one step away in the provided direction, if representable.
    ///
    /// Only underflow is rejected here; grid bounds are enforced by [`TileGrid`].
    #[must_use]
    pub fn step(self, direction: Direction) -> Option<CellCoord> {
        match direction {
            Direction::North => Some(Self::new(self.column, self.row.checked_sub(1)?)),
            Direction::East => Some(Self::new(self.column.checked_add(1)?, self.row)),
            Direction::South => Some(Self::new(self.column, self.row.checked_add(1)?)),
            Direction::West => Some(Self::new(self.column.checked_sub(1)?, self.row)),
        }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}

/// One placed tile: its kind, auxiliary data value and grid position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileInstance {
    kind: TileKind,
    data: u8,
    cell: CellCoord,
}

impl TileInstance {
    /// Creates a tile instance anchored at the provided cell.
    #[must_use]
    pub const fn new(kind: TileKind, data: u8, cell: CellCoord) -> Self {
        Self { kind, data, cell }
    }

    /// Kind of the tile.
    #[must_use]
    pub const fn kind(&self) -> TileKind {
        self.kind
    }

    /// Auxiliary data value; a truth-table index for inputs and outputs.
    #[must_use]
    pub const fn data(&self) -> u8 {
        self.data
    }

    /// Cell occupied by the tile.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        self.cell
    }
}

/// Tiles surrounding a cell. Positions outside the grid are `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Neighbors {
    // Clockwise from north: N, NE, E, SE, S, SW, W, NW.
    ring: [Option<TileInstance>; 8],
}

impl Neighbors {
    /// Tile directly adjacent in the provided direction.
    #[must_use]
    pub const fn side(&self, direction: Direction) -> Option<TileInstance> {
        match direction {
            Direction::North => self.ring[0],
            Direction::East => self.ring[2],
            Direction::South => self.ring[4],
            Direction::West => self.ring[6],
        }
    }

    /// Tiles sharing the centre's row, west first.
    pub fn level(&self) -> impl Iterator<Item = TileInstance> + '_ {
        [self.ring[6], self.ring[2]].into_iter().flatten()
    }

    /// All in-bounds tiles including diagonals, clockwise from north.
    pub fn ring(&self) -> impl Iterator<Item = TileInstance> + '_ {
        self.ring.iter().copied().flatten()
    }
}

/// One row of a truth table.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Truth {
    inputs: Vec<bool>,
    outputs: Vec<bool>,
}

impl Truth {
    /// Creates a truth row from its input and expected output bits.
    #[must_use]
    pub fn new(inputs: Vec<bool>, outputs: Vec<bool>) -> Self {
        Self { inputs, outputs }
    }

    /// Input bits in declaration order.
    #[must_use]
    pub fn inputs(&self) -> &[bool] {
        &self.inputs
    }

    /// Expected output bits in declaration order.
    #[must_use]
    pub fn outputs(&self) -> &[bool] {
        &self.outputs
    }

    /// Input bit at the provided index, if present.
    #[must_use]
    pub fn input(&self, index: u8) -> Option<bool> {
        self.inputs.get(usize::from(index)).copied()
    }

    /// Expected output bit at the provided index, if present.
    #[must_use]
    pub fn output(&self, index: u8) -> Option<bool> {
        self.outputs.get(usize::from(index)).copied()
    }
}

/// Rectangular, row-major grid of tiles.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TileGrid {
    columns: u32,
    rows: u32,
    tiles: Vec<TileInstance>,
}

impl TileGrid {
    /// Builds a grid from rows of `(kind, data)` pairs.
    ///
    /// Every row must have the same length as the first one.
    pub fn from_rows(rows: Vec<Vec<(TileKind, u8)>>) -> Result<Self, TemplateError> {
        let expected = rows.first().map_or(0, Vec::len);
        let columns = u32::try_from(expected).map_err(|_| TemplateError::TooLarge)?;
        let row_count = u32::try_from(rows.len()).map_err(|_| TemplateError::TooLarge)?;

        let mut tiles = Vec::with_capacity(expected.saturating_mul(rows.len()));
        for ((row_index, row), row_coord) in rows.into_iter().enumerate().zip(0..row_count) {
            if row.len() != expected {
                return Err(TemplateError::RaggedRow {
                    row: row_index,
                    expected,
                    found: row.len(),
                });
            }
            for ((kind, data), column) in row.into_iter().zip(0..columns) {
                tiles.push(TileInstance::new(kind, data, CellCoord::new(column, row_coord)));
            }
        }

        Ok(Self {
            columns,
            rows: row_count,
            tiles,
        })
    }

    /// Number of columns contained in the grid.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows contained in the grid.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of cells in the grid.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Reports whether the grid has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Dense row-major index of the cell, if it lies inside the grid.
    #[must_use]
    pub fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.column() < self.columns && cell.row() < self.rows {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }

    /// Tile at the provided cell, if it lies inside the grid.
    #[must_use]
    pub fn tile(&self, cell: CellCoord) -> Option<TileInstance> {
        self.index(cell)
            .and_then(|index| self.tiles.get(index).copied())
    }

    /// Iterator over all tiles in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = TileInstance> + '_ {
        self.tiles.iter().copied()
    }

    /// Captures the neighbourhood surrounding the provided cell.
    #[must_use]
    pub fn neighbors(&self, cell: CellCoord) -> Neighbors {
        let at = |first: Direction, second: Option<Direction>| {
            let mut target = cell.step(first)?;
            if let Some(second) = second {
                target = target.step(second)?;
            }
            self.tile(target)
        };

        Neighbors {
            ring: [
                at(Direction::North, None),
                at(Direction::North, Some(Direction::East)),
                at(Direction::East, None),
                at(Direction::South, Some(Direction::East)),
                at(Direction::South, None),
                at(Direction::South, Some(Direction::West)),
                at(Direction::West, None),
                at(Direction::North, Some(Direction::West)),
            ],
        }
    }

    /// Sum of the build cost of every tile in the grid.
    #[must_use]
    pub fn total_cost(&self) -> u64 {
        self.tiles
            .iter()
            .map(|tile| u64::from(tile.kind().cost()))
            .sum()
    }
}

/// A tile grid paired with the truth table it is expected to implement.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Template {
    grid: TileGrid,
    truths: Vec<Truth>,
}

impl Template {
    /// Pairs a grid with its truth table.
    ///
    /// All truth rows must share the input width and the output width of the
    /// first row.
    pub fn new(grid: TileGrid, truths: Vec<Truth>) -> Result<Self, TemplateError> {
        if let Some(first) = truths.first() {
            let inputs = first.inputs().len();
            let outputs = first.outputs().len();
            for (row, truth) in truths.iter().enumerate() {
                if truth.inputs().len() != inputs {
                    return Err(TemplateError::InputWidthMismatch {
                        row,
                        expected: inputs,
                        found: truth.inputs().len(),
                    });
                }
                if truth.outputs().len() != outputs {
                    return Err(TemplateError::OutputWidthMismatch {
                        row,
                        expected: outputs,
                        found: truth.outputs().len(),
                    });
                }
            }
        }

        Ok(Self { grid, truths })
    }

    /// Grid of placed tiles.
    #[must_use]
    pub const fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Every truth-table row in declaration order.
    #[must_use]
    pub fn truths(&self) -> &[Truth] {
        &self.truths
    }

    /// Truth-table row at the provided index.
    #[must_use]
    pub fn truth(&self, row: usize) -> Option<&Truth> {
        self.truths.get(row)
    }
}

/// Propagation event waiting for its tick to arrive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickTask {
    /// Tile whose behaviour runs when the task fires.
    pub target: TileInstance,
    /// Tile that scheduled the task.
    pub triggered_by: TileInstance,
    /// Tick at which the task fires.
    pub tick: u64,
}

impl TickTask {
    /// Schedules `target` relative to `now`, honouring the target's propagation delay.
    #[must_use]
    pub fn after_delay(target: TileInstance, triggered_by: TileInstance, now: u64) -> Self {
        Self {
            target,
            triggered_by,
            tick: now.saturating_add(target.kind().delay()),
        }
    }
}

/// Commands that express all permissible simulation-state mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Sets the power state of a cell.
    SetPower {
        /// Cell whose state changes.
        cell: CellCoord,
        /// New power state.
        powered: bool,
    },
    /// Queues a propagation task.
    Schedule {
        /// Task to queue.
        task: TickTask,
    },
    /// Flags a tile for validation once the current tick has settled.
    RequestCheck {
        /// Tile to validate.
        tile: TileInstance,
    },
}

/// Events reported by the simulation state after applying commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// A cell's power state changed.
    PowerChanged {
        /// Cell whose state changed.
        cell: CellCoord,
        /// New power state.
        powered: bool,
    },
    /// A task joined the pending queue.
    TaskScheduled {
        /// Task that was queued.
        task: TickTask,
    },
    /// A tile joined the mid-run check set.
    CheckRequested {
        /// Tile that will be validated.
        tile: TileInstance,
    },
}

/// Point in the row simulation at which a validation ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckPhase {
    /// End-of-tick validation of tiles flagged during the tick.
    MidRun {
        /// Tick whose wavefront had just settled.
        tick: u64,
    },
    /// Validation of every tile after the queue drained.
    Final,
}

impl fmt::Display for CheckPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MidRun { tick } => write!(f, "mid-run (tick {tick})"),
            Self::Final => write!(f, "final"),
        }
    }
}

/// Terminal outcome of a failed truth-table row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    /// A tile rejected its surroundings during preprocessing.
    #[error("row {row}: {tile:?} at {cell} is not validly connected")]
    Structural {
        /// Truth-table row being simulated.
        row: usize,
        /// Cell of the offending tile.
        cell: CellCoord,
        /// Kind of the offending tile.
        tile: TileKind,
    },
    /// Simulated state disagreed with the truth table.
    #[error(
        "row {row}: {tile:?} at {cell} failed the {phase} check with power state {observed} (expected {expected:?})"
    )]
    Logical {
        /// Truth-table row being simulated.
        row: usize,
        /// Cell of the offending tile.
        cell: CellCoord,
        /// Kind of the offending tile.
        tile: TileKind,
        /// Validation pass that detected the mismatch.
        phase: CheckPhase,
        /// Simulated power state.
        observed: bool,
        /// Expected state, when the tile reads one from the truth table.
        expected: Option<bool>,
    },
}

impl Failure {
    /// Truth-table row that failed.
    #[must_use]
    pub const fn row(&self) -> usize {
        match self {
            Self::Structural { row, .. } | Self::Logical { row, .. } => *row,
        }
    }

    /// Cell of the tile that caused the failure.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        match self {
            Self::Structural { cell, .. } | Self::Logical { cell, .. } => *cell,
        }
    }
}

/// Configuration errors detected while assembling a template.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A grid row differs in length from the first row.
    #[error("grid row {row} has {found} tiles but the first row has {expected}")]
    RaggedRow {
        /// Zero-based grid row.
        row: usize,
        /// Length of the first row.
        expected: usize,
        /// Length of the offending row.
        found: usize,
    },
    /// A truth row has a different number of inputs than the first row.
    #[error("truth row {row} has {found} inputs but the first row has {expected}")]
    InputWidthMismatch {
        /// Zero-based truth row.
        row: usize,
        /// Input width of the first row.
        expected: usize,
        /// Input width of the offending row.
        found: usize,
    },
    /// A truth row has a different number of outputs than the first row.
    #[error("truth row {row} has {found} outputs but the first row has {expected}")]
    OutputWidthMismatch {
        /// Zero-based truth row.
        row: usize,
        /// Output width of the first row.
        expected: usize,
        /// Output width of the offending row.
        found: usize,
    },
    /// The grid dimensions do not fit the coordinate type.
    #[error("grid dimensions exceed the supported size")]
    TooLarge,
}
