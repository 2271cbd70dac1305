#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure tile behaviours that react to the simulation state with commands.
//!
//! Each tile kind implements the same three-phase contract: a one-off
//! [`TileBehavior::preprocess`] pass that validates the tile's surroundings and
//! seeds initial signals, [`TileBehavior::on_tick`] for every scheduled task,
//! and [`TileBehavior::check_pass`] during mid-run and final validation.
//! Behaviours never mutate state directly; they emit [`Command`] values that
//! the scheduler applies through the world.

use serde::{Deserialize, Serialize};
use tilelogic_core::{Command, Direction, Neighbors, TickTask, TileInstance, TileKind};
use tilelogic_world::{query, SimulationState};

/// Orientation rules applied to directional tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Policy {
    /// Side on which a wire must touch a supporting block.
    pub wire_support: Direction,
    /// Side an inverter drives. The opposite side is its control side, so a
    /// block controls the inverter lying on the block's copy of this side.
    pub inverter_output: Direction,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            wire_support: Direction::South,
            inverter_output: Direction::East,
        }
    }
}

/// Dispatches the three-phase contract for every tile kind.
#[derive(Clone, Copy, Debug, Default)]
pub struct TileBehavior {
    policy: Policy,
}

impl TileBehavior {
    /// Creates tile behaviours governed by the provided orientation policy.
    #[must_use]
    pub const fn new(policy: Policy) -> Self {
        Self { policy }
    }

    /// Orientation policy in effect.
    #[must_use]
    pub const fn policy(&self) -> Policy {
        self.policy
    }

    /// Validates the tile's surroundings and seeds initial signals.
    ///
    /// Returns `false` when the tile is not validly connected, which fails the
    /// whole row structurally.
    pub fn preprocess(
        &self,
        state: &SimulationState<'_>,
        tile: TileInstance,
        neighbors: &Neighbors,
        out: &mut Vec<Command>,
    ) -> bool {
        match tile.kind() {
            TileKind::Air | TileKind::Block => true,
            TileKind::Wire => neighbors
                .side(self.policy.wire_support)
                .is_some_and(|support| support.kind() == TileKind::Block),
            TileKind::Inverter => {
                let Some(powered) = query::power(state, tile.cell()) else {
                    return true;
                };
                if let Some(wire) = self.inverter_output(neighbors) {
                    drive(state, tile, wire, !powered, out);
                }
                true
            }
            TileKind::Input => {
                let Some(bit) = query::input_bit(state, tile) else {
                    return false;
                };
                let mut wires = neighbors
                    .level()
                    .filter(|neighbor| neighbor.kind() == TileKind::Wire)
                    .peekable();
                if wires.peek().is_none() {
                    return false;
                }
                if bit {
                    for wire in wires {
                        drive(state, tile, wire, true, out);
                    }
                }
                true
            }
            TileKind::Output => {
                query::expected_output(state, tile).is_some()
                    && neighbors
                        .ring()
                        .any(|neighbor| neighbor.kind() == TileKind::Wire)
            }
        }
    }

    /// Runs the tile's reaction to a task scheduled by `triggered_by`.
    pub fn on_tick(
        &self,
        state: &SimulationState<'_>,
        tile: TileInstance,
        triggered_by: TileInstance,
        neighbors: &Neighbors,
        out: &mut Vec<Command>,
    ) {
        let Some(powered) = query::power(state, tile.cell()) else {
            return;
        };

        match tile.kind() {
            TileKind::Air | TileKind::Input => {}
            TileKind::Wire => {
                for neighbor in neighbors.ring() {
                    if neighbor == triggered_by || !conducts_from_wire(neighbor.kind()) {
                        continue;
                    }
                    if query::power(state, neighbor.cell()) != Some(powered) {
                        drive(state, tile, neighbor, powered, out);
                    }
                }
            }
            TileKind::Block => {
                let inverter = neighbors
                    .side(self.policy.inverter_output)
                    .filter(|neighbor| neighbor.kind() == TileKind::Inverter);
                if let Some(inverter) = inverter {
                    if query::power(state, inverter.cell()) != Some(powered) {
                        drive(state, tile, inverter, powered, out);
                    }
                }
            }
            TileKind::Inverter => {
                if let Some(wire) = self.inverter_output(neighbors) {
                    if query::power(state, wire.cell()) != Some(!powered) {
                        drive(state, tile, wire, !powered, out);
                    }
                }
            }
            TileKind::Output => out.push(Command::RequestCheck { tile }),
        }
    }

    /// Validates the tile against the truth-table row being simulated.
    #[must_use]
    pub fn check_pass(&self, state: &SimulationState<'_>, tile: TileInstance) -> bool {
        match tile.kind() {
            TileKind::Air
            | TileKind::Wire
            | TileKind::Inverter
            | TileKind::Input
            | TileKind::Block => true,
            TileKind::Output => match query::expected_output(state, tile) {
                Some(expected) => query::power(state, tile.cell()) == Some(expected),
                None => false,
            },
        }
    }

    fn inverter_output(&self, neighbors: &Neighbors) -> Option<TileInstance> {
        neighbors
            .side(self.policy.inverter_output)
            .filter(|neighbor| neighbor.kind() == TileKind::Wire)
    }
}

fn conducts_from_wire(kind: TileKind) -> bool {
    matches!(kind, TileKind::Wire | TileKind::Block | TileKind::Output)
}

fn drive(
    state: &SimulationState<'_>,
    source: TileInstance,
    target: TileInstance,
    powered: bool,
    out: &mut Vec<Command>,
) {
    out.push(Command::SetPower {
        cell: target.cell(),
        powered,
    });
    out.push(Command::Schedule {
        task: TickTask::after_delay(target, source, query::tick(state)),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilelogic_core::{CellCoord, Template};
    use tilelogic_world::apply;

    fn template(grid: &str, truths: &str) -> Template {
        tilelogic_template::parse(&format!(
            "=== Template ===\n{grid}\n=== Truth Table ===\n{truths}\n"
        ))
        .expect("valid template")
    }

    fn tile(template: &Template, column: u32, row: u32) -> TileInstance {
        template
            .grid()
            .tile(CellCoord::new(column, row))
            .expect("tile inside grid")
    }

    fn preprocess(template: &Template, column: u32, row: u32) -> (bool, Vec<Command>) {
        let state = SimulationState::new(template, 0).expect("row exists");
        let tile = tile(template, column, row);
        let neighbors = template.grid().neighbors(tile.cell());
        let mut out = Vec::new();
        let accepted = TileBehavior::default().preprocess(&state, tile, &neighbors, &mut out);
        (accepted, out)
    }

    #[test]
    fn wire_requires_a_block_beneath_it() {
        let supported = template("40 10 50\n00 60 00", "1 = 1");
        let unsupported = template("40 10 50\n00 00 60", "1 = 1");
        let bottom_edge = template("40 10 50", "1 = 1");

        assert!(preprocess(&supported, 1, 0).0);
        assert!(!preprocess(&unsupported, 1, 0).0);
        assert!(!preprocess(&bottom_edge, 1, 0).0);
    }

    #[test]
    fn wire_support_side_follows_the_policy() {
        let template = template("00 60 00\n40 10 50", "1 = 1");
        let state = SimulationState::new(&template, 0).expect("row exists");
        let wire = tile(&template, 1, 1);
        let neighbors = template.grid().neighbors(wire.cell());
        let behavior = TileBehavior::new(Policy {
            wire_support: Direction::North,
            ..Policy::default()
        });

        assert!(behavior.preprocess(&state, wire, &neighbors, &mut Vec::new()));
        assert!(!TileBehavior::default().preprocess(&state, wire, &neighbors, &mut Vec::new()));
    }

    #[test]
    fn true_input_drives_level_wires_at_tick_zero() {
        let template = template("10 40 10\n60 00 60", "1 = ");
        let (accepted, commands) = preprocess(&template, 1, 0);
        let input = tile(&template, 1, 0);

        assert!(accepted);
        assert_eq!(
            commands,
            vec![
                Command::SetPower {
                    cell: CellCoord::new(0, 0),
                    powered: true,
                },
                Command::Schedule {
                    task: TickTask {
                        target: tile(&template, 0, 0),
                        triggered_by: input,
                        tick: 0,
                    },
                },
                Command::SetPower {
                    cell: CellCoord::new(2, 0),
                    powered: true,
                },
                Command::Schedule {
                    task: TickTask {
                        target: tile(&template, 2, 0),
                        triggered_by: input,
                        tick: 0,
                    },
                },
            ]
        );
    }

    #[test]
    fn false_input_is_silent_but_still_needs_a_wire() {
        let wired = template("40 10\n00 60", "0 = ");
        let unwired = template("40 00\n10 60", "0 = ");

        assert_eq!(preprocess(&wired, 0, 0), (true, Vec::new()));
        assert_eq!(preprocess(&unwired, 0, 0), (false, Vec::new()));
    }

    #[test]
    fn truth_indices_out_of_range_fail_preprocess() {
        let template = template("41 10 51\n00 60 00", "1 = 1");

        assert!(!preprocess(&template, 0, 0).0);
        assert!(!preprocess(&template, 2, 0).0);
    }

    #[test]
    fn output_needs_an_adjacent_wire() {
        let diagonal = template("40 10 00\n00 60 50", "1 = 1");
        let isolated = template("40 10 00 50\n00 60 00 00", "1 = 1");

        assert!(preprocess(&diagonal, 2, 1).0);
        assert!(!preprocess(&isolated, 3, 0).0);
    }

    #[test]
    fn inverter_seeds_its_output_wire() {
        let template = template("60 20 10\n00 00 60", "=");
        let (accepted, commands) = preprocess(&template, 1, 0);

        assert!(accepted);
        assert_eq!(
            commands,
            vec![
                Command::SetPower {
                    cell: CellCoord::new(2, 0),
                    powered: true,
                },
                Command::Schedule {
                    task: TickTask {
                        target: tile(&template, 2, 0),
                        triggered_by: tile(&template, 1, 0),
                        tick: 0,
                    },
                },
            ]
        );
    }

    #[test]
    fn wire_skips_its_trigger_and_settled_neighbours() {
        let template = template("10 10 10\n60 60 60", "=");
        let mut state = SimulationState::new(&template, 0).expect("row exists");
        let mut events = Vec::new();
        for cell in [CellCoord::new(0, 0), CellCoord::new(1, 0), CellCoord::new(0, 1)] {
            apply(&mut state, Command::SetPower { cell, powered: true }, &mut events);
        }

        let wire = tile(&template, 1, 0);
        let neighbors = template.grid().neighbors(wire.cell());
        let mut out = Vec::new();
        TileBehavior::default().on_tick(
            &state,
            wire,
            tile(&template, 0, 0),
            &neighbors,
            &mut out,
        );

        let driven: Vec<_> = out
            .iter()
            .filter_map(|command| match command {
                Command::SetPower { cell, .. } => Some(*cell),
                _ => None,
            })
            .collect();
        assert_eq!(
            driven,
            vec![CellCoord::new(2, 0), CellCoord::new(2, 1), CellCoord::new(1, 1)],
            "wire should power every differing conductor in ring order"
        );
    }

    #[test]
    fn block_mirrors_into_the_inverter_it_controls() {
        let template = template("60 20 10\n00 00 60", "=");
        let mut state = SimulationState::new(&template, 0).expect("row exists");
        let mut events = Vec::new();
        let block = tile(&template, 0, 0);
        apply(
            &mut state,
            Command::SetPower {
                cell: block.cell(),
                powered: true,
            },
            &mut events,
        );

        let mut out = Vec::new();
        TileBehavior::default().on_tick(
            &state,
            block,
            block,
            &template.grid().neighbors(block.cell()),
            &mut out,
        );

        assert_eq!(
            out[0],
            Command::SetPower {
                cell: CellCoord::new(1, 0),
                powered: true,
            }
        );
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn output_requests_a_mid_run_check_and_compares_its_state() {
        let template = template("40 10 50\n00 60 00", "1 = 1");
        let mut state = SimulationState::new(&template, 0).expect("row exists");
        let output = tile(&template, 2, 0);
        let mut out = Vec::new();
        let behavior = TileBehavior::default();

        behavior.on_tick(
            &state,
            output,
            tile(&template, 1, 0),
            &template.grid().neighbors(output.cell()),
            &mut out,
        );
        assert_eq!(out, vec![Command::RequestCheck { tile: output }]);

        assert!(!behavior.check_pass(&state, output));
        let mut events = Vec::new();
        apply(
            &mut state,
            Command::SetPower {
                cell: output.cell(),
                powered: true,
            },
            &mut events,
        );
        assert!(behavior.check_pass(&state, output));
        assert!(behavior.check_pass(&state, tile(&template, 1, 0)));
    }
}
