#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Terminal debug renderer for tile logic simulations.
//!
//! [`TerminalRenderer`] implements the propagation [`Observer`] and redraws
//! the grid after every dispatched task. In step mode it blocks until a line
//! is read from its input before letting the simulation continue.

use std::io::{BufRead, Write};

use anyhow::{Context, Result as AnyResult};
use log::warn;
use tilelogic_core::{CellCoord, Template, TileKind};
use tilelogic_system_propagation::{Frame, Observer, Phase, RowReport};

/// Amount powered tiles are lightened towards white.
const POWERED_LIGHTEN: f32 = 0.55;

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }

    /// Returns a new color lightened towards white by the provided amount.
    #[must_use]
    pub fn lighten(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);

        Self {
            red: lighten_channel(self.red, amount),
            green: lighten_channel(self.green, amount),
            blue: lighten_channel(self.blue, amount),
            alpha: self.alpha,
        }
    }

    /// Quantizes the color channels back to bytes.
    #[must_use]
    pub fn to_rgb_u8(self) -> (u8, u8, u8) {
        (
            channel_to_u8(self.red),
            channel_to_u8(self.green),
            channel_to_u8(self.blue),
        )
    }
}

fn lighten_channel(channel: f32, amount: f32) -> f32 {
    channel + (1.0 - channel) * amount
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel_to_u8(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Base color of every tile kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Palette {
    air: Color,
    wire: Color,
    inverter: Color,
    input: Color,
    output: Color,
    block: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            air: Color::from_rgb_u8(60, 60, 60),
            wire: Color::from_rgb_u8(150, 30, 30),
            inverter: Color::from_rgb_u8(170, 110, 20),
            input: Color::from_rgb_u8(30, 110, 170),
            output: Color::from_rgb_u8(40, 150, 60),
            block: Color::from_rgb_u8(120, 120, 120),
        }
    }
}

impl Palette {
    /// Color used for the tile kind in the provided power state.
    #[must_use]
    pub fn color(&self, kind: TileKind, powered: bool) -> Color {
        let base = match kind {
            TileKind::Air => self.air,
            TileKind::Wire => self.wire,
            TileKind::Inverter => self.inverter,
            TileKind::Input => self.input,
            TileKind::Output => self.output,
            TileKind::Block => self.block,
        };
        if powered {
            base.lighten(POWERED_LIGHTEN)
        } else {
            base
        }
    }
}

/// Character drawn for the tile kind in the provided power state.
#[must_use]
pub const fn glyph(kind: TileKind, powered: bool) -> char {
    match (kind, powered) {
        (TileKind::Air, _) => '.',
        (TileKind::Wire, false) => '-',
        (TileKind::Wire, true) => '=',
        (TileKind::Inverter, false) => '~',
        (TileKind::Inverter, true) => '!',
        (TileKind::Input, false) => 'i',
        (TileKind::Input, true) => 'I',
        (TileKind::Output, false) => 'o',
        (TileKind::Output, true) => 'O',
        (TileKind::Block, false) => '+',
        (TileKind::Block, true) => '#',
    }
}

/// Draws the grid as text, one line per grid row.
///
/// `powered` receives the dense row-major index of each cell. The `active`
/// cell is followed by `<`; every other cell by a space.
#[must_use]
pub fn draw_grid<F>(
    template: &Template,
    powered: F,
    active: Option<CellCoord>,
    palette: Option<&Palette>,
) -> String
where
    F: Fn(usize) -> bool,
{
    let mut text = String::new();
    for (index, tile) in template.grid().iter().enumerate() {
        if tile.cell().column() == 0 && index > 0 {
            text.push('\n');
        }

        let on = powered(index);
        let symbol = glyph(tile.kind(), on);
        match palette {
            Some(palette) => {
                let (red, green, blue) = palette.color(tile.kind(), on).to_rgb_u8();
                text.push_str(&format!("\x1b[38;2;{red};{green};{blue}m{symbol}\x1b[0m"));
            }
            None => text.push(symbol),
        }
        text.push(if active == Some(tile.cell()) { '<' } else { ' ' });
    }
    text.push('\n');
    text
}

/// Observer that prints every simulation frame to a terminal.
#[derive(Debug)]
pub struct TerminalRenderer<R, W> {
    input: R,
    output: W,
    palette: Option<Palette>,
    step: bool,
}

impl<R, W> TerminalRenderer<R, W>
where
    R: BufRead,
    W: Write,
{
    /// Creates a renderer that writes plain text frames without pausing.
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            palette: None,
            step: false,
        }
    }

    /// Draws frames with ANSI true-color escapes using the provided palette.
    #[must_use]
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = Some(palette);
        self
    }

    /// Waits for a line of input after every frame when `step` is set.
    #[must_use]
    pub fn with_step(mut self, step: bool) -> Self {
        self.step = step;
        self
    }

    /// Consumes the renderer, returning its output sink.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Writes one frame and, in step mode, waits for the user.
    pub fn render_frame(&mut self, frame: &Frame<'_>) -> AnyResult<()> {
        let grid = draw_grid(
            frame.template,
            |index| frame.power.is_powered(index),
            Some(frame.task.target.cell()),
            self.palette.as_ref(),
        );
        writeln!(
            self.output,
            "[row {}] tick {}: {:?} at {} (from {:?} at {})",
            frame.row,
            frame.tick,
            frame.task.target.kind(),
            frame.task.target.cell(),
            frame.task.triggered_by.kind(),
            frame.task.triggered_by.cell(),
        )
        .context("failed to write frame header")?;
        self.output
            .write_all(grid.as_bytes())
            .context("failed to write frame")?;
        self.output.flush().context("failed to flush frame")?;

        if self.step {
            self.wait_for_step()?;
        }
        Ok(())
    }

    fn wait_for_step(&mut self) -> AnyResult<()> {
        write!(self.output, "press enter to continue ").context("failed to write prompt")?;
        self.output.flush().context("failed to flush prompt")?;
        let mut line = String::new();
        let _ = self
            .input
            .read_line(&mut line)
            .context("failed to read step input")?;
        Ok(())
    }

    fn print(&mut self, line: &str) -> AnyResult<()> {
        writeln!(self.output, "{line}").context("failed to write renderer output")
    }
}

impl<R, W> Observer for TerminalRenderer<R, W>
where
    R: BufRead,
    W: Write,
{
    fn row_started(&mut self, row: usize, template: &Template) {
        let truth = template.truth(row).map(|truth| {
            let bits = |values: &[bool]| {
                values
                    .iter()
                    .map(|bit| if *bit { "1" } else { "0" })
                    .collect::<Vec<_>>()
                    .join(" ")
            };
            format!("{} = {}", bits(truth.inputs()), bits(truth.outputs()))
        });
        let line = format!("[row {row}] {}", truth.unwrap_or_default());
        if let Err(error) = self.print(&line) {
            warn!("renderer failed: {error:#}");
        }
    }

    fn phase_entered(&mut self, row: usize, phase: Phase) {
        if let Err(error) = self.print(&format!("[row {row}] {phase:?}")) {
            warn!("renderer failed: {error:#}");
        }
    }

    fn task_dispatched(&mut self, frame: &Frame<'_>) {
        if let Err(error) = self.render_frame(frame) {
            warn!("renderer failed: {error:#}");
        }
    }

    fn row_finished(&mut self, report: &RowReport) {
        let line = match &report.outcome {
            Ok(()) => format!(
                "[row {}] passed after {} tasks",
                report.row, report.tasks_dispatched
            ),
            Err(failure) => format!("[row {}] {failure}", report.row),
        };
        if let Err(error) = self.print(&line) {
            warn!("renderer failed: {error:#}");
        }
    }
}
