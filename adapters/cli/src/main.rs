#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that verifies a circuit template against its truth table.

mod settings;

use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use tilelogic_rendering::{Palette, TerminalRenderer};
use tilelogic_system_verification::{VerificationReport, Verifier};

use crate::settings::Settings;

/// Exit status used when a row fails verification.
const EXIT_FAILED: u8 = 1;
/// Exit status used when the template or configuration cannot be loaded.
const EXIT_ERROR: u8 = 2;

/// Command-line arguments accepted by the verifier.
#[derive(Debug, Parser)]
#[command(name = "tilelogic", about = "Verify a tile circuit against its truth table")]
struct CliArgs {
    /// Template file to verify.
    template: PathBuf,
    /// TOML file with `[simulation]` and `[output]` sections.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Emit per-row and per-phase diagnostics.
    #[arg(long)]
    verbose: bool,
    /// Render every dispatched task and wait for enter before continuing.
    #[arg(long)]
    step: bool,
    /// Print a JSON summary instead of the plain verdict.
    #[arg(long)]
    json: bool,
}

/// Entry point for the tile logic command-line interface.
fn main() -> ExitCode {
    let args = CliArgs::parse();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILED),
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run(args: &CliArgs) -> Result<bool> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.output.verbose |= args.verbose;
    settings.output.step |= args.step;

    init_logging(settings.output.verbose);

    let template = tilelogic_template::load(&args.template)?;
    log::info!(
        "loaded {}x{} template with {} truth rows",
        template.grid().columns(),
        template.grid().rows(),
        template.truths().len()
    );

    let mut verifier = Verifier::new(settings.simulation);
    let report = if settings.output.step {
        let mut renderer = TerminalRenderer::new(io::stdin().lock(), io::stdout()).with_step(true);
        if settings.output.color {
            renderer = renderer.with_palette(Palette::default());
        }
        verifier.run(&template, &mut renderer)
    } else {
        verifier.run(&template, &mut ())
    };

    print_report(&report, args.json)?;
    Ok(report.passed())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn print_report(report: &VerificationReport, json: bool) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if json {
        let summary = serde_json::to_string_pretty(&report.summary())
            .context("failed to serialize verification summary")?;
        writeln!(stdout, "{summary}").context("failed to write summary")?;
        return Ok(());
    }

    match report.first_failure() {
        None => writeln!(stdout, "Passed!"),
        Some(failure) => writeln!(stdout, "Failed!\n{failure}"),
    }
    .context("failed to write verdict")
}
