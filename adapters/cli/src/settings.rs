use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use tilelogic_system_propagation::Config;

/// Settings read from an optional TOML file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Settings {
    /// Scheduler configuration.
    pub(crate) simulation: Config,
    /// Terminal output preferences.
    pub(crate) output: OutputSettings,
}

/// Terminal output preferences.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct OutputSettings {
    /// Emit per-row and per-phase diagnostics.
    pub(crate) verbose: bool,
    /// Render every dispatched task and wait for enter.
    pub(crate) step: bool,
    /// Use ANSI colors when rendering frames.
    pub(crate) color: bool,
}

impl Settings {
    /// Loads settings from the TOML file at the provided path.
    pub(crate) fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("failed to load config at {}", path.display()))
    }

    fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse config toml contents")
    }
}
