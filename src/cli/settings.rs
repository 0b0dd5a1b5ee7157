//! The `settings` subcommands, for inspecting the program settings file.
use crate::settings::{Settings, get_settings_file_path};
use anyhow::{Context, Result};
use clap::Subcommand;

/// Subcommands for settings
#[derive(Subcommand)]
pub enum SettingsSubcommands {
    /// Get the path to where the settings file is read from
    Path,
    /// Show the settings in effect, including defaults for settings not in the file
    Show,
    /// Write the contents of a placeholder `settings.toml` to the console
    DumpDefault,
}

impl SettingsSubcommands {
    /// Execute the supplied settings subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::Path => println!("{}", get_settings_file_path().display()),
            Self::Show => print!("{}", effective_settings()?),
            Self::DumpDefault => print!("{}", Settings::default_file_contents()?),
        }

        Ok(())
    }
}

/// The loaded settings as TOML
fn effective_settings() -> Result<String> {
    let settings = Settings::load().context("Failed to load settings.")?;
    toml::to_string(&settings).context("Failed to serialise settings")
}
