//! Common functionality for ZEN2, a capacity-expansion model of energy systems.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod carrier;
pub mod cli;
pub mod error;
pub mod finance;
pub mod id;
pub mod index;
pub mod input;
pub mod log;
pub mod model;
pub mod network;
pub mod output;
pub mod parameter;
pub mod pwa;
pub mod scenario;
pub mod sets;
pub mod settings;
pub mod simulation;
pub mod technology;
pub mod time_step;

#[cfg(test)]
mod fixture;

/// Get the directory where ZEN2 reads its configuration from
pub fn get_zen2_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        // No config directory on this platform, so use the current directory
        return PathBuf::new();
    };
    config_dir.push("zen2");

    config_dir
}
