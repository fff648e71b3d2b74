// Command handlers module
pub mod config;
pub mod launch;
pub mod list;
pub mod version;

use anyhow::Result;
use clap::ArgMatches;
use std::path::PathBuf;

use crate::core::GuardConfig;

// Re-exports for cleaner imports
pub use list::execute as list;
pub use version::execute as version;

/// Config file chosen with `--config`, or the default location
pub fn config_path(matches: &ArgMatches) -> Result<PathBuf> {
    match matches.get_one::<PathBuf>("config-file") {
        Some(path) => Ok(path.clone()),
        None => GuardConfig::default_path(),
    }
}

/// Load the config file and apply the one-run overrides (`--token`, `--gpu-index`)
/// for the commands that define them
pub fn load_config(matches: &ArgMatches) -> Result<GuardConfig> {
    let path = config_path(matches)?;
    let mut config = GuardConfig::load(Some(&path))?;

    if let Ok(Some(token)) = matches.try_get_one::<String>("token") {
        config.token = token.clone();
    }
    if let Ok(Some(index)) = matches.try_get_one::<u32>("gpu-index") {
        config.gpu_index = Some(*index);
    }

    Ok(config)
}
