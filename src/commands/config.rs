use anyhow::{bail, Result};
use clap::ArgMatches;
use colored::Colorize;

use crate::core::GuardConfig;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", sub_matches)) => handle_show(sub_matches),
        Some(("path", sub_matches)) => handle_path(sub_matches),
        Some(("init", sub_matches)) => handle_init(sub_matches),
        _ => {
            println!("Use 'gpu-guard config --help' for more information.");
            Ok(())
        }
    }
}

/// Print the effective configuration, including command-line overrides
fn handle_show(matches: &ArgMatches) -> Result<()> {
    let config = super::load_config(matches)?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    if let Err(e) = config.validate() {
        println!("{}", format!("⚠️  {}", e).yellow());
    }
    Ok(())
}

fn handle_path(matches: &ArgMatches) -> Result<()> {
    let path = super::config_path(matches)?;
    println!("{}", path.display());
    Ok(())
}

fn handle_init(matches: &ArgMatches) -> Result<()> {
    let path = super::config_path(matches)?;

    if path.exists() && !matches.get_flag("force") {
        bail!(
            "Config file already exists at {:?} (use --force to overwrite)",
            path
        );
    }

    GuardConfig::default().save(&path)?;

    println!(
        "{} {}",
        "✓ Wrote default config to:".green(),
        path.display()
    );
    println!(
        "{}",
        "Edit app_dir, interpreter and token before launching.".dimmed()
    );
    Ok(())
}
