use anyhow::{bail, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use std::path::PathBuf;

use gpu_guard::commands;
use gpu_guard::core::LaunchMode;
use gpu_guard::error::GuardError;
use gpu_guard::ui;

fn build_cli() -> Command {
    Command::new("gpu-guard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Pin a workload to exactly one named GPU, verify it, then launch")
        .long_about(
            "Pin a workload to exactly one named GPU, verify it, then launch\n\n\
             Without a subcommand the configured workload is launched. The GPU is\n\
             chosen by matching the configured token against nvidia-smi names and\n\
             verified with a probe in the workload's own runtime before anything runs.",
        )
        .arg(
            Arg::new("config-file")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Config file (defaults to the user config directory)")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(token_arg())
        .arg(gpu_index_arg())
        .subcommand(
            Command::new("launch")
                .about("Verify the GPU restriction, then run the workload")
                .arg(token_arg())
                .arg(gpu_index_arg()),
        )
        .subcommand(
            Command::new("check")
                .about("Verify the GPU restriction without starting the workload")
                .arg(token_arg())
                .arg(gpu_index_arg()),
        )
        .subcommand(
            Command::new("list")
                .about("List GPUs reported by the driver")
                .arg(token_arg())
                .arg(
                    Arg::new("raw")
                        .long("raw")
                        .help("Print the human-readable nvidia-smi -L listing")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Inspect or create the config file (use 'gpu-guard config --help' for subcommands)")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(Command::new("path").about("Print the config file location"))
                .subcommand(
                    Command::new("init")
                        .about("Write a default config file")
                        .arg(
                            Arg::new("force")
                                .long("force")
                                .help("Overwrite an existing file")
                                .action(ArgAction::SetTrue),
                        ),
                ),
        )
        .subcommand(Command::new("version").about("Shows version information"))
}

// One-run overrides; only commands that pick a GPU accept them
fn token_arg() -> Arg {
    Arg::new("token")
        .short('t')
        .long("token")
        .value_name("TOKEN")
        .help("GPU name fragment to pin for this run")
}

fn gpu_index_arg() -> Arg {
    Arg::new("gpu-index")
        .short('i')
        .long("gpu-index")
        .value_name("N")
        .help("Explicit GPU index for this run; skips name matching")
        .value_parser(clap::value_parser!(u32))
}

fn run(matches: &ArgMatches) -> Result<()> {
    if matches.subcommand().is_some()
        && (matches.contains_id("token") || matches.contains_id("gpu-index"))
    {
        bail!("--token and --gpu-index go after the subcommand, e.g. 'gpu-guard check --token 5080'");
    }

    match matches.subcommand() {
        Some(("launch", sub_matches)) => commands::launch::execute(sub_matches, LaunchMode::Run),
        Some(("check", sub_matches)) => commands::launch::execute(sub_matches, LaunchMode::Check),
        Some(("list", sub_matches)) => commands::list(sub_matches),
        Some(("config", sub_matches)) => commands::config::execute(sub_matches),
        Some(("version", _)) => commands::version(),
        _ => commands::launch::execute(matches, LaunchMode::Run),
    }
}

fn main() {
    gpu_guard::init_logging();

    let matches = build_cli().get_matches();

    if let Err(err) = run(&matches) {
        let code = match err.downcast_ref::<GuardError>() {
            // The workload already reported its own failure
            Some(GuardError::WorkloadNonZeroExit(code)) => *code,
            Some(guard_err) => {
                ui::print_failure(guard_err);
                guard_err.exit_code()
            }
            None => {
                eprintln!("{}", format!("✗ {:#}", err).red().bold());
                1
            }
        };
        std::process::exit(code);
    }
}
