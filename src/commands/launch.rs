use anyhow::Result;
use clap::ArgMatches;
use colored::Colorize;

use crate::core::{GuardedLauncher, LaunchMode, PythonProbe};
use crate::error::GuardError;
use crate::platform::{query_for, ProcessWorkload};
use crate::ui;

/// Run the guard. `LaunchMode::Check` stops once the restriction is verified.
pub fn execute(matches: &ArgMatches, mode: LaunchMode) -> Result<()> {
    let config = super::load_config(matches)?;
    let plan = config.launch_plan()?;

    let query = query_for(&config);
    let probe = PythonProbe::new(plan.workload.program.clone(), config.visibility_var.clone())
        .working_dir(config.app_dir.clone());
    let workload = ProcessWorkload;

    if mode == LaunchMode::Check {
        println!("{}", "Checking GPU restriction (workload will not start)...".cyan());
    }

    let mut launcher = GuardedLauncher::new(query.as_ref(), &probe, &workload, plan);
    let outcome = launcher.launch(mode)?;

    match outcome.workload_exit {
        None => {
            ui::print_outcome(&outcome);
            println!("{}", "✓ Verification passed".green().bold());
            Ok(())
        }
        Some(0) => Ok(()),
        Some(code) => Err(GuardError::WorkloadNonZeroExit(code).into()),
    }
}
