use crate::core::launcher::{WorkloadRunner, WorkloadSpec};
use crate::core::restriction::RestrictionState;
use crate::error::Result;
use std::process::{Command, ExitStatus};

/// Runs the workload as a child process with inherited stdio
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessWorkload;

impl WorkloadRunner for ProcessWorkload {
    fn run(&self, workload: &WorkloadSpec, restriction: &RestrictionState) -> Result<i32> {
        let mut cmd = Command::new(&workload.program);
        cmd.args(&workload.args);
        if let Some(dir) = &workload.working_dir {
            cmd.current_dir(dir);
        }
        restriction.apply(&mut cmd);

        log::info!(
            "Starting {} {} with {}",
            workload.program.display(),
            workload.args.join(" "),
            restriction.describe()
        );

        let status = cmd.status()?;
        Ok(exit_code_of(status))
    }
}

/// Exit status as a shell would report it
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
