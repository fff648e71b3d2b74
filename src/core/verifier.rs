//! Independent check that the restriction took effect.
//!
//! The probe runs inside the workload's own runtime and re-asks "which GPUs
//! do you see". It runs twice: once without any restriction (does the
//! backend work at all) and once under the restriction (is exactly the
//! chosen GPU visible). The probe's exit code is authoritative; its printed
//! observations are only trusted to fail a run, never to pass one.

use crate::core::accelerator::name_contains;
use crate::core::restriction::RestrictionState;
use crate::error::{GuardError, ProbePhase, Result};
use std::path::PathBuf;
use std::process::Command;

pub const EXIT_OK: i32 = 0;
pub const EXIT_BACKEND_UNAVAILABLE: i32 = 20;
pub const EXIT_DEVICE_COUNT: i32 = 21;
pub const EXIT_IDENTITY: i32 = 22;

pub const EXPECT_COUNT_VAR: &str = "GPU_GUARD_EXPECT_COUNT";
pub const EXPECT_TOKEN_VAR: &str = "GPU_GUARD_EXPECT_TOKEN";

/// Inline program handed to the interpreter with `-c`
pub const PROBE_SCRIPT: &str = r#"import os, sys
try:
    import torch
except Exception as exc:
    print(f"probe_error=import torch failed: {exc}")
    sys.exit(20)
available = torch.cuda.is_available()
print(f"backend_available={int(available)}")
if not available:
    print(f"probe_error=torch {torch.__version__} reports CUDA unavailable")
    sys.exit(20)
count = torch.cuda.device_count()
print(f"device_count={count}")
names = [torch.cuda.get_device_name(i) for i in range(count)]
for name in names:
    print(f"device_name={name}")
expected = os.environ.get("GPU_GUARD_EXPECT_COUNT", "")
if expected and count != int(expected):
    sys.exit(21)
token = os.environ.get("GPU_GUARD_EXPECT_TOKEN", "").strip().lower()
if token and (not names or token not in names[0].lower()):
    sys.exit(22)
sys.exit(0)
"#;

/// What the probe is asked to confirm
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeExpectation {
    pub device_count: Option<usize>,
    pub token: Option<String>,
}

impl ProbeExpectation {
    pub fn backend_only() -> Self {
        Self::default()
    }

    pub fn single_device<S: Into<String>>(token: S) -> Self {
        Self {
            device_count: Some(1),
            token: Some(token.into()),
        }
    }
}

/// Raw result of one probe process
#[derive(Debug, Clone, Default)]
pub struct ProbeOutput {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs the probe program.
///
/// `restriction` of `None` is the unrestricted run. Spawn errors are
/// returned as `Err` and reported as an unavailable backend.
pub trait ProbeRunner {
    fn run(
        &self,
        restriction: Option<&RestrictionState>,
        expectation: &ProbeExpectation,
    ) -> Result<ProbeOutput>;
}

/// Probe executed through the workload's Python interpreter
#[derive(Debug, Clone)]
pub struct PythonProbe {
    interpreter: PathBuf,
    working_dir: Option<PathBuf>,
    visibility_var: String,
}

impl PythonProbe {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(interpreter: P, visibility_var: S) -> Self {
        Self {
            interpreter: interpreter.into(),
            working_dir: None,
            visibility_var: visibility_var.into(),
        }
    }

    pub fn working_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn command(&self, restriction: Option<&RestrictionState>, expectation: &ProbeExpectation) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-c").arg(PROBE_SCRIPT);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        match restriction {
            Some(state) => state.apply(&mut cmd),
            // An inherited restriction from the operator's shell would hide GPUs
            None => {
                cmd.env_remove(&self.visibility_var);
            }
        }

        match expectation.device_count {
            Some(count) => cmd.env(EXPECT_COUNT_VAR, count.to_string()),
            None => cmd.env_remove(EXPECT_COUNT_VAR),
        };
        match &expectation.token {
            Some(token) => cmd.env(EXPECT_TOKEN_VAR, token),
            None => cmd.env_remove(EXPECT_TOKEN_VAR),
        };

        cmd
    }
}

impl ProbeRunner for PythonProbe {
    fn run(
        &self,
        restriction: Option<&RestrictionState>,
        expectation: &ProbeExpectation,
    ) -> Result<ProbeOutput> {
        log::debug!(
            "Running probe with {} ({})",
            self.interpreter.display(),
            restriction.map_or_else(|| "unrestricted".to_string(), |s| s.describe())
        );

        let output = self.command(restriction, expectation).output()?;

        Ok(ProbeOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Observations and verdict of one probe run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub phase: ProbePhase,
    pub backend_available: bool,
    pub device_count: Option<usize>,
    pub device_names: Vec<String>,
    pub exit_code: Option<i32>,
    pub passed: bool,
}

impl VerificationReport {
    /// Name of the first visible device
    pub fn identity(&self) -> Option<&str> {
        self.device_names.first().map(String::as_str)
    }

    fn parse(phase: ProbePhase, output: &ProbeOutput) -> (Self, Option<String>) {
        let mut report = VerificationReport {
            phase,
            backend_available: false,
            device_count: None,
            device_names: Vec::new(),
            exit_code: output.exit_code,
            passed: false,
        };
        let mut probe_error = None;

        for line in output.stdout.lines() {
            log::debug!("probe: {}", line);
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "backend_available" => report.backend_available = value == "1",
                "device_count" => report.device_count = value.parse().ok(),
                "device_name" => report.device_names.push(value.to_string()),
                "probe_error" => probe_error = Some(value.to_string()),
                _ => {}
            }
        }

        (report, probe_error)
    }
}

/// Phase 1: can the backend see any GPU at all
pub fn probe_unrestricted(runner: &dyn ProbeRunner) -> Result<VerificationReport> {
    run_phase(runner, ProbePhase::Unrestricted, None, &ProbeExpectation::backend_only())
}

/// Phase 2: under `state`, exactly one GPU is visible and its name contains `token`
pub fn verify(
    runner: &dyn ProbeRunner,
    state: &RestrictionState,
    token: &str,
) -> Result<VerificationReport> {
    run_phase(
        runner,
        ProbePhase::Restricted,
        Some(state),
        &ProbeExpectation::single_device(token),
    )
}

fn run_phase(
    runner: &dyn ProbeRunner,
    phase: ProbePhase,
    restriction: Option<&RestrictionState>,
    expectation: &ProbeExpectation,
) -> Result<VerificationReport> {
    let output = runner
        .run(restriction, expectation)
        .map_err(|e| GuardError::backend_unavailable(phase, format!("probe did not start: {}", e)))?;
    interpret(phase, &output, expectation)
}

/// Turn a probe's exit code and observations into a verdict.
///
/// Checks run in order and stop at the first failure: backend, device
/// count, identity.
pub fn interpret(
    phase: ProbePhase,
    output: &ProbeOutput,
    expectation: &ProbeExpectation,
) -> Result<VerificationReport> {
    let (mut report, probe_error) = VerificationReport::parse(phase, output);
    let token = expectation.token.clone().unwrap_or_default();

    match output.exit_code {
        Some(EXIT_OK) => {}
        Some(EXIT_BACKEND_UNAVAILABLE) => {
            let detail = probe_error.unwrap_or_else(|| "backend reports no CUDA support".into());
            return Err(GuardError::backend_unavailable(phase, detail));
        }
        Some(EXIT_DEVICE_COUNT) => {
            return Err(GuardError::UnexpectedDeviceCount {
                observed: report.device_count.unwrap_or(0),
            });
        }
        Some(EXIT_IDENTITY) => {
            return Err(GuardError::IdentityMismatch {
                token,
                observed: report.identity().unwrap_or("<none>").to_string(),
            });
        }
        Some(code) => {
            return Err(GuardError::backend_unavailable(
                phase,
                format!("probe exited with status {}{}", code, stderr_tail(&output.stderr)),
            ));
        }
        None => {
            return Err(GuardError::backend_unavailable(
                phase,
                "probe terminated by a signal",
            ));
        }
    }

    // Exit 0 only passes if the observations agree
    if !report.backend_available {
        return Err(GuardError::backend_unavailable(
            phase,
            probe_error.unwrap_or_else(|| "probe did not confirm backend availability".into()),
        ));
    }

    let observed = report.device_count.unwrap_or(report.device_names.len());
    match expectation.device_count {
        Some(expected) if observed != expected => {
            return Err(GuardError::UnexpectedDeviceCount { observed });
        }
        None if observed == 0 => {
            return Err(GuardError::backend_unavailable(phase, "backend sees no GPUs"));
        }
        _ => {}
    }

    if expectation.token.is_some() {
        let identity = report.identity().unwrap_or_default();
        if !name_contains(identity, &token) {
            return Err(GuardError::IdentityMismatch {
                token,
                observed: identity.to_string(),
            });
        }
    }

    report.passed = true;
    Ok(report)
}

fn stderr_tail(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(|l| format!(": {}", l.trim()))
        .unwrap_or_default()
}
