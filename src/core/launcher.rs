//! Guarded launcher: validate, enumerate, resolve, restrict, verify, run.
//!
//! The states form a straight line. Any error jumps to `Failed` and the
//! workload is never started; only a `Verified` launcher may enter
//! `Running`.

use crate::core::accelerator::AcceleratorQuery;
use crate::core::resolver::{resolve, MatchPolicy, Resolution, ResolutionSource};
use crate::core::restriction::RestrictionState;
use crate::core::verifier::{probe_unrestricted, verify, ProbeRunner, VerificationReport};
use crate::error::{GuardError, Result};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchState {
    Init,
    PathsValidated,
    Enumerated,
    Resolved,
    Restricted,
    Verified,
    Running,
    Exited,
    Failed(String),
}

impl fmt::Display for LaunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchState::Init => write!(f, "init"),
            LaunchState::PathsValidated => write!(f, "paths-validated"),
            LaunchState::Enumerated => write!(f, "enumerated"),
            LaunchState::Resolved => write!(f, "resolved"),
            LaunchState::Restricted => write!(f, "restricted"),
            LaunchState::Verified => write!(f, "verified"),
            LaunchState::Running => write!(f, "running"),
            LaunchState::Exited => write!(f, "exited"),
            LaunchState::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Verify, then run the workload and forward its exit status
    Run,
    /// Verify only; never starts the workload
    Check,
}

/// Program started once the guard has verified the restriction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

/// Starts the protected workload and blocks until it exits
pub trait WorkloadRunner {
    /// Returns the workload's exit status, untouched
    fn run(&self, workload: &WorkloadSpec, restriction: &RestrictionState) -> Result<i32>;
}

/// Everything a launch attempt needs besides its collaborators
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub required_paths: Vec<PathBuf>,
    pub policy: MatchPolicy,
    pub visibility_var: String,
    pub device_order: Option<String>,
    pub workload: WorkloadSpec,
}

#[derive(Debug, Clone)]
pub struct LaunchOutcome {
    pub resolution: Resolution,
    pub restriction: RestrictionState,
    pub backend: VerificationReport,
    pub verification: VerificationReport,
    /// `None` in check mode
    pub workload_exit: Option<i32>,
}

pub struct GuardedLauncher<'a> {
    query: &'a dyn AcceleratorQuery,
    probe: &'a dyn ProbeRunner,
    workload: &'a dyn WorkloadRunner,
    plan: LaunchPlan,
    trace: Vec<LaunchState>,
}

impl<'a> GuardedLauncher<'a> {
    pub fn new(
        query: &'a dyn AcceleratorQuery,
        probe: &'a dyn ProbeRunner,
        workload: &'a dyn WorkloadRunner,
        plan: LaunchPlan,
    ) -> Self {
        Self {
            query,
            probe,
            workload,
            plan,
            trace: vec![LaunchState::Init],
        }
    }

    /// States visited by the last `launch` call, in order
    pub fn trace(&self) -> &[LaunchState] {
        &self.trace
    }

    pub fn state(&self) -> &LaunchState {
        self.trace.last().unwrap_or(&LaunchState::Init)
    }

    pub fn launch(&mut self, mode: LaunchMode) -> Result<LaunchOutcome> {
        self.trace = vec![LaunchState::Init];
        let result = self.drive(mode);
        if let Err(err) = &result {
            self.enter(LaunchState::Failed(err.to_string()));
        }
        result
    }

    fn drive(&mut self, mode: LaunchMode) -> Result<LaunchOutcome> {
        self.validate_paths()?;
        self.enter(LaunchState::PathsValidated);

        // A failed query skips `Enumerated`; only an override or the
        // fallback can carry the launch on to `Resolved`.
        let enumeration = self.query.enumerate();
        match &enumeration {
            Ok(records) => {
                log::info!("{} reported {} GPU(s)", self.query.tool_name(), records.len());
                for record in records {
                    log::info!("  {}", record);
                }
                self.enter(LaunchState::Enumerated);
            }
            Err(err) => log::warn!("{} query failed: {}", self.query.tool_name(), err),
        }

        let resolution = resolve(enumeration.as_deref(), &self.plan.policy)?;
        log::info!(
            "Resolved '{}' to GPU {} ({:?})",
            self.plan.policy.token,
            resolution.index,
            resolution.source
        );
        self.enter(LaunchState::Resolved);

        let restriction = RestrictionState::for_index(
            resolution.index,
            &self.plan.visibility_var,
            self.plan.device_order.as_deref(),
        );
        log::info!("Restriction for child processes: {}", restriction.describe());
        self.enter(LaunchState::Restricted);

        let backend = probe_unrestricted(self.probe)?;
        log::info!(
            "Backend sees {} GPU(s) without restriction",
            backend.device_count.unwrap_or(backend.device_names.len())
        );
        let verification = match verify(self.probe, &restriction, &self.plan.policy.token) {
            Err(GuardError::IdentityMismatch { token, observed })
                if resolution.source == ResolutionSource::Fallback =>
            {
                return Err(GuardError::fallback_refused(format!(
                    "GPU 0 is '{}', which does not contain '{}'",
                    observed, token
                )));
            }
            result => result?,
        };
        log::info!(
            "Restricted probe sees exactly one GPU: {}",
            verification.identity().unwrap_or_default()
        );
        self.enter(LaunchState::Verified);

        let mut outcome = LaunchOutcome {
            resolution,
            restriction,
            backend,
            verification,
            workload_exit: None,
        };

        if mode == LaunchMode::Check {
            return Ok(outcome);
        }

        self.enter(LaunchState::Running);
        let code = self.workload.run(&self.plan.workload, &outcome.restriction)?;
        self.enter(LaunchState::Exited);
        log::info!("Workload exited with status {}", code);

        outcome.workload_exit = Some(code);
        Ok(outcome)
    }

    fn validate_paths(&self) -> Result<()> {
        match self.plan.required_paths.iter().find(|p| !p.exists()) {
            Some(missing) => Err(GuardError::PathMissing(missing.clone())),
            None => Ok(()),
        }
    }

    fn enter(&mut self, state: LaunchState) {
        log::debug!("launcher: {} -> {}", self.state(), state);
        self.trace.push(state);
    }
}
