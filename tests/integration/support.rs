// Fakes shared by the integration tests

use gpu_guard::core::launcher::{LaunchPlan, WorkloadRunner, WorkloadSpec};
use gpu_guard::core::verifier::{
    EXIT_BACKEND_UNAVAILABLE, EXIT_DEVICE_COUNT, EXIT_IDENTITY, EXIT_OK,
};
use gpu_guard::core::{
    AcceleratorQuery, AcceleratorRecord, MatchPolicy, ProbeExpectation, ProbeOutput, ProbeRunner,
    RestrictionState,
};
use gpu_guard::error::{GuardError, Result};
use std::cell::{Cell, RefCell};
use std::path::PathBuf;

pub fn gpus(names: &[&str]) -> Vec<AcceleratorRecord> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| AcceleratorRecord::new(i as u32, *name))
        .collect()
}

/// Query that always returns the same list
pub struct FixedQuery(pub Vec<AcceleratorRecord>);

impl AcceleratorQuery for FixedQuery {
    fn tool_name(&self) -> &str {
        "fixed"
    }

    fn enumerate(&self) -> Result<Vec<AcceleratorRecord>> {
        Ok(self.0.clone())
    }
}

/// Query whose tool runs but fails every time
pub struct FailingQuery(pub &'static str);

impl AcceleratorQuery for FailingQuery {
    fn tool_name(&self) -> &str {
        "failing"
    }

    fn enumerate(&self) -> Result<Vec<AcceleratorRecord>> {
        Err(GuardError::query_failed(self.0))
    }
}

/// Probe that behaves like the torch script on simulated hardware.
///
/// With `honor_restriction` off it ignores the visibility variable, which is
/// what a broken restrictor looks like from the runtime's side.
pub struct SimulatedProbe {
    pub hardware: Vec<AcceleratorRecord>,
    pub backend_available: bool,
    pub honor_restriction: bool,
    pub calls: RefCell<Vec<Option<u32>>>,
}

impl SimulatedProbe {
    pub fn new(hardware: Vec<AcceleratorRecord>) -> Self {
        Self {
            hardware,
            backend_available: true,
            honor_restriction: true,
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl ProbeRunner for SimulatedProbe {
    fn run(
        &self,
        restriction: Option<&RestrictionState>,
        expectation: &ProbeExpectation,
    ) -> Result<ProbeOutput> {
        self.calls.borrow_mut().push(restriction.map(|r| r.index()));

        if !self.backend_available {
            return Ok(ProbeOutput {
                exit_code: Some(EXIT_BACKEND_UNAVAILABLE),
                stdout: "backend_available=0\nprobe_error=torch reports CUDA unavailable\n".into(),
                stderr: String::new(),
            });
        }

        let visible: Vec<&AcceleratorRecord> = match restriction {
            Some(state) if self.honor_restriction => self
                .hardware
                .iter()
                .filter(|r| r.index == state.index())
                .collect(),
            _ => self.hardware.iter().collect(),
        };

        let mut stdout = format!("backend_available=1\ndevice_count={}\n", visible.len());
        for record in &visible {
            stdout.push_str(&format!("device_name={}\n", record.name));
        }

        let exit_code = match (&expectation.device_count, &expectation.token) {
            (Some(count), _) if *count != visible.len() => EXIT_DEVICE_COUNT,
            (_, Some(token))
                if !visible
                    .first()
                    .map(|r| r.name.to_lowercase().contains(&token.to_lowercase()))
                    .unwrap_or(false) =>
            {
                EXIT_IDENTITY
            }
            _ if visible.is_empty() => EXIT_BACKEND_UNAVAILABLE,
            _ => EXIT_OK,
        };

        Ok(ProbeOutput {
            exit_code: Some(exit_code),
            stdout,
            stderr: String::new(),
        })
    }
}

/// Records whether the workload was started
pub struct RecordingWorkload {
    pub exit_code: i32,
    pub started_with: RefCell<Option<String>>,
    pub starts: Cell<u32>,
}

impl RecordingWorkload {
    pub fn exiting_with(exit_code: i32) -> Self {
        Self {
            exit_code,
            started_with: RefCell::new(None),
            starts: Cell::new(0),
        }
    }
}

impl WorkloadRunner for RecordingWorkload {
    fn run(&self, _workload: &WorkloadSpec, restriction: &RestrictionState) -> Result<i32> {
        self.starts.set(self.starts.get() + 1);
        *self.started_with.borrow_mut() = Some(restriction.describe());
        Ok(self.exit_code)
    }
}

pub fn plan(policy: MatchPolicy) -> LaunchPlan {
    LaunchPlan {
        required_paths: Vec::new(),
        policy,
        visibility_var: "CUDA_VISIBLE_DEVICES".into(),
        device_order: Some("PCI_BUS_ID".into()),
        workload: WorkloadSpec {
            program: PathBuf::from("python3"),
            args: vec!["main.py".into()],
            working_dir: None,
        },
    }
}
