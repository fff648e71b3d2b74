// Core business logic module

pub mod accelerator;
pub mod config;
pub mod launcher;
pub mod resolver;
pub mod restriction;
pub mod verifier;

// Re-export commonly used items
pub use accelerator::{AcceleratorQuery, AcceleratorRecord};
pub use config::{GuardConfig, QueryBackend};
pub use launcher::{
    GuardedLauncher, LaunchMode, LaunchOutcome, LaunchPlan, LaunchState, WorkloadRunner,
    WorkloadSpec,
};
pub use resolver::{resolve, MatchPolicy, Resolution, ResolutionResult, ResolutionSource};
pub use restriction::RestrictionState;
pub use verifier::{
    probe_unrestricted, verify, ProbeExpectation, ProbeOutput, ProbeRunner, PythonProbe,
    VerificationReport,
};
