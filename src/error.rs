use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Which probe run a runtime failure came from.
///
/// The unrestricted run answers "can the backend see any GPU at all", the
/// restricted run answers "does it see exactly the one we picked". Keeping
/// them apart tells a driver problem from a selection problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePhase {
    Unrestricted,
    Restricted,
}

impl fmt::Display for ProbePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbePhase::Unrestricted => write!(f, "unrestricted"),
            ProbePhase::Restricted => write!(f, "restricted"),
        }
    }
}

/// Custom error type for the accelerator selection guard
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Required path is missing: {}", .0.display())]
    PathMissing(PathBuf),

    #[error("GPU query tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("GPU query failed: {0}")]
    QueryFailed(String),

    #[error("No GPU name contains '{token}' ({available})")]
    NoMatch { token: String, available: String },

    #[error("{} GPUs match '{token}': {}", .candidates.len(), .candidates.join(", "))]
    AmbiguousMatch {
        token: String,
        candidates: Vec<String>,
    },

    #[error("Fallback to GPU 0 refused: {0}")]
    FallbackRefused(String),

    #[error("Accelerator backend unavailable ({phase} probe): {detail}")]
    BackendUnavailable { phase: ProbePhase, detail: String },

    #[error("Restriction not enforced: expected exactly 1 visible GPU, probe saw {observed}")]
    UnexpectedDeviceCount { observed: usize },

    #[error("Visible GPU '{observed}' does not contain '{token}'")]
    IdentityMismatch { token: String, observed: String },

    #[error("Workload exited with status {0}")]
    WorkloadNonZeroExit(i32),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for the guard
pub type Result<T> = std::result::Result<T, GuardError>;

impl GuardError {
    pub fn tool_unavailable<S: Into<String>>(msg: S) -> Self {
        GuardError::ToolUnavailable(msg.into())
    }

    pub fn query_failed<S: Into<String>>(msg: S) -> Self {
        GuardError::QueryFailed(msg.into())
    }

    pub fn fallback_refused<S: Into<String>>(msg: S) -> Self {
        GuardError::FallbackRefused(msg.into())
    }

    pub fn backend_unavailable<S: Into<String>>(phase: ProbePhase, detail: S) -> Self {
        GuardError::BackendUnavailable {
            phase,
            detail: detail.into(),
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        GuardError::Config(msg.into())
    }

    /// Process exit status for this failure class.
    ///
    /// A failed workload forwards its own status untouched.
    pub fn exit_code(&self) -> i32 {
        match self {
            GuardError::Config(_) | GuardError::Io(_) => 1,
            GuardError::PathMissing(_) => 2,
            GuardError::ToolUnavailable(_) => 3,
            GuardError::QueryFailed(_) => 4,
            GuardError::NoMatch { .. }
            | GuardError::AmbiguousMatch { .. }
            | GuardError::FallbackRefused(_) => 5,
            GuardError::BackendUnavailable {
                phase: ProbePhase::Unrestricted,
                ..
            } => 6,
            GuardError::BackendUnavailable {
                phase: ProbePhase::Restricted,
                ..
            }
            | GuardError::UnexpectedDeviceCount { .. }
            | GuardError::IdentityMismatch { .. } => 7,
            GuardError::WorkloadNonZeroExit(code) => *code,
        }
    }

    /// Short operator hint printed under the diagnostic line
    pub fn remedy(&self) -> Option<&'static str> {
        match self {
            GuardError::PathMissing(_) => {
                Some("Check app_dir, interpreter and required_paths in the config file")
            }
            GuardError::ToolUnavailable(_) => {
                Some("Install the NVIDIA driver utilities or set nvidia_smi to the full binary path")
            }
            GuardError::QueryFailed(_) => Some("Run 'nvidia-smi' by hand to inspect the driver state"),
            GuardError::NoMatch { .. } => {
                Some("Fix the token, or set gpu_index in the config to pin an explicit index")
            }
            GuardError::AmbiguousMatch { .. } => {
                Some("Use a more specific token, or set gpu_index in the config to pin an explicit index")
            }
            GuardError::FallbackRefused(_) => {
                Some("Set gpu_index in the config to pin an explicit index")
            }
            GuardError::BackendUnavailable { .. } => {
                Some("Check that the interpreter's torch build has CUDA support and the driver is loaded")
            }
            GuardError::UnexpectedDeviceCount { .. } => {
                Some("Check that nothing overrides CUDA_VISIBLE_DEVICES for the workload")
            }
            GuardError::IdentityMismatch { .. } => Some(
                "Driver and runtime disagree on GPU order; keep device_order set to PCI_BUS_ID",
            ),
            GuardError::WorkloadNonZeroExit(_) | GuardError::Config(_) | GuardError::Io(_) => None,
        }
    }
}
