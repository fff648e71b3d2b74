use crate::error::Result;
use std::fmt;

/// One GPU as reported by the driver query tool.
///
/// `index` is driver-assigned and may change across reboots, so records are
/// rebuilt on every query and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceleratorRecord {
    pub index: u32,
    pub name: String,
    pub uuid: Option<String>,
}

impl AcceleratorRecord {
    pub fn new<S: Into<String>>(index: u32, name: S) -> Self {
        Self {
            index,
            name: name.into(),
            uuid: None,
        }
    }

    pub fn with_uuid<S: Into<String>>(mut self, uuid: S) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    /// Case-insensitive substring test against the name.
    ///
    /// A blank token never matches.
    pub fn matches(&self, token: &str) -> bool {
        name_contains(&self.name, token)
    }
}

impl fmt::Display for AcceleratorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.index, self.name)
    }
}

/// Shared predicate for resolver and verifier
pub fn name_contains(name: &str, token: &str) -> bool {
    let token = token.trim();
    if token.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&token.to_lowercase())
}

/// Source of the GPU enumeration.
///
/// Implementations live in the platform layer (nvidia-smi, NVML). Every call
/// must hit the tool again; hardware and driver state can change between runs.
pub trait AcceleratorQuery {
    /// Short name used in logs
    fn tool_name(&self) -> &str;

    /// Query the current GPU list
    fn enumerate(&self) -> Result<Vec<AcceleratorRecord>>;
}
