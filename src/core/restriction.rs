use std::process::Command;

/// Variable the CUDA runtime reads to limit visible devices
pub const DEFAULT_VISIBILITY_VAR: &str = "CUDA_VISIBLE_DEVICES";

/// Makes runtime ordinals follow PCI bus order, the same order nvidia-smi uses
pub const DEFAULT_DEVICE_ORDER: &str = "PCI_BUS_ID";

const DEVICE_ORDER_VAR: &str = "CUDA_DEVICE_ORDER";

/// Environment assignments that expose a single GPU to one child process.
///
/// The state is only ever applied to a `Command`; the guard's own
/// environment is never touched, so nothing leaks back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictionState {
    index: u32,
    vars: Vec<(String, String)>,
}

impl RestrictionState {
    /// Build the restriction for `index`.
    ///
    /// `device_order` of `None` leaves `CUDA_DEVICE_ORDER` to whatever the
    /// child inherits.
    pub fn for_index(index: u32, visibility_var: &str, device_order: Option<&str>) -> Self {
        let mut vars = Vec::with_capacity(2);
        if let Some(order) = device_order {
            vars.push((DEVICE_ORDER_VAR.to_string(), order.to_string()));
        }
        vars.push((visibility_var.to_string(), index.to_string()));
        Self { index, vars }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    /// Set the variables on `cmd` only
    pub fn apply(&self, cmd: &mut Command) {
        cmd.envs(self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    /// `KEY=VALUE` pairs for log lines
    pub fn describe(&self) -> String {
        self.vars
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
