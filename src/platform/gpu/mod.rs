//! GPU enumeration backends.
//!
//! nvidia-smi (CSV query mode) is the default; NVML is available behind the
//! `nvml` feature.

mod nvidia_smi;
mod nvml;

pub use nvidia_smi::{parse_query_output, NvidiaSmiQuery};
pub use nvml::NvmlQuery;

use crate::core::accelerator::AcceleratorQuery;
use crate::core::config::{GuardConfig, QueryBackend};

/// Build the query backend selected in the config
pub fn query_for(config: &GuardConfig) -> Box<dyn AcceleratorQuery> {
    match config.query_backend {
        QueryBackend::NvidiaSmi => Box::new(NvidiaSmiQuery::new(&config.nvidia_smi)),
        QueryBackend::Nvml => Box::new(NvmlQuery::new()),
    }
}
