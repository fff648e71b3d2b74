#[cfg(feature = "nvml")]
use nvml_wrapper::Nvml;

use crate::core::accelerator::{AcceleratorQuery, AcceleratorRecord};
use crate::error::{GuardError, Result};

/// Enumerates GPUs through NVML.
///
/// NVML numbers devices in PCI bus order, the same order nvidia-smi uses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NvmlQuery;

impl NvmlQuery {
    pub fn new() -> Self {
        Self
    }
}

impl AcceleratorQuery for NvmlQuery {
    fn tool_name(&self) -> &str {
        "NVML"
    }

    fn enumerate(&self) -> Result<Vec<AcceleratorRecord>> {
        #[cfg(feature = "nvml")]
        {
            let nvml = Nvml::init()
                .map_err(|e| GuardError::tool_unavailable(format!("Failed to init NVML: {}", e)))?;

            let count = nvml
                .device_count()
                .map_err(|e| GuardError::query_failed(format!("Failed to get device count: {}", e)))?;

            let mut records = Vec::with_capacity(count as usize);
            for i in 0..count {
                let device = nvml.device_by_index(i).map_err(|e| {
                    GuardError::query_failed(format!("GPU {} not accessible: {}", i, e))
                })?;

                let name = device.name().map_err(|e| {
                    GuardError::query_failed(format!("Failed to read name of GPU {}: {}", i, e))
                })?;

                records.push(AcceleratorRecord {
                    index: device.index().unwrap_or(i),
                    name,
                    uuid: device.uuid().ok(),
                });
            }

            Ok(records)
        }
        #[cfg(not(feature = "nvml"))]
        {
            Err(GuardError::tool_unavailable(
                "NVML support not enabled (rebuild with --features nvml)",
            ))
        }
    }
}
