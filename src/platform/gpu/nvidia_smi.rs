use crate::core::accelerator::{AcceleratorQuery, AcceleratorRecord};
use crate::error::{GuardError, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Command;

const QUERY_FIELDS: &str = "--query-gpu=index,name,uuid";
const QUERY_FORMAT: &str = "--format=csv,noheader";

/// Enumerates GPUs through `nvidia-smi`'s CSV query mode
#[derive(Debug, Clone)]
pub struct NvidiaSmiQuery {
    binary: PathBuf,
}

impl NvidiaSmiQuery {
    pub fn new<P: Into<PathBuf>>(binary: P) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Resolve the configured binary (bare name or path) to an executable
    fn locate(&self) -> Result<PathBuf> {
        which::which(&self.binary).map_err(|e| {
            GuardError::tool_unavailable(format!("{}: {}", self.binary.display(), e))
        })
    }

    /// Human-readable `nvidia-smi -L` listing.
    ///
    /// For display only; selection never parses this.
    pub fn listing(&self) -> Result<String> {
        let output = Command::new(self.locate()?).arg("-L").output().map_err(|e| {
            GuardError::tool_unavailable(format!("failed to execute {}: {}", self.binary.display(), e))
        })?;

        if !output.status.success() {
            return Err(query_failure(&output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for NvidiaSmiQuery {
    fn default() -> Self {
        Self::new("nvidia-smi")
    }
}

impl AcceleratorQuery for NvidiaSmiQuery {
    fn tool_name(&self) -> &str {
        "nvidia-smi"
    }

    fn enumerate(&self) -> Result<Vec<AcceleratorRecord>> {
        let binary = self.locate()?;

        let output = Command::new(&binary)
            .args([QUERY_FIELDS, QUERY_FORMAT])
            .output()
            .map_err(|e| {
                GuardError::tool_unavailable(format!("failed to execute {}: {}", binary.display(), e))
            })?;

        if !output.status.success() {
            return Err(query_failure(&output));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|_| GuardError::query_failed("nvidia-smi output was not UTF-8"))?;
        log::debug!("nvidia-smi output:\n{}", stdout.trim_end());

        parse_query_output(&stdout)
    }
}

fn query_failure(output: &std::process::Output) -> GuardError {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    // nvidia-smi prints driver errors to stdout
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let detail = if !stderr.is_empty() {
        stderr
    } else if !stdout.is_empty() {
        stdout
    } else {
        "no output".to_string()
    };
    GuardError::query_failed(format!("nvidia-smi exited with {}: {}", output.status, detail))
}

/// Parse `index, name, uuid` rows.
///
/// Names may themselves contain commas, so the index is the first column,
/// the uuid the last one when it looks like a GPU/MIG uuid, and everything
/// in between is the name.
pub fn parse_query_output(raw: &str) -> Result<Vec<AcceleratorRecord>> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for (line_idx, raw_line) in raw.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        // Split off the outer columns only, so the name keeps its own spacing
        let (index_column, rest) = line.split_once(',').ok_or_else(|| {
            GuardError::query_failed(format!(
                "unexpected nvidia-smi output at line {}: '{}'",
                line_idx + 1,
                line
            ))
        })?;

        let index = index_column.trim().parse::<u32>().map_err(|_| {
            GuardError::query_failed(format!(
                "invalid GPU index '{}' at line {}",
                index_column.trim(),
                line_idx + 1
            ))
        })?;

        let (name, uuid) = match rest.rsplit_once(',') {
            Some((head, last)) if is_uuid_column(last.trim()) => (head.trim(), uuid_value(last.trim())),
            _ => (rest.trim(), None),
        };
        let name = name.to_string();
        if name.is_empty() {
            return Err(GuardError::query_failed(format!(
                "missing GPU name at line {}",
                line_idx + 1
            )));
        }

        if !seen.insert(index) {
            return Err(GuardError::query_failed(format!(
                "duplicate GPU index {} at line {}",
                index,
                line_idx + 1
            )));
        }

        records.push(AcceleratorRecord { index, name, uuid });
    }

    Ok(records)
}

fn is_uuid_column(value: &str) -> bool {
    value.starts_with("GPU-") || value.starts_with("MIG-") || value == "[N/A]"
}

fn uuid_value(value: &str) -> Option<String> {
    if value == "[N/A]" {
        None
    } else {
        Some(value.to_string())
    }
}
