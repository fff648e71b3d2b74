use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::launcher::{LaunchPlan, WorkloadSpec};
use crate::core::resolver::MatchPolicy;
use crate::core::restriction::{DEFAULT_DEVICE_ORDER, DEFAULT_VISIBILITY_VAR};
use crate::error::GuardError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryBackend {
    #[default]
    NvidiaSmi,
    Nvml,
}

/// Launcher configuration, edited by hand before running.
///
/// Stored as JSON; every field is optional in the file and falls back to
/// the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Application checkout the workload runs in
    pub app_dir: PathBuf,
    /// Python interpreter used for the probe and the workload. A bare name
    /// is looked up on PATH, a relative path is taken from `app_dir`.
    pub interpreter: PathBuf,
    /// Entry script, relative to `app_dir`
    pub entry_script: PathBuf,
    pub workload_args: Vec<String>,
    /// Extra paths that must exist before anything runs
    pub required_paths: Vec<PathBuf>,
    /// Substring of the GPU name to pin, e.g. "5080"
    pub token: String,
    /// Explicit GPU index; skips name matching
    pub gpu_index: Option<u32>,
    pub fallback_to_first: bool,
    pub query_backend: QueryBackend,
    pub nvidia_smi: PathBuf,
    pub visibility_var: String,
    /// `None` leaves CUDA_DEVICE_ORDER untouched
    pub device_order: Option<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            app_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("genai-app"),
            interpreter: PathBuf::from("python3"),
            entry_script: PathBuf::from("main.py"),
            workload_args: Vec::new(),
            required_paths: Vec::new(),
            token: "5080".to_string(),
            gpu_index: None,
            fallback_to_first: false,
            query_backend: QueryBackend::NvidiaSmi,
            nvidia_smi: PathBuf::from("nvidia-smi"),
            visibility_var: DEFAULT_VISIBILITY_VAR.to_string(),
            device_order: Some(DEFAULT_DEVICE_ORDER.to_string()),
        }
    }
}

impl GuardConfig {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing or empty file yields the defaults. A file that does not
    /// parse is an error: guessing here could pin the wrong GPU.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        if !config_path.exists() {
            log::debug!("No config at {:?}, using defaults", config_path);
            return Ok(Self::default());
        }

        let data = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, data + "\n")
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("gpu-guard").join("config.json"))
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        // The restricted check compares the visible GPU against the token,
        // even when gpu_index pins the index.
        if self.token.trim().is_empty() {
            return Err(GuardError::config(
                "token is empty; the pinned GPU's name cannot be verified",
            ));
        }
        if self.visibility_var.trim().is_empty() {
            return Err(GuardError::config("visibility_var must not be empty"));
        }
        Ok(())
    }

    pub fn policy(&self) -> MatchPolicy {
        MatchPolicy {
            token: self.token.trim().to_string(),
            override_index: self.gpu_index,
            fallback_to_first: self.fallback_to_first,
        }
    }

    /// Interpreter to execute.
    ///
    /// Bare names go through PATH; an unresolvable name is reported as the
    /// missing path.
    pub fn interpreter_path(&self) -> crate::error::Result<PathBuf> {
        let is_bare_name = self.interpreter.components().count() == 1
            && !self.interpreter.is_absolute();

        if is_bare_name {
            which::which(&self.interpreter)
                .map_err(|_| GuardError::PathMissing(self.interpreter.clone()))
        } else if self.interpreter.is_absolute() {
            Ok(self.interpreter.clone())
        } else {
            Ok(self.app_dir.join(&self.interpreter))
        }
    }

    pub fn entry_script_path(&self) -> PathBuf {
        self.app_dir.join(&self.entry_script)
    }

    /// Build the launch plan: workload command plus the paths that must exist
    pub fn launch_plan(&self) -> crate::error::Result<LaunchPlan> {
        self.validate()?;

        let interpreter = self.interpreter_path()?;
        let entry_script = self.entry_script_path();

        let mut required_paths = vec![self.app_dir.clone(), interpreter.clone(), entry_script.clone()];
        required_paths.extend(self.required_paths.iter().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                self.app_dir.join(p)
            }
        }));

        let mut args = vec![entry_script.to_string_lossy().to_string()];
        args.extend(self.workload_args.iter().cloned());

        Ok(LaunchPlan {
            required_paths,
            policy: self.policy(),
            visibility_var: self.visibility_var.clone(),
            device_order: self.device_order.clone(),
            workload: WorkloadSpec {
                program: interpreter,
                args,
                working_dir: Some(self.app_dir.clone()),
            },
        })
    }
}
