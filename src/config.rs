// config.rs - User-facing pass configuration
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::workgroup::WorkgroupSize;
use crate::error::{PassError, Result};
use crate::traits::backend::ComputeProgram;

/// Settings exposed to whoever places the pass in a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassConfig {
    /// Path to the WGSL compute program asset
    pub program: Option<PathBuf>,
    /// When false the pass records nothing
    pub active: bool,
    /// Local size the program's kernel runs with
    pub workgroup_size: WorkgroupSize,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            program: None,
            active: true,
            workgroup_size: WorkgroupSize::default(),
        }
    }
}

impl PassConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read the configured WGSL asset, if any
    pub fn load_program(&self) -> Result<Option<ComputeProgram>> {
        let Some(path) = &self.program else {
            return Ok(None);
        };
        let source = std::fs::read_to_string(path).map_err(|e| {
            PassError::config(format!("failed to read program {:?}: {}", path, e))
        })?;
        let label = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "program".to_string());
        Ok(Some(ComputeProgram::wgsl(label, source)))
    }
}
