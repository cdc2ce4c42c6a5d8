use std::fmt;

use serde::{Deserialize, Serialize};

use super::viewport::Viewport;
use crate::error::{PassError, Result};

/// Default local size, matching the 8x8x1 kernels this pass was written for.
pub const DEFAULT_WORKGROUP_SIZE: u32 = 8;

/// Local thread-group size a compute program was compiled with.
///
/// The dispatch arithmetic divides by this, so it has to agree with the
/// `@workgroup_size` of the kernel. The wgpu backend substitutes it into the
/// shader source to keep the two in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
    #[serde(default = "default_z")]
    pub z: u32,
}

fn default_z() -> u32 {
    1
}

impl Default for WorkgroupSize {
    fn default() -> Self {
        Self::new(DEFAULT_WORKGROUP_SIZE, DEFAULT_WORKGROUP_SIZE, 1)
    }
}

impl WorkgroupSize {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Total invocations per workgroup
    pub fn total(&self) -> u32 {
        self.x.saturating_mul(self.y).saturating_mul(self.z)
    }

    /// Check against device limits. Zero axes are always rejected.
    pub fn validate(&self, limits: &WorkgroupLimits) -> Result<()> {
        let invalid = |reason: String| PassError::InvalidWorkgroupSize {
            size: *self,
            reason,
        };

        if self.x == 0 || self.y == 0 || self.z == 0 {
            return Err(invalid("every axis must be non-zero".into()));
        }
        if self.x > limits.max_size_x || self.y > limits.max_size_y || self.z > limits.max_size_z {
            return Err(invalid(format!(
                "axis limit is {}x{}x{}",
                limits.max_size_x, limits.max_size_y, limits.max_size_z
            )));
        }
        if self.total() > limits.max_invocations {
            return Err(invalid(format!(
                "{} invocations exceed the limit of {}",
                self.total(),
                limits.max_invocations
            )));
        }
        Ok(())
    }

    /// Placeholder substitutions for WGSL templates
    pub fn substitutions(&self) -> [(&'static str, u32); 3] {
        [
            ("{{WORKGROUP_X}}", self.x),
            ("{{WORKGROUP_Y}}", self.y),
            ("{{WORKGROUP_Z}}", self.z),
        ]
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

/// Compute limits reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupLimits {
    pub max_size_x: u32,
    pub max_size_y: u32,
    pub max_size_z: u32,
    pub max_invocations: u32,
}

impl Default for WorkgroupLimits {
    /// WebGPU baseline limits
    fn default() -> Self {
        Self {
            max_size_x: 256,
            max_size_y: 256,
            max_size_z: 64,
            max_invocations: 256,
        }
    }
}

impl From<&wgpu::Limits> for WorkgroupLimits {
    fn from(limits: &wgpu::Limits) -> Self {
        Self {
            max_size_x: limits.max_compute_workgroup_size_x,
            max_size_y: limits.max_compute_workgroup_size_y,
            max_size_z: limits.max_compute_workgroup_size_z,
            max_invocations: limits.max_compute_invocations_per_workgroup,
        }
    }
}

/// Number of thread groups to dispatch along each axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl DispatchSize {
    /// Smallest grid of groups covering every pixel of the viewport.
    /// Always a single group deep.
    pub fn cover(viewport: Viewport, workgroup: WorkgroupSize) -> Self {
        Self {
            x: viewport.width.div_ceil(workgroup.x),
            y: viewport.height.div_ceil(workgroup.y),
            z: 1,
        }
    }

    pub fn total_groups(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}
