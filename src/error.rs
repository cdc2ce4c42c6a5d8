//! Central error type for the compute pass and its backends.
//!
//! Every fault here is fatal to the current frame or pass. Nothing in this
//! crate retries; the host decides what to do with a returned error.

use crate::core::workgroup::WorkgroupSize;

pub type Result<T> = std::result::Result<T, PassError>;

#[derive(thiserror::Error, Debug)]
pub enum PassError {
    #[error("no compute program assigned to the pass")]
    MissingProgram,

    #[error("kernel '{entry_point}' not found in compute program '{program}'")]
    KernelNotFound { program: String, entry_point: String },

    #[error("kernel {kernel} has no binding named '{name}'")]
    UnknownBinding { kernel: usize, name: String },

    #[error("invalid surface size {width}x{height}")]
    InvalidSurfaceSize { width: u32, height: u32 },

    #[error("invalid workgroup size {size}: {reason}")]
    InvalidWorkgroupSize { size: WorkgroupSize, reason: String },

    #[error("pass executed before setup resolved its kernel")]
    NotInitialized,

    #[error("pass volume has already been torn down")]
    TornDown,

    #[error("setup of {pass} failed earlier: {reason}")]
    SetupFailed { pass: String, reason: String },

    #[error("surface was not allocated by this backend")]
    UnknownSurface,

    #[error("device error: {0}")]
    Device(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PassError {
    pub fn device<T: ToString>(msg: T) -> Self {
        PassError::Device(msg.to_string())
    }

    pub fn config<T: ToString>(msg: T) -> Self {
        PassError::Config(msg.to_string())
    }
}

impl From<serde_json::Error> for PassError {
    fn from(e: serde_json::Error) -> Self {
        PassError::Config(e.to_string())
    }
}
