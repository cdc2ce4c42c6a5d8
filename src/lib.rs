pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod traits;

/// Entry point every compute program must expose
pub const KERNEL_ENTRY_POINT: &str = "CSMain";

/// Name of the output image the frame surface is bound to
pub const RESULT_BINDING: &str = "Result";

/// Bundled demo kernel: a UV gradient with a workgroup-size template
pub const GRADIENT_WGSL: &str = include_str!("gradient.wgsl");

pub use config::PassConfig;
pub use error::{PassError, Result};
