// cli.rs - Command-line interface configuration
use std::path::PathBuf;

use clap::Parser;

use crate::config::PassConfig;
use crate::core::viewport::Viewport;
use crate::core::workgroup::WorkgroupSize;

#[derive(Parser, Debug, Clone)]
#[command(name = "compute-pass")]
#[command(about = "Run a compute-then-composite pass over a sequence of camera sizes", long_about = None)]
pub struct Cli {
    /// JSON pass configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// WGSL compute program (overrides the config; defaults to the bundled gradient)
    #[arg(long)]
    pub shader: Option<PathBuf>,

    /// Comma separated camera sizes, one frame each
    #[arg(long, value_delimiter = ',', default_values = ["800x600", "800x600", "1920x1080"])]
    pub sizes: Vec<Viewport>,

    /// Start with the pass deactivated
    #[arg(long)]
    pub inactive: bool,

    /// Workgroup size as XxY
    #[arg(long, value_parser = parse_workgroup)]
    pub workgroup: Option<WorkgroupSize>,

    /// Disable console output
    #[arg(long = "no-ui", default_value = "false")]
    pub no_ui: bool,
}

impl Cli {
    /// Fold command-line overrides into a base configuration
    pub fn apply(&self, mut config: PassConfig) -> PassConfig {
        if let Some(shader) = &self.shader {
            config.program = Some(shader.clone());
        }
        if self.inactive {
            config.active = false;
        }
        if let Some(ws) = self.workgroup {
            config.workgroup_size = ws;
        }
        config
    }
}

fn parse_workgroup(s: &str) -> Result<WorkgroupSize, String> {
    let vp: Viewport = s.parse()?;
    Ok(WorkgroupSize::new(vp.width, vp.height, 1))
}
