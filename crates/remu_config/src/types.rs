//! Configuration types deserialized from `remu.toml`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default number of bits shifted per cycle on the flip-flop chain.
pub const DEFAULT_FF_WIDTH: u32 = 64;
/// Default number of bits shifted per cycle on the memory chain.
pub const DEFAULT_RAM_WIDTH: u32 = 32;
/// Largest accepted scan width.
pub const MAX_SCAN_WIDTH: u32 = 4096;

/// The top-level project configuration parsed from `remu.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Project metadata and the input netlist.
    pub project: ProjectMeta,
    /// Scan chain geometry.
    #[serde(default)]
    pub scan: ScanConfig,
    /// Output locations.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Project metadata and the input netlist location.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project name, used for default output file names.
    pub name: String,
    /// Path to the elaborated JSON netlist, relative to the project directory.
    pub netlist: String,
    /// Root module name. Overrides the top recorded in the netlist.
    #[serde(default)]
    pub top: Option<String>,
}

/// Scan chain geometry, fixed for an entire compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ScanConfig {
    /// Bits shifted per cycle on the flip-flop chain.
    #[serde(default = "default_ff_width")]
    pub ff_width: u32,
    /// Bits shifted per cycle on the memory chain.
    #[serde(default = "default_ram_width")]
    pub ram_width: u32,
}

fn default_ff_width() -> u32 {
    DEFAULT_FF_WIDTH
}

fn default_ram_width() -> u32 {
    DEFAULT_RAM_WIDTH
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ff_width: DEFAULT_FF_WIDTH,
            ram_width: DEFAULT_RAM_WIDTH,
        }
    }
}

impl ScanConfig {
    /// Creates a scan configuration with explicit widths.
    pub fn new(ff_width: u32, ram_width: u32) -> Self {
        Self {
            ff_width,
            ram_width,
        }
    }
}

/// Where the instrumented netlist and the scan map are written.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Output netlist path. Defaults to `build/<name>_scan.json`.
    #[serde(default)]
    pub netlist: Option<String>,
    /// Scan map path. A `.json` extension selects JSON, anything else the
    /// line-oriented text format. Defaults to `build/<name>.scanmap`.
    #[serde(default)]
    pub scanmap: Option<String>,
}

impl ProjectConfig {
    /// Resolves the input netlist path against the project directory.
    pub fn netlist_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.project.netlist)
    }

    /// Resolves the output netlist path against the project directory.
    pub fn output_netlist_path(&self, project_dir: &Path) -> PathBuf {
        match &self.output.netlist {
            Some(path) => project_dir.join(path),
            None => project_dir
                .join("build")
                .join(format!("{}_scan.json", self.project.name)),
        }
    }

    /// Resolves the scan map path against the project directory.
    pub fn scanmap_path(&self, project_dir: &Path) -> PathBuf {
        match &self.output.scanmap {
            Some(path) => project_dir.join(path),
            None => project_dir
                .join("build")
                .join(format!("{}.scanmap", self.project.name)),
        }
    }
}
