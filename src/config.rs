//! Configuration for the pipeline toolchain.
//!
//! Describes where the native stages and their settings files are installed,
//! plus per-family options. Every location defaults to the conventional
//! install layout under a single root:
//!
//! ```text
//! <root>/bin/{scan_chunker,filter_urg_scans,oct2dq,floorplan_gen,depth_maps}
//! <root>/config/procarve/procarve_settings.xml
//! <root>/config/oct2dq/oct2dq_settings.xml
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Install layout (executables and settings files)
    #[serde(default)]
    pub install: InstallConfig,

    /// Executable file names inside the binary directory
    #[serde(default)]
    pub executables: ExecutableNames,

    /// Laser scan filtering options
    #[serde(default)]
    pub filtering: FilteringConfig,

    /// Depth and normal map options
    #[serde(default)]
    pub depth_maps: DepthMapConfig,

    /// Optional path to save run metrics JSON after each command
    #[serde(default)]
    pub metrics_output_path: Option<PathBuf>,
}

/// Install layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Install root. When unset it is derived from the running executable
    /// (the parent of its `bin/` directory).
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Directory holding the native stage executables (default: `<root>/bin`)
    #[serde(default)]
    pub bin_dir: Option<PathBuf>,

    /// Chunker settings file (default: `<root>/config/procarve/procarve_settings.xml`)
    #[serde(default)]
    pub procarve_settings: Option<PathBuf>,

    /// oct2dq settings file (default: `<root>/config/oct2dq/oct2dq_settings.xml`)
    #[serde(default)]
    pub oct2dq_settings: Option<PathBuf>,
}

/// Executable names of the native stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutableNames {
    #[serde(default = "default_scan_chunker")]
    pub scan_chunker: String,

    #[serde(default = "default_filter_urg_scans")]
    pub filter_urg_scans: String,

    #[serde(default = "default_oct2dq")]
    pub oct2dq: String,

    #[serde(default = "default_floorplan_gen")]
    pub floorplan_gen: String,

    #[serde(default = "default_depth_maps")]
    pub depth_maps: String,
}

impl Default for ExecutableNames {
    fn default() -> Self {
        Self {
            scan_chunker: default_scan_chunker(),
            filter_urg_scans: default_filter_urg_scans(),
            oct2dq: default_oct2dq(),
            floorplan_gen: default_floorplan_gen(),
            depth_maps: default_depth_maps(),
        }
    }
}

/// What to do when one laser fails filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failing sensor
    #[default]
    FailFast,
    /// Filter every sensor, then report the first failure
    Exhaustive,
}

/// Laser scan filtering configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilteringConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

/// Depth and normal map configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthMapConfig {
    /// Surface model to render (default: the dataset's carved mesh)
    #[serde(default)]
    pub model_file: Option<PathBuf>,

    /// Maximum rendering depth in meters
    #[serde(default = "default_depth")]
    pub depth: f64,

    /// Worker threads passed to the stage
    #[serde(default)]
    pub threads: Option<usize>,

    /// Image downsampling factor passed to the stage
    #[serde(default)]
    pub downsample: Option<u32>,

    /// Named localization run whose camera poses to use
    #[serde(default)]
    pub localization_name: Option<String>,
}

impl Default for DepthMapConfig {
    fn default() -> Self {
        Self {
            model_file: None,
            depth: default_depth(),
            threads: None,
            downsample: None,
            localization_name: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML or JSON file.
    /// Format is auto-detected from file extension (.yaml, .yml, or .json).
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Config = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&contents)?,
            "json" => serde_json::from_str(&contents)?,
            _ => {
                // Try YAML first (it's a superset of JSON)
                serde_yaml::from_str(&contents)?
            }
        };
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        let names = [
            ("scan_chunker", &self.executables.scan_chunker),
            ("filter_urg_scans", &self.executables.filter_urg_scans),
            ("oct2dq", &self.executables.oct2dq),
            ("floorplan_gen", &self.executables.floorplan_gen),
            ("depth_maps", &self.executables.depth_maps),
        ];
        for (stage, name) in names {
            if name.trim().is_empty() {
                anyhow::bail!("Executable name for {} must not be empty", stage);
            }
        }
        if !(self.depth_maps.depth.is_finite() && self.depth_maps.depth > 0.0) {
            anyhow::bail!("Depth map depth must be > 0");
        }
        if self.depth_maps.threads == Some(0) {
            anyhow::bail!("Depth map threads must be > 0");
        }
        if self.depth_maps.downsample == Some(0) {
            anyhow::bail!("Depth map downsample must be > 0");
        }
        if matches!(&self.depth_maps.localization_name, Some(n) if n.contains(['/', '\\'])) {
            anyhow::bail!("Localization name must be a single path component");
        }
        Ok(())
    }

    /// Resolve the install layout once, filling unset locations from the
    /// install root. Without an explicit root, the root is the parent of the
    /// directory containing the running executable.
    pub fn toolchain(&self) -> anyhow::Result<Toolchain> {
        let root = match &self.install.root {
            Some(root) => std::path::absolute(root)?,
            None => default_install_root()?,
        };
        Ok(Toolchain::from_config(self, &root))
    }
}

/// Resolved install layout handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub root: PathBuf,
    pub bin_dir: PathBuf,
    pub procarve_settings: PathBuf,
    pub oct2dq_settings: PathBuf,
    pub executables: ResolvedExecutables,
}

/// Absolute paths of the native stage executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExecutables {
    pub scan_chunker: PathBuf,
    pub filter_urg_scans: PathBuf,
    pub oct2dq: PathBuf,
    pub floorplan_gen: PathBuf,
    pub depth_maps: PathBuf,
}

impl Toolchain {
    /// Layout for `root`, with overrides from `config`.
    pub fn from_config(config: &Config, root: &Path) -> Self {
        let install = &config.install;
        let under_root = |p: &Option<PathBuf>, default: &[&str]| -> PathBuf {
            match p {
                Some(p) if p.is_absolute() => p.clone(),
                Some(p) => root.join(p),
                None => default.iter().fold(root.to_path_buf(), |acc, c| acc.join(c)),
            }
        };

        let bin_dir = under_root(&install.bin_dir, &["bin"]);
        let procarve_settings = under_root(
            &install.procarve_settings,
            &["config", "procarve", "procarve_settings.xml"],
        );
        let oct2dq_settings = under_root(
            &install.oct2dq_settings,
            &["config", "oct2dq", "oct2dq_settings.xml"],
        );

        let names = &config.executables;
        let executables = ResolvedExecutables {
            scan_chunker: bin_dir.join(&names.scan_chunker),
            filter_urg_scans: bin_dir.join(&names.filter_urg_scans),
            oct2dq: bin_dir.join(&names.oct2dq),
            floorplan_gen: bin_dir.join(&names.floorplan_gen),
            depth_maps: bin_dir.join(&names.depth_maps),
        };

        Self {
            root: root.to_path_buf(),
            bin_dir,
            procarve_settings,
            oct2dq_settings,
            executables,
        }
    }
}

fn default_install_root() -> anyhow::Result<PathBuf> {
    use anyhow::Context;

    let exe = std::env::current_exe().context("Unable to locate the running executable")?;
    let exe_dir = exe
        .parent()
        .context("Running executable has no parent directory")?;
    Ok(exe_dir.parent().unwrap_or(exe_dir).to_path_buf())
}

// Default value functions for serde
fn default_scan_chunker() -> String { "scan_chunker".to_string() }
fn default_filter_urg_scans() -> String { "filter_urg_scans".to_string() }
fn default_oct2dq() -> String { "oct2dq".to_string() }
fn default_floorplan_gen() -> String { "floorplan_gen".to_string() }
fn default_depth_maps() -> String { "depth_maps".to_string() }
fn default_depth() -> f64 { 10.0 }
