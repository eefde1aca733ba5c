//! Backpack Reconstruction Pipeline CLI
//!
//! Runs the native reconstruction stages over a captured dataset.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use backpack_pipeline::{
    Config, FamilyReport, Orchestrator, PipelineError, ProcessRunner, StepResult,
};

#[derive(Parser)]
#[command(name = "backpack-pipeline")]
#[command(about = "Run the backpack reconstruction stages over a dataset", long_about = None)]
struct Cli {
    /// Path to configuration file (YAML or JSON). Built-in defaults when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the toolchain install root
    #[arg(long, global = true)]
    install_root: Option<PathBuf>,

    /// Write run metrics as JSON to this path
    #[arg(long, global = true)]
    metrics_output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Partition the carving into chunks with scan_chunker
    Chunk {
        /// Dataset directory
        dataset: PathBuf,
    },

    /// Filter every laser's raw scans with filter_urg_scans
    FilterScans {
        /// Dataset directory
        dataset: PathBuf,
    },

    /// Convert the carved octree into a dq file and a floorplan
    Oct2fp {
        /// Dataset directory
        dataset: PathBuf,

        /// Path file (.mad) of the dataset
        madfile: PathBuf,
    },

    /// Render depth and normal maps for every camera
    DepthMaps {
        /// Dataset directory
        dataset: PathBuf,
    },

    /// Run every family in order: filter-scans, chunk, oct2fp, depth-maps
    RunAll {
        /// Dataset directory
        dataset: PathBuf,

        /// Path file (.mad) of the dataset
        madfile: PathBuf,
    },

    /// Validate configuration and check the toolchain install
    Validate,

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "pipeline.yaml")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    if let Err(err) = run(cli) {
        let code = match err.downcast_ref::<PipelineError>() {
            Some(failure) => failure.code(),
            None => 1,
        };
        tracing::error!("{:#}", err);
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Chunk { ref dataset } => {
            run_family(&cli, |o| Ok(vec![o.generate_chunks(dataset)?]))
        }

        Commands::FilterScans { ref dataset } => {
            run_family(&cli, |o| Ok(vec![o.filter_scans(dataset)?]))
        }

        Commands::Oct2fp {
            ref dataset,
            ref madfile,
        } => run_family(&cli, |o| Ok(vec![o.octree_to_floorplan(dataset, madfile)?])),

        Commands::DepthMaps { ref dataset } => {
            run_family(&cli, |o| Ok(vec![o.generate_depth_maps(dataset)?]))
        }

        Commands::RunAll {
            ref dataset,
            ref madfile,
        } => run_family(&cli, |o| o.run_all(dataset, madfile)),

        Commands::Validate => validate_command(&cli),

        Commands::GenerateConfig { ref output } => generate_config_command(output),
    }
}

/// Load the config file (or defaults) and apply command-line overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Invalid config file {}", path.display()))?,
        None => Config::default(),
    };

    // Apply overrides
    if let Some(root) = &cli.install_root {
        config.install.root = Some(root.clone());
    }
    if let Some(path) = &cli.metrics_output {
        config.metrics_output_path = Some(path.clone());
    }

    config.validate()?;
    Ok(config)
}

fn run_family<F>(cli: &Cli, family: F) -> Result<()>
where
    F: FnOnce(&Orchestrator<ProcessRunner>) -> StepResult<Vec<FamilyReport>>,
{
    let config = load_config(cli)?;
    let toolchain = config.toolchain()?;
    tracing::debug!("Toolchain: {:?}", toolchain);

    let metrics_path = config.metrics_output_path.clone();
    let orchestrator = Orchestrator::new(config, toolchain, ProcessRunner);
    let result = family(&orchestrator);

    let snapshot = orchestrator.metrics().snapshot();
    tracing::info!("{}", snapshot);
    if let Some(path) = metrics_path {
        if let Err(e) = snapshot.save_to_file(&path) {
            tracing::warn!("Failed to save metrics to {}: {}", path.display(), e);
        }
    }

    for report in result? {
        if report.skipped {
            tracing::info!("{}: nothing to do", report.family);
        } else {
            tracing::info!(
                "{}: {} stage(s) run, {} output(s)",
                report.family,
                report.stages_run,
                report.outputs.len()
            );
        }
    }
    Ok(())
}

fn validate_command(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let toolchain = config.toolchain()?;

    println!("Install root: {}", toolchain.root.display());
    let mut missing = 0;
    let executables = &toolchain.executables;
    let required = [
        ("scan_chunker", &executables.scan_chunker),
        ("filter_urg_scans", &executables.filter_urg_scans),
        ("oct2dq", &executables.oct2dq),
        ("floorplan_gen", &executables.floorplan_gen),
        ("depth_maps", &executables.depth_maps),
        ("chunker settings", &toolchain.procarve_settings),
        ("oct2dq settings", &toolchain.oct2dq_settings),
    ];
    for (what, path) in required {
        if path.is_file() {
            println!("  {:<18} {}", what, path.display());
        } else {
            missing += 1;
            tracing::warn!("{} not found at {}", what, path.display());
        }
    }

    println!("Configuration is valid");
    if missing > 0 {
        println!("{} toolchain file(s) missing", missing);
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# Backpack Reconstruction Pipeline Configuration

# === INSTALL: Where the native stages live ===
# Every location defaults to the layout under the install root.
install:
  # Install root. Omit to use the parent of the directory holding this binary.
  # root: "/opt/backpack"

  # Directory holding the stage executables (relative paths are under root)
  # bin_dir: "bin"

  # Settings file read by scan_chunker
  # procarve_settings: "config/procarve/procarve_settings.xml"

  # Settings file read by oct2dq
  # oct2dq_settings: "config/oct2dq/oct2dq_settings.xml"

# === EXECUTABLES: File names inside bin_dir ===
executables:
  scan_chunker: "scan_chunker"
  filter_urg_scans: "filter_urg_scans"
  oct2dq: "oct2dq"
  floorplan_gen: "floorplan_gen"
  depth_maps: "depth_maps"

# === FILTERING: Laser scan filtering ===
filtering:
  # fail_fast: stop at the first failing laser
  # exhaustive: filter every laser, then report the first failure
  failure_policy: fail_fast

# === DEPTH MAPS: Depth and normal map rendering ===
depth_maps:
  # Maximum rendering depth in meters
  depth: 10.0

  # Surface model to render (relative to the dataset). Default: carved mesh
  # model_file: "models/carving/carving.obj"

  # Worker threads for the renderer
  # threads: 8

  # Image downsampling factor
  # downsample: 2

  # Named localization run whose camera poses to use
  # localization_name: "run1"

# Optional path for run metrics JSON
# metrics_output_path: "metrics.json"
"#;

fn generate_config_command(output: &Path) -> Result<()> {
    std::fs::write(output, SAMPLE_CONFIG)
        .with_context(|| format!("Unable to write {}", output.display()))?;
    println!("Generated sample configuration at: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_chunk() {
        let cli = Cli::try_parse_from(["backpack-pipeline", "chunk", "/data/run1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Chunk { ref dataset } if dataset == Path::new("/data/run1")
        ));
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_oct2fp_requires_madfile() {
        assert!(Cli::try_parse_from(["backpack-pipeline", "oct2fp", "/data/run1"]).is_err());
        let cli =
            Cli::try_parse_from(["backpack-pipeline", "oct2fp", "/data/run1", "/data/run1.mad"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_global_options() {
        let cli = Cli::try_parse_from([
            "backpack-pipeline",
            "run-all",
            "/data/run1",
            "/data/run1.mad",
            "-c",
            "pipeline.yaml",
            "--install-root",
            "/opt/backpack",
            "--metrics-output",
            "metrics.json",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("pipeline.yaml")));
        assert_eq!(cli.install_root, Some(PathBuf::from("/opt/backpack")));
        assert!(cli.verbose);

        let config = load_config(&cli);
        assert!(config.is_err(), "missing config file must be an error");
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["backpack-pipeline"]).is_err());
    }

    #[test]
    fn test_load_config_overrides() {
        let cli = Cli::try_parse_from([
            "backpack-pipeline",
            "validate",
            "--install-root",
            "/opt/backpack",
            "--metrics-output",
            "m.json",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.install.root, Some(PathBuf::from("/opt/backpack")));
        assert_eq!(config.metrics_output_path, Some(PathBuf::from("m.json")));
        let toolchain = config.toolchain().unwrap();
        assert_eq!(toolchain.bin_dir, PathBuf::from("/opt/backpack/bin"));
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config = Config::from_yaml(SAMPLE_CONFIG).unwrap();
        config.validate().unwrap();
        assert_eq!(config.depth_maps.depth, 10.0);
    }

    #[test]
    fn test_pipeline_error_is_recoverable_from_anyhow() {
        let err: anyhow::Error =
            PipelineError::configuration(backpack_pipeline::Step::ChunkGeneration, "bad").into();
        assert_eq!(err.downcast_ref::<PipelineError>().map(|e| e.code()), Some(-11));
    }
}
